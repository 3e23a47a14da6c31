use crate::server::{Result, ServerError};
use artfeed_common::{
    media::UploadedFile,
    model::{
        Id,
        category::CategoryMarker,
        post::{CreatePost, PostTitle, Visibility},
        tag::TagName,
    },
};
use axum::extract::{Multipart, multipart::Field};
use serde::Serialize;
use std::{collections::BTreeMap, path::Path};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::debug;

pub const MEDIA_FIELD: &str = "media";

/// Messages keyed by the form field they concern. Files are keyed
/// `media[<index>]`, rules that span all files are keyed `media`.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn add(&mut self, field: impl Into<String>, message: impl ToString) {
        self.0
            .entry(field.into())
            .or_default()
            .push(message.to_string());
    }

    #[must_use]
    pub fn media_key(index: usize) -> String {
        format!("{MEDIA_FIELD}[{index}]")
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ServerError::Validation(self))
        }
    }

    #[must_use]
    pub fn into_inner(self) -> BTreeMap<String, Vec<String>> {
        self.0
    }
}

/// A parsed `POST /posts` body. The temporary files backing `files` are
/// deleted when this is dropped.
pub struct PostForm {
    pub post: CreatePost,
    pub files: Vec<UploadedFile>,
    temp_files: Vec<NamedTempFile>,
}

impl PostForm {
    /// Reads every field. Malformed text fields are collected into `errors`
    /// rather than failing the request.
    pub async fn read(
        mut multipart: Multipart,
        temp_dir: Option<&Path>,
        errors: &mut ValidationErrors,
    ) -> Result<Self> {
        let mut form = Self {
            post: CreatePost::default(),
            files: Vec::new(),
            temp_files: Vec::new(),
        };

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(ToOwned::to_owned) else {
                debug!("Skipping unnamed form field");
                continue;
            };

            match name.as_str() {
                MEDIA_FIELD => form.read_file(field, temp_dir).await?,
                "title" => match PostTitle::new(field.text().await?) {
                    Ok(title) => form.post.title = title,
                    Err(err) => errors.add(&name, err),
                },
                "content" => form.post.content = field.text().await?,
                "visibility" => match field.text().await?.parse::<Visibility>() {
                    Ok(visibility) => form.post.visibility = visibility,
                    Err(err) => errors.add(&name, err),
                },
                "is_commenting_allowed" => match parse_bool(&field.text().await?) {
                    Some(allowed) => form.post.is_commenting_allowed = allowed,
                    None => errors.add(&name, "Must be a boolean."),
                },
                "tags" => match TagName::new(&field.text().await?) {
                    Ok(tag) => form.post.tags.push(tag),
                    Err(err) => errors.add(&name, err),
                },
                "categories" => {
                    let text = field.text().await?;
                    match text.trim().parse::<u64>() {
                        Ok(id) => form.post.categories.push(Id::<CategoryMarker>::from(id)),
                        Err(_) => errors.add(&name, format!("Invalid category id: {text:?}")),
                    }
                }
                _ => debug!(field = %name, "Ignoring unknown form field"),
            }
        }

        Ok(form)
    }

    async fn read_file(&mut self, mut field: Field<'_>, temp_dir: Option<&Path>) -> Result<()> {
        let file_name = field.file_name().unwrap_or_default().to_owned();

        let mut builder = tempfile::Builder::new();
        builder.prefix("artfeed-upload-");
        let temp_file = match temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(ServerError::Upload)?;

        let mut writer = tokio::fs::File::from_std(temp_file.reopen().map_err(ServerError::Upload)?);
        let mut size: u64 = 0;
        while let Some(chunk) = field.chunk().await? {
            size += chunk.len() as u64;
            writer.write_all(&chunk).await.map_err(ServerError::Upload)?;
        }
        writer.flush().await.map_err(ServerError::Upload)?;

        debug!(%file_name, size, "Received upload");
        self.files.push(UploadedFile {
            file_name,
            path: temp_file.path().to_owned(),
            size,
        });
        self.temp_files.push(temp_file);

        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" => Some(true),
        "false" | "0" | "off" => Some(false),
        _ => None,
    }
}
