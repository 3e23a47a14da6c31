use crate::server::{
    MediaValidation, Result, ServerError, ServerRouter, ServerState,
    form::{PostForm, ValidationErrors},
    json::Json,
    requester::RequestingUser,
};
use artfeed_common::{
    media::{ContentItem, UploadedFile, policy::PostContentPolicy},
    model::{
        Id,
        category::CategoryMarker,
        post::{PartialPost, Post, PostMarker},
    },
    ranking::Rankable,
};
use artfeed_db::client::DbClient;
use axum::{
    extract::{Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, sync::Arc};
use tracing::debug;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_posts)
        .typed_post(create_post)
        .typed_get(get_post)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts", rejection(ServerError))]
struct PostsPath();

/// Public feed for anonymous clients, public plus own private posts
/// otherwise.
async fn list_posts(
    PostsPath(): PostsPath,
    State(db): State<Arc<DbClient>>,
    requester: Option<RequestingUser>,
) -> Result<Json<Vec<PartialPost>>> {
    let posts = db
        .fetch_visible_posts(requester.map(RequestingUser::user_id))
        .await?;

    Ok(Json(posts))
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct CreatedPost {
    post: Id<PostMarker>,
}

async fn create_post(
    PostsPath(): PostsPath,
    State(state): State<ServerState>,
    requester: RequestingUser,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<CreatedPost>)> {
    let mut errors = ValidationErrors::default();
    let mut form =
        PostForm::read(multipart?, state.uploads.temp_dir.as_deref(), &mut errors).await?;

    check_categories(&state.db_client, &form.post.categories, &mut errors).await?;

    let files = std::mem::take(&mut form.files);
    let items = vet_media(
        Arc::clone(&state.media_validation),
        state.content_policy,
        files,
        errors,
    )
    .await?;

    let post_id = state
        .post_creation
        .create(&form.post, &items, requester.user_id())
        .await?;

    Ok((StatusCode::CREATED, Json(CreatedPost { post: post_id })))
}

async fn check_categories(
    db: &DbClient,
    categories: &[Id<CategoryMarker>],
    errors: &mut ValidationErrors,
) -> Result<()> {
    if categories.is_empty() {
        return Ok(());
    }

    let known: BTreeSet<Id<CategoryMarker>> = db
        .fetch_categories(categories)
        .await?
        .into_iter()
        .map(|category| category.id)
        .collect();

    for id in categories.iter().filter(|id| !known.contains(*id)) {
        errors.add("categories", format!("Unknown category: {id}"));
    }

    Ok(())
}

/// Fails with every collected field error if any file was rejected. The
/// cross-item policy only sees uploads that all passed on their own.
async fn vet_media(
    validation: Arc<MediaValidation>,
    policy: PostContentPolicy,
    files: Vec<UploadedFile>,
    mut errors: ValidationErrors,
) -> Result<Vec<ContentItem>> {
    let items = validate_files(validation, files, &mut errors).await?;
    errors.into_result()?;

    policy.check(&items)?;

    Ok(items)
}

/// Runs every file through its validator chain on the blocking pool.
/// Rejections are recorded under `media[<index>]`.
async fn validate_files(
    validation: Arc<MediaValidation>,
    files: Vec<UploadedFile>,
    errors: &mut ValidationErrors,
) -> Result<Vec<ContentItem>> {
    let results = tokio::task::spawn_blocking(move || {
        files
            .into_iter()
            .map(|file| validation.validate(file))
            .collect::<Vec<_>>()
    })
    .await?;

    let mut items = Vec::with_capacity(results.len());
    for (index, result) in results.into_iter().enumerate() {
        match result {
            Ok(item) => items.push(item),
            Err(rejection) => {
                debug!(index, file_name = %rejection.file_name, "Upload rejected");
                for message in rejection.messages() {
                    errors.add(ValidationErrors::media_key(index), message);
                }
            }
        }
    }

    Ok(items)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct GetPostPath {
    id: Id<PostMarker>,
}

async fn get_post(
    GetPostPath { id }: GetPostPath,
    State(db): State<Arc<DbClient>>,
    requester: Option<RequestingUser>,
) -> Result<Json<Post>> {
    let viewer = requester.map(RequestingUser::user_id);

    let post = db
        .fetch_post(id)
        .await?
        .filter(|post| post.is_visible_for(viewer))
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Json(post))
}
