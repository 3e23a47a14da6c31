use artfeed_common::{
    media::ContentItem,
    model::media::{ContentKind, MediaPath},
};
use std::{
    future::Future,
    io,
    path::{Path, PathBuf},
};
use tracing::debug;

/// Where accepted uploads are kept. References returned by `store` are
/// relative and stable.
pub trait MediaStorage: Send + Sync {
    fn store(&self, item: &ContentItem) -> impl Future<Output = io::Result<MediaPath>> + Send;

    fn remove(&self, path: &MediaPath) -> impl Future<Output = io::Result<()>> + Send;
}

/// Files live under `<root>/posts/<kind>/` with a random name that keeps
/// the client's extension.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct LocalMediaStorage {
    root: PathBuf,
}

impl LocalMediaStorage {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn reference_for(kind: ContentKind, file_name: &str) -> MediaPath {
        let name = format!("{:032x}", rand::random::<u128>());
        let extension = Path::new(file_name)
            .extension()
            .and_then(|extension| extension.to_str())
            .map(str::to_ascii_lowercase);

        let path = match extension {
            Some(extension) => format!("posts/{kind}/{name}.{extension}"),
            None => format!("posts/{kind}/{name}"),
        };
        MediaPath::new(path)
    }
}

impl MediaStorage for LocalMediaStorage {
    async fn store(&self, item: &ContentItem) -> io::Result<MediaPath> {
        let reference = Self::reference_for(item.kind, &item.file.file_name);
        let destination = self.root.join(reference.get());

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(&item.file.path, &destination).await?;
        debug!(%reference, file_name = %item.file.file_name, "Stored upload");

        Ok(reference)
    }

    async fn remove(&self, path: &MediaPath) -> io::Result<()> {
        tokio::fs::remove_file(self.root.join(path.get())).await
    }
}
