use crate::storage::MediaStorage;
use artfeed_common::{
    media::ContentItem,
    model::{
        Id,
        media::CreatePostMedia,
        post::{CreatePost, PostMarker},
        user::UserMarker,
    },
};
use artfeed_db::{
    client::DbError,
    store::{PostStore, PostTransaction},
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum CreatePostError {
    #[error("Storing an uploaded file failed: {0}")]
    Storage(#[from] std::io::Error),
    #[error("Persisting the post failed: {0}")]
    Database(#[from] DbError),
}

/// Persists a validated post and its media as one unit.
pub struct PostCreationService<S, M> {
    store: Arc<S>,
    storage: M,
}

impl<S: PostStore, M: MediaStorage> PostCreationService<S, M> {
    #[must_use]
    pub fn new(store: Arc<S>, storage: M) -> Self {
        Self { store, storage }
    }

    /// Stores every file, then writes the post, its tags, categories and
    /// media in one transaction. On failure nothing is persisted and the
    /// files stored so far are removed again.
    pub async fn create(
        &self,
        post: &CreatePost,
        items: &[ContentItem],
        author: Id<UserMarker>,
    ) -> Result<Id<PostMarker>, CreatePostError> {
        let mut media = Vec::with_capacity(items.len());
        for item in items {
            match self.storage.store(item).await {
                Ok(original) => media.push(CreatePostMedia {
                    kind: item.kind,
                    original,
                }),
                Err(err) => {
                    self.remove_stored(&media).await;
                    return Err(err.into());
                }
            }
        }

        match self.persist(post, &media, author).await {
            Ok(post_id) => {
                info!(%post_id, %author, media = media.len(), "Created post");
                Ok(post_id)
            }
            Err(err) => {
                self.remove_stored(&media).await;
                Err(err.into())
            }
        }
    }

    async fn persist(
        &self,
        post: &CreatePost,
        media: &[CreatePostMedia],
        author: Id<UserMarker>,
    ) -> Result<Id<PostMarker>, DbError> {
        let mut transaction = self.store.begin().await?;

        let post_id = transaction.insert_post(post, author).await?;
        for media in media {
            transaction.insert_media(post_id, media).await?;
        }

        transaction.commit().await?;
        Ok(post_id)
    }

    async fn remove_stored(&self, media: &[CreatePostMedia]) {
        for media in media {
            if let Err(err) = self.storage.remove(&media.original).await {
                warn!(path = %media.original, error = %err, "Could not remove stored upload");
            }
        }
    }
}
