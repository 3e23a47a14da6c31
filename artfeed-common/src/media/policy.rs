use crate::{media::ContentItem, model::media::ContentKind};
use thiserror::Error;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum ContentPolicyError {
    #[error("Unable to upload video and image together.")]
    MixedContent,
    #[error("Unable to upload more than 1 video.")]
    MultipleVideos,
    #[error("Content items cannot be more than {max} items.")]
    TooManyItems { count: usize, max: usize },
}

/// Rules that only make sense across all items of a post. Only the first
/// broken rule is reported, in the order mixed kinds, then more than one
/// video, then the item count.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct PostContentPolicy {
    max_items: usize,
}

impl PostContentPolicy {
    #[must_use]
    pub fn new(max_items: usize) -> Self {
        Self { max_items }
    }

    pub fn check_kinds(&self, kinds: &[ContentKind]) -> Result<(), ContentPolicyError> {
        let has_image = kinds.contains(&ContentKind::Image);
        let has_video = kinds.contains(&ContentKind::Video);

        if has_image && has_video {
            Err(ContentPolicyError::MixedContent)
        } else if has_video && kinds.len() > 1 {
            Err(ContentPolicyError::MultipleVideos)
        } else if kinds.len() > self.max_items {
            Err(ContentPolicyError::TooManyItems {
                count: kinds.len(),
                max: self.max_items,
            })
        } else {
            Ok(())
        }
    }

    pub fn check(&self, items: &[ContentItem]) -> Result<(), ContentPolicyError> {
        let kinds: Vec<ContentKind> = items.iter().map(|item| item.kind).collect();
        self.check_kinds(&kinds)
    }
}
