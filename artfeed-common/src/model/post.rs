use crate::{
    model::{
        Id,
        category::{Category, CategoryMarker},
        media::PostMedia,
        tag::{Tag, TagName},
        user::{User, UserMarker},
    },
    ranking::{Alive, Rankable},
};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::str::FromStr;
use thiserror::Error;
use time::OffsetDateTime;

pub const POST_TITLE_MAX_LEN: usize = 2200;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Deserialize, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    /// Awaiting moderation.
    #[default]
    Pending,
    Published,
    Rejected,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Unknown post status: {0:?}")]
pub struct InvalidPostStatusError(String);

impl PostStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Pending => "pending",
            PostStatus::Published => "published",
            PostStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for PostStatus {
    type Err = InvalidPostStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PostStatus::Pending),
            "published" => Ok(PostStatus::Published),
            "rejected" => Ok(PostStatus::Rejected),
            other => Err(InvalidPostStatusError(other.to_owned())),
        }
    }
}

#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Deserialize, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    #[default]
    Private,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Unknown visibility: {0:?}, expected \"public\" or \"private\"")]
pub struct InvalidVisibilityError(String);

impl Visibility {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

impl FromStr for Visibility {
    type Err = InvalidVisibilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            other => Err(InvalidVisibilityError(other.to_owned())),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct PostTitle(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The post title is longer than {POST_TITLE_MAX_LEN} characters")]
pub struct InvalidPostTitleError(String);

impl PostTitle {
    pub fn new(title: String) -> Result<Self, InvalidPostTitleError> {
        if title.chars().count() <= POST_TITLE_MAX_LEN {
            Ok(PostTitle(title))
        } else {
            Err(InvalidPostTitleError(title))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for PostTitle {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        PostTitle::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"PostTitle"))
    }
}

/// Updated by engagement events, never by post creation.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Deserialize, Serialize,
)]
pub struct EngagementCounters {
    pub views: u32,
    pub favorites: u32,
    pub likes: u32,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub author: User,
    pub title: PostTitle,
    pub content: String,
    pub status: PostStatus,
    pub visibility: Visibility,
    pub counters: EngagementCounters,
    pub is_commenting_allowed: bool,
    pub tags: Vec<Tag>,
    pub categories: Vec<Category>,
    pub media: Vec<PostMedia>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(skip)]
    pub is_deleted: bool,
    #[serde(skip)]
    pub is_reported: bool,
}

/// A post as it appears in a feed: no relations beyond the author id.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct PartialPost {
    pub id: Id<PostMarker>,
    pub author_id: Id<UserMarker>,
    pub title: PostTitle,
    pub content: String,
    pub status: PostStatus,
    pub visibility: Visibility,
    pub counters: EngagementCounters,
    pub is_commenting_allowed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(skip)]
    pub is_deleted: bool,
    #[serde(skip)]
    pub is_reported: bool,
    #[serde(skip)]
    pub author_is_deleted: bool,
}

/// Author-supplied fields of a new post. Status and counters always start at
/// their defaults.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreatePost {
    pub title: PostTitle,
    pub content: String,
    pub visibility: Visibility,
    pub is_commenting_allowed: bool,
    pub tags: Vec<TagName>,
    pub categories: Vec<Id<CategoryMarker>>,
}

impl Default for CreatePost {
    fn default() -> Self {
        Self {
            title: PostTitle::default(),
            content: String::new(),
            visibility: Visibility::default(),
            is_commenting_allowed: true,
            tags: Vec::new(),
            categories: Vec::new(),
        }
    }
}

impl Alive for Post {
    fn is_alive(&self) -> bool {
        !self.is_deleted && !self.is_reported && self.author.is_alive()
    }
}

impl Rankable for Post {
    fn author_id(&self) -> Id<UserMarker> {
        self.author.id
    }

    fn status(&self) -> PostStatus {
        self.status
    }

    fn visibility(&self) -> Visibility {
        self.visibility
    }

    fn counters(&self) -> EngagementCounters {
        self.counters
    }
}

impl Alive for PartialPost {
    fn is_alive(&self) -> bool {
        !self.is_deleted && !self.is_reported && !self.author_is_deleted
    }
}

impl Rankable for PartialPost {
    fn author_id(&self) -> Id<UserMarker> {
        self.author_id
    }

    fn status(&self) -> PostStatus {
        self.status
    }

    fn visibility(&self) -> Visibility {
        self.visibility
    }

    fn counters(&self) -> EngagementCounters {
        self.counters
    }
}
