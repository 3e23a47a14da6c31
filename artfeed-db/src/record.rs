use artfeed_common::model::{
    Id, ModelValidationError,
    category::Category,
    media::{MediaPath, PostMedia},
    nft::NftToken,
    post::{EngagementCounters, PartialPost, Post, PostTitle},
    tag::{Tag, TagName},
    user::{User, UserHandle},
};
use sqlx::FromRow;
use time::PrimitiveDateTime;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub user_snowflake: i64,
    pub handle: String,
    pub is_deleted: bool,
}

/// A post row joined with its author; relations are loaded separately.
#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct PostRecord {
    pub post_snowflake: i64,
    pub title: String,
    pub content: String,
    pub status: String,
    pub visibility: String,
    pub views_quantity: i32,
    pub favorites_quantity: i32,
    pub likes_quantity: i32,
    pub is_deleted: bool,
    pub is_reported: bool,
    pub is_commenting_allowed: bool,
    pub created_at: PrimitiveDateTime,
    pub updated_at: PrimitiveDateTime,
    pub user_snowflake: i64,
    pub handle: String,
    pub author_is_deleted: bool,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct PostMediaRecord {
    pub media_snowflake: i64,
    pub post_snowflake: i64,
    pub kind: String,
    pub original: String,
    pub formatted_path: Option<String>,
    pub preview_path: Option<String>,
    pub created_at: PrimitiveDateTime,
    pub updated_at: PrimitiveDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct TagRecord {
    pub tag_snowflake: i64,
    pub name: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct CategoryRecord {
    pub category_snowflake: i64,
    pub name: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct NftTokenRecord {
    pub token_snowflake: i64,
    pub title: String,
    pub description: String,
    pub cover_image: Option<String>,
    pub nft_file: String,
    pub is_listed: bool,
    pub is_minted: bool,
    pub is_hidden: bool,
    pub creator_snowflake: i64,
    pub creator_handle: String,
    pub creator_is_deleted: bool,
    pub owner_snowflake: i64,
    pub owner_handle: String,
    pub owner_is_deleted: bool,
}

fn counters(record: &PostRecord) -> Result<EngagementCounters, ModelValidationError> {
    Ok(EngagementCounters {
        views: record.views_quantity.try_into()?,
        favorites: record.favorites_quantity.try_into()?,
        likes: record.likes_quantity.try_into()?,
    })
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.user_snowflake),
            handle: UserHandle::new(value.handle)?,
            is_deleted: value.is_deleted,
        })
    }
}

impl TryFrom<PostRecord> for PartialPost {
    type Error = ModelValidationError;

    fn try_from(value: PostRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.post_snowflake),
            author_id: Id::from_db(value.user_snowflake),
            counters: counters(&value)?,
            title: PostTitle::new(value.title)?,
            content: value.content,
            status: value.status.parse()?,
            visibility: value.visibility.parse()?,
            is_commenting_allowed: value.is_commenting_allowed,
            created_at: value.created_at.assume_utc(),
            is_deleted: value.is_deleted,
            is_reported: value.is_reported,
            author_is_deleted: value.author_is_deleted,
        })
    }
}

impl PostRecord {
    pub(crate) fn into_post(
        self,
        tags: Vec<Tag>,
        categories: Vec<Category>,
        media: Vec<PostMedia>,
    ) -> Result<Post, ModelValidationError> {
        Ok(Post {
            id: Id::from_db(self.post_snowflake),
            author: User {
                id: Id::from_db(self.user_snowflake),
                handle: UserHandle::new(self.handle.clone())?,
                is_deleted: self.author_is_deleted,
            },
            counters: counters(&self)?,
            title: PostTitle::new(self.title)?,
            content: self.content,
            status: self.status.parse()?,
            visibility: self.visibility.parse()?,
            is_commenting_allowed: self.is_commenting_allowed,
            tags,
            categories,
            media,
            created_at: self.created_at.assume_utc(),
            updated_at: self.updated_at.assume_utc(),
            is_deleted: self.is_deleted,
            is_reported: self.is_reported,
        })
    }
}

impl TryFrom<PostMediaRecord> for PostMedia {
    type Error = ModelValidationError;

    fn try_from(value: PostMediaRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.media_snowflake),
            post: Id::from_db(value.post_snowflake),
            kind: value.kind.parse()?,
            original: MediaPath::new(value.original),
            formatted: value.formatted_path.map(MediaPath::new),
            preview: value.preview_path.map(MediaPath::new),
            created_at: value.created_at.assume_utc(),
            updated_at: value.updated_at.assume_utc(),
        })
    }
}

impl TryFrom<TagRecord> for Tag {
    type Error = ModelValidationError;

    fn try_from(value: TagRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.tag_snowflake),
            name: TagName::new(&value.name)?,
        })
    }
}

impl From<CategoryRecord> for Category {
    fn from(value: CategoryRecord) -> Self {
        Self {
            id: Id::from_db(value.category_snowflake),
            name: value.name,
        }
    }
}

impl NftTokenRecord {
    pub(crate) fn into_token(self, tags: Vec<TagName>) -> Result<NftToken, ModelValidationError> {
        Ok(NftToken {
            id: Id::from_db(self.token_snowflake),
            title: self.title,
            description: self.description,
            tags,
            cover_image: self.cover_image.map(MediaPath::new),
            nft_file: MediaPath::new(self.nft_file),
            creator: User {
                id: Id::from_db(self.creator_snowflake),
                handle: UserHandle::new(self.creator_handle)?,
                is_deleted: self.creator_is_deleted,
            },
            owner: User {
                id: Id::from_db(self.owner_snowflake),
                handle: UserHandle::new(self.owner_handle)?,
                is_deleted: self.owner_is_deleted,
            },
            is_listed: self.is_listed,
            is_minted: self.is_minted,
            is_hidden: self.is_hidden,
        })
    }
}
