use crate::model::{
    Id,
    media::MediaPath,
    tag::TagName,
    user::{User, UserMarker},
};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct NftTokenMarker;

/// Price in the smallest unit of the listing currency.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Deserialize, Serialize,
)]
#[serde(transparent)]
pub struct Price(pub i64);

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct NftToken {
    pub id: Id<NftTokenMarker>,
    pub title: String,
    pub description: String,
    pub tags: Vec<TagName>,
    pub cover_image: Option<MediaPath>,
    pub nft_file: MediaPath,
    pub creator: User,
    pub owner: User,
    pub is_listed: bool,
    pub is_minted: bool,
    pub is_hidden: bool,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct NftTokenDetail {
    pub id: Id<NftTokenMarker>,
    pub title: String,
    pub description: String,
    pub tags: Vec<TagName>,
    pub cover_image: Option<MediaPath>,
    pub nft_file: MediaPath,
    pub creator: User,
    pub owner: User,
    pub is_listed: bool,
    pub is_minted: bool,
    pub is_hidden: bool,
    pub price: Option<Price>,
    pub is_mine: bool,
}

impl NftToken {
    /// Hidden tokens are only shown to their owner.
    #[must_use]
    pub fn is_visible_for(&self, viewer: Option<Id<UserMarker>>) -> bool {
        !self.is_hidden || viewer == Some(self.owner.id)
    }

    /// `last_price` is the most recent price record; it only counts while
    /// the token is listed.
    #[must_use]
    pub fn into_detail(
        self,
        last_price: Option<Price>,
        viewer: Option<Id<UserMarker>>,
    ) -> NftTokenDetail {
        let price = if self.is_listed { last_price } else { None };
        let is_mine = viewer == Some(self.owner.id);

        NftTokenDetail {
            id: self.id,
            title: self.title,
            description: self.description,
            tags: self.tags,
            cover_image: self.cover_image,
            nft_file: self.nft_file,
            creator: self.creator,
            owner: self.owner,
            is_listed: self.is_listed,
            is_minted: self.is_minted,
            is_hidden: self.is_hidden,
            price,
            is_mine,
        }
    }
}
