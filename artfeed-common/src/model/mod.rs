pub mod category;
pub mod media;
pub mod nft;
pub mod post;
pub mod tag;
pub mod user;

use crate::{
    model::{
        post::{InvalidPostStatusError, InvalidPostTitleError, InvalidVisibilityError},
        media::InvalidContentKindError,
        tag::InvalidTagNameError,
        user::InvalidUserHandleError,
    },
    snowflake::{Epoch, Snowflake, SnowflakeGenerator},
};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, marker::PhantomData, num::TryFromIntError};
use thiserror::Error;
use time::{UtcDateTime, macros::utc_datetime};

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    UserHandle(#[from] InvalidUserHandleError),
    #[error(transparent)]
    PostTitle(#[from] InvalidPostTitleError),
    #[error(transparent)]
    PostStatus(#[from] InvalidPostStatusError),
    #[error(transparent)]
    Visibility(#[from] InvalidVisibilityError),
    #[error(transparent)]
    TagName(#[from] InvalidTagNameError),
    #[error(transparent)]
    ContentKind(#[from] InvalidContentKindError),
    #[error("A counter was negative or too large: {0}")]
    Counter(#[from] TryFromIntError),
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct ArtfeedEpoch;
impl Epoch for ArtfeedEpoch {
    const EPOCH_TIME: UtcDateTime = utc_datetime!(2025-01-01 00:00);
}

pub type ArtfeedSnowflake = Snowflake<ArtfeedEpoch>;
pub type ArtfeedSnowflakeGenerator = SnowflakeGenerator<ArtfeedEpoch>;

/// A snowflake tagged with the kind of entity it identifies.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Id<Marker>(ArtfeedSnowflake, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(snowflake: ArtfeedSnowflake) -> Self {
        Self(snowflake, PhantomData)
    }

    #[must_use]
    pub fn snowflake(self) -> ArtfeedSnowflake {
        self.0
    }

    /// Postgres has no unsigned 64-bit integer, so ids are stored bit-cast.
    #[must_use]
    pub fn to_db(self) -> i64 {
        self.0.get().cast_signed()
    }

    #[must_use]
    pub fn from_db(value: i64) -> Self {
        value.cast_unsigned().into()
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> From<ArtfeedSnowflake> for Id<Marker> {
    fn from(value: ArtfeedSnowflake) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<u64> for Id<Marker> {
    fn from(value: u64) -> Self {
        Id::new(ArtfeedSnowflake::new(value))
    }
}

impl<Marker> From<Id<Marker>> for u64 {
    fn from(value: Id<Marker>) -> Self {
        value.snowflake().get()
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{Id, user::UserMarker};

    #[test]
    fn db_representation_round_trips_high_bit() {
        let id = Id::<UserMarker>::from(u64::MAX - 5);

        assert_eq!(id.to_db(), -6);
        assert_eq!(Id::<UserMarker>::from_db(id.to_db()), id);
    }

    #[test]
    fn serializes_as_plain_number() {
        let id = Id::<UserMarker>::from(42);

        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
        assert_eq!(serde_json::from_str::<Id<UserMarker>>("42").unwrap(), id);
    }
}
