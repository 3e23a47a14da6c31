use crate::model::Id;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use thiserror::Error;

pub const TAG_NAME_MAX_LEN: usize = 128;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct TagMarker;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct Tag {
    pub id: Id<TagMarker>,
    pub name: TagName,
}

/// A hashtag without the leading `#`, trimmed, at most
/// [`TAG_NAME_MAX_LEN`] characters.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct TagName(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The tag name is invalid: {0:?}")]
pub struct InvalidTagNameError(String);

impl TagName {
    pub fn new(name: &str) -> Result<Self, InvalidTagNameError> {
        let trimmed = name.trim().trim_start_matches('#').trim();
        if trimmed.is_empty() || trimmed.chars().count() > TAG_NAME_MAX_LEN {
            return Err(InvalidTagNameError(name.to_owned()));
        }

        Ok(Self(trimmed.to_owned()))
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for TagName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        TagName::new(&inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"TagName"))
    }
}
