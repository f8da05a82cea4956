use crate::model::{Id, ModelValidationError};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::fmt::{Display, Formatter};
use thiserror::Error;

pub const GROUP_TITLE_MAX_LEN: usize = 200;
pub const GROUP_SLUG_MAX_LEN: usize = 100;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct GroupMarker;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
pub struct Group {
    pub id: Id<GroupMarker>,
    pub title: String,
    pub slug: GroupSlug,
    pub description: String,
}

impl Display for Group {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.title)
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct CreateGroup {
    pub title: String,
    pub slug: GroupSlug,
    pub description: String,
}

impl CreateGroup {
    pub fn new(
        title: String,
        slug: String,
        description: String,
    ) -> Result<Self, ModelValidationError> {
        Ok(Self {
            title: validate_group_title(title)?,
            slug: GroupSlug::new(slug)?,
            description,
        })
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Group title must be 1 to {GROUP_TITLE_MAX_LEN} characters: {0:?}")]
pub struct InvalidGroupTitleError(String);

pub fn validate_group_title(title: String) -> Result<String, InvalidGroupTitleError> {
    let len = title.trim().chars().count();
    if (1..=GROUP_TITLE_MAX_LEN).contains(&len) {
        Ok(title)
    } else {
        Err(InvalidGroupTitleError(title))
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct GroupSlug(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Group slug must be 1 to {GROUP_SLUG_MAX_LEN} of [a-z0-9_-]: {0:?}")]
pub struct InvalidGroupSlugError(String);

impl GroupSlug {
    pub fn new(slug: String) -> Result<Self, InvalidGroupSlugError> {
        let valid_chars = slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');

        if valid_chars && (1..=GROUP_SLUG_MAX_LEN).contains(&slug.len()) {
            Ok(Self(slug))
        } else {
            Err(InvalidGroupSlugError(slug))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl Display for GroupSlug {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for GroupSlug {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        GroupSlug::new(inner.clone())
            .map_err(|_| Error::invalid_value(Unexpected::Str(&inner), &"a group slug"))
    }
}
