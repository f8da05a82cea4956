use crate::{model::Id, util::serialize_display_time};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::fmt::{Display, Formatter};
use thiserror::Error;
use time::UtcDateTime;

pub const USERNAME_MAX_LEN: usize = 150;
pub const NAME_MAX_LEN: usize = 150;

/// First path segments that are routes of their own and therefore
/// cannot double as a profile address.
pub const RESERVED_USERNAMES: &[&str] = &[
    "about", "admin", "auth", "follow", "group", "media", "new", "static",
];

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct User {
    pub id: Id<UserMarker>,
    pub username: Username,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(serialize_with = "serialize_display_time")]
    pub date_joined: UtcDateTime,
}

impl User {
    /// "First Last", falling back to the username when no name was given.
    #[must_use]
    pub fn display_name(&self) -> String {
        let full_name = format!("{} {}", self.first_name, self.last_name);
        let full_name = full_name.trim();
        if full_name.is_empty() {
            self.username.get().to_owned()
        } else {
            full_name.to_owned()
        }
    }
}

impl Display for User {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.username, f)
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct CreateUser {
    pub username: Username,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct Username(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum InvalidUsernameError {
    #[error("Username must not be empty")]
    Empty,
    #[error("Username is longer than {USERNAME_MAX_LEN} characters")]
    TooLong,
    #[error("Username {0:?} may only contain letters, digits and @/./+/-/_")]
    InvalidCharacters(String),
    #[error("Username {0:?} is reserved")]
    Reserved(String),
    #[error("Username {0:?} consists only of dots")]
    OnlyDots(String),
}

impl Username {
    pub fn new(username: String) -> Result<Self, InvalidUsernameError> {
        if username.is_empty() {
            return Err(InvalidUsernameError::Empty);
        }
        if username.chars().count() > USERNAME_MAX_LEN {
            return Err(InvalidUsernameError::TooLong);
        }
        if !username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
        {
            return Err(InvalidUsernameError::InvalidCharacters(username));
        }
        // URL normalisation collapses `.` and `..` path segments.
        if username.chars().all(|c| c == '.') {
            return Err(InvalidUsernameError::OnlyDots(username));
        }
        if RESERVED_USERNAMES
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(&username))
        {
            return Err(InvalidUsernameError::Reserved(username));
        }

        Ok(Self(username))
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for Username {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Username {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Username::new(inner.clone())
            .map_err(|_| Error::invalid_value(Unexpected::Str(&inner), &"a username"))
    }
}
