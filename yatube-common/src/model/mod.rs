pub mod auth;
pub mod comment;
pub mod follow;
pub mod group;
pub mod post;
pub mod user;

use crate::{
    model::{
        auth::{InvalidAuthTokenHashError, InvalidPasswordHashError},
        group::{InvalidGroupSlugError, InvalidGroupTitleError},
        post::InvalidImagePathError,
        user::InvalidUsernameError,
    },
    snowflake::Snowflake,
    util::NonPositiveDurationError,
};
use derive_where::derive_where;
use serde::{Deserialize, Serialize};
use std::{fmt::Display, marker::PhantomData};
use thiserror::Error;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    Username(#[from] InvalidUsernameError),
    #[error(transparent)]
    GroupSlug(#[from] InvalidGroupSlugError),
    #[error(transparent)]
    GroupTitle(#[from] InvalidGroupTitleError),
    #[error(transparent)]
    ImagePath(#[from] InvalidImagePathError),
    #[error(transparent)]
    NonPositiveDuration(#[from] NonPositiveDurationError),
    #[error(transparent)]
    TokenHash(#[from] InvalidAuthTokenHashError),
    #[error(transparent)]
    PasswordHash(#[from] InvalidPasswordHashError),
}

#[derive_where(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<Marker>(Snowflake, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(snowflake: Snowflake) -> Self {
        Self(snowflake, PhantomData)
    }

    #[must_use]
    pub fn snowflake(self) -> Snowflake {
        self.0
    }

    /// The id as stored in a signed `BIGINT` column.
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

impl<Marker> From<Snowflake> for Id<Marker> {
    fn from(value: Snowflake) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<u64> for Id<Marker> {
    fn from(value: u64) -> Self {
        Id::new(Snowflake::new(value))
    }
}

impl<Marker> From<Id<Marker>> for u64 {
    fn from(value: Id<Marker>) -> Self {
        value.snowflake().get()
    }
}

impl<Marker> std::str::FromStr for Id<Marker> {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(Self::from)
    }
}
