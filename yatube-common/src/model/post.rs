use crate::{
    model::{
        Id,
        group::{Group, GroupMarker},
        user::{User, UserMarker},
    },
    util::serialize_display_time,
};
use serde::Serialize;
use std::fmt::{Display, Formatter};
use thiserror::Error;
use time::UtcDateTime;

/// Length of the text excerpt a post displays as.
pub const POST_EXCERPT_LEN: usize = 15;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub text: String,
    #[serde(serialize_with = "serialize_display_time")]
    pub pub_date: UtcDateTime,
    pub author: User,
    pub group: Option<Group>,
    pub image: Option<ImagePath>,
}

impl Post {
    #[must_use]
    pub fn excerpt(&self) -> &str {
        match self.text.char_indices().nth(POST_EXCERPT_LEN) {
            Some((end, _)) => &self.text[..end],
            None => &self.text,
        }
    }
}

impl Display for Post {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.excerpt())
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct CreatePost {
    pub author: Id<UserMarker>,
    pub text: String,
    pub group: Option<Id<GroupMarker>>,
    pub image: Option<ImagePath>,
}

/// New contents for an existing post. An `image` of `None` keeps the
/// image the post already has.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct UpdatePost {
    pub text: String,
    pub group: Option<Id<GroupMarker>>,
    pub image: Option<ImagePath>,
}

/// Which posts a listing shows.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum PostFilter {
    All,
    Group(Id<GroupMarker>),
    Author(Id<UserMarker>),
    /// Posts by every author the given user follows.
    FollowedBy(Id<UserMarker>),
}

/// Location of an uploaded image relative to the media root,
/// e.g. `posts/1a2b3c.gif`.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct ImagePath(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Image path must be relative and stay inside the media root: {0:?}")]
pub struct InvalidImagePathError(String);

impl ImagePath {
    pub fn new(path: String) -> Result<Self, InvalidImagePathError> {
        let escapes = path
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");

        if escapes || path.contains('\\') {
            Err(InvalidImagePathError(path))
        } else {
            Ok(Self(path))
        }
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

impl Display for ImagePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
