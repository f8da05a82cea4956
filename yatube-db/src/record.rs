use sqlx::FromRow;
use time::{Duration, PrimitiveDateTime, UtcDateTime};
use yatube_common::model::{
    Id, ModelValidationError,
    auth::{Authentication, HashedPassword},
    comment::Comment,
    group::{Group, GroupSlug},
    post::{ImagePath, Post},
    user::{User, UserMarker, Username},
};

pub(crate) fn to_db_time(time: UtcDateTime) -> PrimitiveDateTime {
    PrimitiveDateTime::new(time.date(), time.time())
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub user_snowflake: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub date_joined: PrimitiveDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct CredentialsRecord {
    pub user_snowflake: i64,
    pub password_hash: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct GroupRecord {
    pub group_snowflake: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
}

/// A post joined with its author and, when present, its group.
#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct FullPostRecord {
    pub post_snowflake: i64,
    pub text: String,
    pub pub_date: PrimitiveDateTime,
    pub image: Option<String>,
    #[sqlx(flatten)]
    pub author: UserRecord,
    pub group_snowflake: Option<i64>,
    pub group_title: Option<String>,
    pub group_slug: Option<String>,
    pub group_description: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct FullCommentRecord {
    pub comment_snowflake: i64,
    pub post_snowflake: i64,
    pub text: String,
    pub created: PrimitiveDateTime,
    #[sqlx(flatten)]
    pub author: UserRecord,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct AuthenticationRecord {
    pub user_snowflake: i64,
    pub token_hash: Vec<u8>,
    pub created_at: PrimitiveDateTime,
    pub expires_after_seconds: Option<i64>,
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.user_snowflake),
            username: Username::new(value.username)?,
            first_name: value.first_name,
            last_name: value.last_name,
            email: value.email,
            date_joined: value.date_joined.as_utc(),
        })
    }
}

impl CredentialsRecord {
    pub(crate) fn into_credentials(
        self,
    ) -> Result<(Id<UserMarker>, HashedPassword), ModelValidationError> {
        Ok((
            Id::from_db(self.user_snowflake),
            HashedPassword::from_phc(self.password_hash)?,
        ))
    }
}

impl TryFrom<GroupRecord> for Group {
    type Error = ModelValidationError;

    fn try_from(value: GroupRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.group_snowflake),
            title: value.title,
            slug: GroupSlug::new(value.slug)?,
            description: value.description,
        })
    }
}

impl TryFrom<FullPostRecord> for Post {
    type Error = ModelValidationError;

    fn try_from(value: FullPostRecord) -> Result<Self, Self::Error> {
        let group = match (
            value.group_snowflake,
            value.group_title,
            value.group_slug,
            value.group_description,
        ) {
            (Some(group_snowflake), Some(title), Some(slug), Some(description)) => {
                Some(Group::try_from(GroupRecord {
                    group_snowflake,
                    title,
                    slug,
                    description,
                })?)
            }
            _ => None,
        };

        Ok(Self {
            id: Id::from_db(value.post_snowflake),
            text: value.text,
            pub_date: value.pub_date.as_utc(),
            author: value.author.try_into()?,
            group,
            image: value.image.map(ImagePath::new).transpose()?,
        })
    }
}

impl TryFrom<FullCommentRecord> for Comment {
    type Error = ModelValidationError;

    fn try_from(value: FullCommentRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.comment_snowflake),
            post: Id::from_db(value.post_snowflake),
            author: value.author.try_into()?,
            text: value.text,
            created: value.created.as_utc(),
        })
    }
}

impl TryFrom<AuthenticationRecord> for Authentication {
    type Error = ModelValidationError;

    fn try_from(value: AuthenticationRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: Id::from_db(value.user_snowflake),
            token_hash: value.token_hash.try_into()?,
            created_at: value.created_at.as_utc(),
            expires_after: value
                .expires_after_seconds
                .map(|seconds| Duration::seconds(seconds).try_into())
                .transpose()?,
        })
    }
}
