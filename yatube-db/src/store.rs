use async_trait::async_trait;
use std::{
    num::NonZeroU64,
    sync::{Mutex, PoisonError},
};
use thiserror::Error;
use time::UtcDateTime;
use yatube_common::{
    model::{
        Id, ModelValidationError,
        auth::{AuthTokenHash, Authentication, HashedPassword},
        comment::{Comment, CreateComment},
        follow::{Follow, FollowStats},
        group::{CreateGroup, Group, GroupMarker, GroupSlug},
        post::{CreatePost, Post, PostFilter, PostMarker, UpdatePost},
        user::{CreateUser, User, UserMarker, Username},
    },
    page::{Page, PageRequest},
    snowflake::{ProcessId, Snowflake, SnowflakeGenerator, SnowflakeTimeError, WorkerId},
};

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("Applying migrations failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("Generating an id failed: {0}")]
    Snowflake(#[from] SnowflakeTimeError),
    #[error("The username {0} is already taken")]
    UsernameTaken(Username),
    #[error("The group slug {0} is already taken")]
    SlugTaken(GroupSlug),
    #[error("User {0} cannot follow themself")]
    SelfFollow(Id<UserMarker>),
    #[error("Referenced {0} does not exist")]
    MissingReference(&'static str),
}

/// Persistence for everything the site shows.
///
/// Lookups that find nothing return `Ok(None)`; only storage failures
/// and constraint violations are errors.
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_user(&self, user: &CreateUser, password: &HashedPassword) -> Result<User>;
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>>;
    async fn fetch_user_by_username(&self, username: &Username) -> Result<Option<User>>;
    async fn fetch_password_hash(
        &self,
        username: &Username,
    ) -> Result<Option<(Id<UserMarker>, HashedPassword)>>;

    async fn create_session(&self, session: &Authentication) -> Result<()>;
    async fn fetch_session(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>>;
    /// Returns whether a session was removed.
    async fn delete_session(&self, token_hash: &AuthTokenHash) -> Result<bool>;
    /// Removes every session that expired before `now` and returns how many.
    async fn delete_expired_sessions(&self, now: UtcDateTime) -> Result<u64>;

    async fn create_group(&self, group: &CreateGroup) -> Result<Group>;
    async fn fetch_group(&self, group_id: Id<GroupMarker>) -> Result<Option<Group>>;
    async fn fetch_group_by_slug(&self, slug: &GroupSlug) -> Result<Option<Group>>;
    /// All groups, ordered by title.
    async fn fetch_groups(&self) -> Result<Vec<Group>>;

    async fn create_post(&self, post: &CreatePost) -> Result<Post>;
    /// Returns `None` when the post does not exist.
    async fn update_post(&self, post_id: Id<PostMarker>, post: &UpdatePost) -> Result<Option<Post>>;
    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>>;
    /// Newest first.
    async fn fetch_posts(
        &self,
        filter: PostFilter,
        page: PageRequest,
        page_size: NonZeroU64,
    ) -> Result<Page<Post>>;
    async fn count_user_posts(&self, user_id: Id<UserMarker>) -> Result<u64>;

    async fn create_comment(&self, comment: &CreateComment) -> Result<Comment>;
    /// Oldest first.
    async fn fetch_post_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>>;

    /// Get-or-create. Returns whether a new follow was recorded.
    async fn follow(&self, follow: Follow) -> Result<bool>;
    /// Returns whether a follow was removed.
    async fn unfollow(&self, follow: Follow) -> Result<bool>;
    async fn is_following(&self, follow: Follow) -> Result<bool>;
    async fn follow_stats(&self, user_id: Id<UserMarker>) -> Result<FollowStats>;
}

/// Shared snowflake source for store implementations.
#[derive(Debug)]
pub(crate) struct IdGenerator(Mutex<SnowflakeGenerator>);

impl IdGenerator {
    pub(crate) fn new(worker_id: WorkerId, process_id: ProcessId) -> Self {
        Self(Mutex::new(SnowflakeGenerator::new(worker_id, process_id)))
    }

    pub(crate) fn next<Marker>(&self) -> Result<Id<Marker>> {
        let snowflake: Snowflake = self
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generate()?;
        Ok(snowflake.into())
    }
}
