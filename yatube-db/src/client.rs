use crate::{
    record::{
        AuthenticationRecord, CredentialsRecord, FullCommentRecord, FullPostRecord, GroupRecord,
        UserRecord, to_db_time,
    },
    store::{DbError, IdGenerator, Result, Store},
};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, query, query_as, query_scalar};
use std::num::NonZeroU64;
use time::UtcDateTime;
use tracing::info;
use yatube_common::{
    model::{
        Id,
        auth::{AuthTokenHash, Authentication, HashedPassword},
        comment::{Comment, CommentMarker, CreateComment},
        follow::{Follow, FollowStats},
        group::{CreateGroup, Group, GroupMarker, GroupSlug},
        post::{CreatePost, Post, PostFilter, PostMarker, UpdatePost},
        user::{CreateUser, User, UserMarker, Username},
    },
    page::{Page, PageRequest},
    snowflake::{ProcessId, WorkerId},
};

const USER_COLUMNS: &str = "
    users.user_snowflake,
    users.username,
    users.first_name,
    users.last_name,
    users.email,
    users.date_joined";

const POST_SELECT: &str = "
    SELECT
        posts.post_snowflake,
        posts.text,
        posts.pub_date,
        posts.image,
        users.user_snowflake,
        users.username,
        users.first_name,
        users.last_name,
        users.email,
        users.date_joined,
        groups.group_snowflake,
        groups.title AS group_title,
        groups.slug AS group_slug,
        groups.description AS group_description
    FROM
        posts.posts
        JOIN users.users ON users.user_snowflake = posts.user_snowflake
        LEFT JOIN posts.groups ON groups.group_snowflake = posts.group_snowflake
    ";

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_foreign_key_violation())
}

fn push_post_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: PostFilter) {
    match filter {
        PostFilter::All => {}
        PostFilter::Group(group_id) => {
            builder
                .push(" WHERE posts.group_snowflake = ")
                .push_bind(group_id.to_db());
        }
        PostFilter::Author(user_id) => {
            builder
                .push(" WHERE posts.user_snowflake = ")
                .push_bind(user_id.to_db());
        }
        PostFilter::FollowedBy(user_id) => {
            builder
                .push(
                    " WHERE posts.user_snowflake IN \
                    (SELECT follows.author_snowflake FROM users.follows \
                    WHERE follows.user_snowflake = ",
                )
                .push_bind(user_id.to_db())
                .push(")");
        }
    }
}

/// [`Store`] backed by PostgreSQL.
pub struct DbClient {
    pool: PgPool,
    ids: IdGenerator,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool, worker_id: WorkerId, process_id: ProcessId) -> Self {
        Self {
            pool,
            ids: IdGenerator::new(worker_id, process_id),
        }
    }

    pub async fn connect(url: &str, worker_id: WorkerId, process_id: ProcessId) -> Result<Self> {
        let pool = PgPool::connect(url).await?;
        Ok(Self::new(pool, worker_id, process_id))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations are up to date");
        Ok(())
    }

    async fn fetch_user_where(&self, condition: &str, bind: UserLookup<'_>) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users.users WHERE {condition}");
        let query = query_as::<_, UserRecord>(&sql);
        let query = match bind {
            UserLookup::Id(user_id) => query.bind(user_id.to_db()),
            UserLookup::Username(username) => query.bind(username.get()),
        };

        let record = query.fetch_optional(&self.pool).await?;
        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }
}

enum UserLookup<'a> {
    Id(Id<UserMarker>),
    Username(&'a Username),
}

#[async_trait]
impl Store for DbClient {
    async fn create_user(&self, user: &CreateUser, password: &HashedPassword) -> Result<User> {
        let user_id = self.ids.next::<UserMarker>()?;
        let date_joined = UtcDateTime::now();

        query(
            "
            INSERT INTO users.users
                (user_snowflake, username, first_name, last_name, email, password_hash, date_joined)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(user_id.to_db())
        .bind(user.username.get())
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(password.as_phc())
        .bind(to_db_time(date_joined))
        .execute(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                DbError::UsernameTaken(user.username.clone())
            } else {
                err.into()
            }
        })?;

        Ok(User {
            id: user_id,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            date_joined,
        })
    }

    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        self.fetch_user_where("users.user_snowflake = $1", UserLookup::Id(user_id))
            .await
    }

    async fn fetch_user_by_username(&self, username: &Username) -> Result<Option<User>> {
        self.fetch_user_where("users.username = $1", UserLookup::Username(username))
            .await
    }

    async fn fetch_password_hash(
        &self,
        username: &Username,
    ) -> Result<Option<(Id<UserMarker>, HashedPassword)>> {
        let record = query_as::<_, CredentialsRecord>(
            "
            SELECT
                users.user_snowflake,
                users.password_hash
            FROM
                users.users
            WHERE
                users.username = $1
            ",
        )
        .bind(username.get())
        .fetch_optional(&self.pool)
        .await?;

        let credentials = record.map(CredentialsRecord::into_credentials).transpose()?;
        Ok(credentials)
    }

    async fn create_session(&self, session: &Authentication) -> Result<()> {
        query(
            "
            INSERT INTO users.sessions (token_hash, user_snowflake, created_at, expires_after_seconds)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(&session.token_hash.0[..])
        .bind(session.user.to_db())
        .bind(to_db_time(session.created_at))
        .bind(session.expires_after.map(|duration| duration.whole_seconds()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fetch_session(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        let record = query_as::<_, AuthenticationRecord>(
            "
            SELECT
                sessions.user_snowflake,
                sessions.token_hash,
                sessions.created_at,
                sessions.expires_after_seconds
            FROM
                users.sessions
            WHERE
                sessions.token_hash = $1
            ",
        )
        .bind(&token_hash.0[..])
        .fetch_optional(&self.pool)
        .await?;

        let session = record.map(Authentication::try_from).transpose()?;
        Ok(session)
    }

    async fn delete_session(&self, token_hash: &AuthTokenHash) -> Result<bool> {
        let result = query("DELETE FROM users.sessions WHERE sessions.token_hash = $1")
            .bind(&token_hash.0[..])
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired_sessions(&self, now: UtcDateTime) -> Result<u64> {
        let result = query(
            "
            DELETE FROM users.sessions
            WHERE
                sessions.expires_after_seconds IS NOT NULL
                AND sessions.created_at + sessions.expires_after_seconds * INTERVAL '1 second' < $1
            ",
        )
        .bind(to_db_time(now))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn create_group(&self, group: &CreateGroup) -> Result<Group> {
        let group_id = self.ids.next::<GroupMarker>()?;

        query(
            "
            INSERT INTO posts.groups (group_snowflake, title, slug, description)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(group_id.to_db())
        .bind(&group.title)
        .bind(group.slug.get())
        .bind(&group.description)
        .execute(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                DbError::SlugTaken(group.slug.clone())
            } else {
                err.into()
            }
        })?;

        Ok(Group {
            id: group_id,
            title: group.title.clone(),
            slug: group.slug.clone(),
            description: group.description.clone(),
        })
    }

    async fn fetch_group(&self, group_id: Id<GroupMarker>) -> Result<Option<Group>> {
        let record = query_as::<_, GroupRecord>(
            "
            SELECT groups.group_snowflake, groups.title, groups.slug, groups.description
            FROM posts.groups
            WHERE groups.group_snowflake = $1
            ",
        )
        .bind(group_id.to_db())
        .fetch_optional(&self.pool)
        .await?;

        let group = record.map(Group::try_from).transpose()?;
        Ok(group)
    }

    async fn fetch_group_by_slug(&self, slug: &GroupSlug) -> Result<Option<Group>> {
        let record = query_as::<_, GroupRecord>(
            "
            SELECT groups.group_snowflake, groups.title, groups.slug, groups.description
            FROM posts.groups
            WHERE groups.slug = $1
            ",
        )
        .bind(slug.get())
        .fetch_optional(&self.pool)
        .await?;

        let group = record.map(Group::try_from).transpose()?;
        Ok(group)
    }

    async fn fetch_groups(&self) -> Result<Vec<Group>> {
        let records = query_as::<_, GroupRecord>(
            "
            SELECT groups.group_snowflake, groups.title, groups.slug, groups.description
            FROM posts.groups
            ORDER BY groups.title, groups.group_snowflake
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        let groups = records
            .into_iter()
            .map(Group::try_from)
            .collect::<Result<_, _>>()?;
        Ok(groups)
    }

    async fn create_post(&self, post: &CreatePost) -> Result<Post> {
        let post_id = self.ids.next::<PostMarker>()?;

        query(
            "
            INSERT INTO posts.posts (post_snowflake, text, pub_date, user_snowflake, group_snowflake, image)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(post_id.to_db())
        .bind(&post.text)
        .bind(to_db_time(UtcDateTime::now()))
        .bind(post.author.to_db())
        .bind(post.group.map(Id::to_db))
        .bind(post.image.as_ref().map(|image| image.get()))
        .execute(&self.pool)
        .await
        .map_err(|err| {
            if is_foreign_key_violation(&err) {
                DbError::MissingReference("author or group")
            } else {
                err.into()
            }
        })?;

        self.fetch_post(post_id)
            .await?
            .ok_or(DbError::MissingReference("post"))
    }

    async fn update_post(&self, post_id: Id<PostMarker>, post: &UpdatePost) -> Result<Option<Post>> {
        let result = query(
            "
            UPDATE posts.posts
            SET
                text = $2,
                group_snowflake = $3,
                image = COALESCE($4, posts.image)
            WHERE posts.post_snowflake = $1
            ",
        )
        .bind(post_id.to_db())
        .bind(&post.text)
        .bind(post.group.map(Id::to_db))
        .bind(post.image.as_ref().map(|image| image.get()))
        .execute(&self.pool)
        .await
        .map_err(|err| {
            if is_foreign_key_violation(&err) {
                DbError::MissingReference("group")
            } else {
                err.into()
            }
        })?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.fetch_post(post_id).await
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let mut builder = QueryBuilder::<Postgres>::new(POST_SELECT);
        builder
            .push(" WHERE posts.post_snowflake = ")
            .push_bind(post_id.to_db());

        let record = builder
            .build_query_as::<FullPostRecord>()
            .fetch_optional(&self.pool)
            .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    async fn fetch_posts(
        &self,
        filter: PostFilter,
        page: PageRequest,
        page_size: NonZeroU64,
    ) -> Result<Page<Post>> {
        let mut count_builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM posts.posts");
        push_post_filter(&mut count_builder, filter);
        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;
        let total = total.cast_unsigned();

        let window = page.resolve(total, page_size);

        let mut builder = QueryBuilder::<Postgres>::new(POST_SELECT);
        push_post_filter(&mut builder, filter);
        builder
            .push(" ORDER BY posts.pub_date DESC, posts.post_snowflake DESC LIMIT ")
            .push_bind(window.limit.cast_signed())
            .push(" OFFSET ")
            .push_bind(window.offset.cast_signed());

        let records = builder
            .build_query_as::<FullPostRecord>()
            .fetch_all(&self.pool)
            .await?;

        let posts = records
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<_, _>>()?;
        Ok(Page::new(posts, window, total))
    }

    async fn count_user_posts(&self, user_id: Id<UserMarker>) -> Result<u64> {
        let count: i64 = query_scalar("SELECT COUNT(*) FROM posts.posts WHERE posts.user_snowflake = $1")
            .bind(user_id.to_db())
            .fetch_one(&self.pool)
            .await?;

        Ok(count.cast_unsigned())
    }

    async fn create_comment(&self, comment: &CreateComment) -> Result<Comment> {
        let comment_id = self.ids.next::<CommentMarker>()?;
        let created = UtcDateTime::now();

        query(
            "
            INSERT INTO posts.comments (comment_snowflake, post_snowflake, user_snowflake, text, created)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(comment_id.to_db())
        .bind(comment.post.to_db())
        .bind(comment.author.to_db())
        .bind(&comment.text)
        .bind(to_db_time(created))
        .execute(&self.pool)
        .await
        .map_err(|err| {
            if is_foreign_key_violation(&err) {
                DbError::MissingReference("post or author")
            } else {
                err.into()
            }
        })?;

        let author = self
            .fetch_user(comment.author)
            .await?
            .ok_or(DbError::MissingReference("author"))?;

        Ok(Comment {
            id: comment_id,
            post: comment.post,
            author,
            text: comment.text.clone(),
            created,
        })
    }

    async fn fetch_post_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let sql = format!(
            "
            SELECT
                comments.comment_snowflake,
                comments.post_snowflake,
                comments.text,
                comments.created,
                {USER_COLUMNS}
            FROM
                posts.comments
                JOIN users.users ON users.user_snowflake = comments.user_snowflake
            WHERE
                comments.post_snowflake = $1
            ORDER BY comments.created, comments.comment_snowflake
            "
        );
        let records = query_as::<_, FullCommentRecord>(&sql)
            .bind(post_id.to_db())
            .fetch_all(&self.pool)
            .await?;

        let comments = records
            .into_iter()
            .map(Comment::try_from)
            .collect::<Result<_, _>>()?;
        Ok(comments)
    }

    async fn follow(&self, follow: Follow) -> Result<bool> {
        if follow.is_self_follow() {
            return Err(DbError::SelfFollow(follow.user));
        }

        let result = query(
            "
            INSERT INTO users.follows (user_snowflake, author_snowflake)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(follow.user.to_db())
        .bind(follow.author.to_db())
        .execute(&self.pool)
        .await
        .map_err(|err| {
            if is_foreign_key_violation(&err) {
                DbError::MissingReference("user or author")
            } else {
                err.into()
            }
        })?;

        Ok(result.rows_affected() > 0)
    }

    async fn unfollow(&self, follow: Follow) -> Result<bool> {
        let result = query(
            "
            DELETE FROM users.follows
            WHERE follows.user_snowflake = $1 AND follows.author_snowflake = $2
            ",
        )
        .bind(follow.user.to_db())
        .bind(follow.author.to_db())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn is_following(&self, follow: Follow) -> Result<bool> {
        let exists: bool = query_scalar(
            "
            SELECT EXISTS (
                SELECT 1 FROM users.follows
                WHERE follows.user_snowflake = $1 AND follows.author_snowflake = $2
            )
            ",
        )
        .bind(follow.user.to_db())
        .bind(follow.author.to_db())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn follow_stats(&self, user_id: Id<UserMarker>) -> Result<FollowStats> {
        let (followers, following): (i64, i64) = query_as(
            "
            SELECT
                (SELECT COUNT(*) FROM users.follows WHERE follows.author_snowflake = $1),
                (SELECT COUNT(*) FROM users.follows WHERE follows.user_snowflake = $1)
            ",
        )
        .bind(user_id.to_db())
        .fetch_one(&self.pool)
        .await?;

        Ok(FollowStats {
            followers: followers.cast_unsigned(),
            following: following.cast_unsigned(),
        })
    }
}
