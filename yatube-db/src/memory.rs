//! A [`Store`] kept entirely in process memory.
//!
//! Enforces the same uniqueness and reference rules as the PostgreSQL
//! schema. Nothing survives a restart.

use crate::store::{DbError, IdGenerator, Result, Store};
use async_trait::async_trait;
use std::{
    collections::BTreeSet,
    num::NonZeroU64,
    sync::{Mutex, MutexGuard, PoisonError},
};
use time::UtcDateTime;
use yatube_common::{
    model::{
        Id,
        auth::{AuthTokenHash, Authentication, HashedPassword},
        comment::{Comment, CommentMarker, CreateComment},
        follow::{Follow, FollowStats},
        group::{CreateGroup, Group, GroupMarker, GroupSlug},
        post::{CreatePost, ImagePath, Post, PostFilter, PostMarker, UpdatePost},
        user::{CreateUser, User, UserMarker, Username},
    },
    page::{Page, PageRequest},
    snowflake::{ProcessId, WorkerId},
};

#[derive(Clone, Debug)]
struct StoredUser {
    user: User,
    password: HashedPassword,
}

#[derive(Clone, Debug)]
struct StoredPost {
    id: Id<PostMarker>,
    text: String,
    pub_date: UtcDateTime,
    author: Id<UserMarker>,
    group: Option<Id<GroupMarker>>,
    image: Option<ImagePath>,
}

#[derive(Clone, Debug)]
struct StoredComment {
    id: Id<CommentMarker>,
    post: Id<PostMarker>,
    author: Id<UserMarker>,
    text: String,
    created: UtcDateTime,
}

#[derive(Debug, Default)]
struct Tables {
    users: Vec<StoredUser>,
    sessions: Vec<Authentication>,
    groups: Vec<Group>,
    posts: Vec<StoredPost>,
    comments: Vec<StoredComment>,
    follows: BTreeSet<Follow>,
}

impl Tables {
    fn user(&self, user_id: Id<UserMarker>) -> Option<&User> {
        self.users
            .iter()
            .map(|stored| &stored.user)
            .find(|user| user.id == user_id)
    }

    fn group(&self, group_id: Id<GroupMarker>) -> Option<&Group> {
        self.groups.iter().find(|group| group.id == group_id)
    }

    fn resolve_post(&self, post: &StoredPost) -> Result<Post> {
        let author = self
            .user(post.author)
            .cloned()
            .ok_or(DbError::MissingReference("author"))?;

        Ok(Post {
            id: post.id,
            text: post.text.clone(),
            pub_date: post.pub_date,
            author,
            group: post.group.and_then(|group_id| self.group(group_id).cloned()),
            image: post.image.clone(),
        })
    }

    fn resolve_comment(&self, comment: &StoredComment) -> Result<Comment> {
        let author = self
            .user(comment.author)
            .cloned()
            .ok_or(DbError::MissingReference("author"))?;

        Ok(Comment {
            id: comment.id,
            post: comment.post,
            author,
            text: comment.text.clone(),
            created: comment.created,
        })
    }

    fn matches(&self, post: &StoredPost, filter: PostFilter) -> bool {
        match filter {
            PostFilter::All => true,
            PostFilter::Group(group_id) => post.group == Some(group_id),
            PostFilter::Author(user_id) => post.author == user_id,
            PostFilter::FollowedBy(user_id) => self.follows.contains(&Follow {
                user: user_id,
                author: post.author,
            }),
        }
    }
}

pub struct MemoryStore {
    tables: Mutex<Tables>,
    ids: IdGenerator,
}

impl MemoryStore {
    #[must_use]
    pub fn new(worker_id: WorkerId, process_id: ProcessId) -> Self {
        Self {
            tables: Mutex::default(),
            ids: IdGenerator::new(worker_id, process_id),
        }
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(WorkerId::default(), ProcessId::default())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: &CreateUser, password: &HashedPassword) -> Result<User> {
        let user_id = self.ids.next()?;
        let mut tables = self.tables();

        if tables
            .users
            .iter()
            .any(|stored| stored.user.username == user.username)
        {
            return Err(DbError::UsernameTaken(user.username.clone()));
        }

        let created = User {
            id: user_id,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            date_joined: UtcDateTime::now(),
        };
        tables.users.push(StoredUser {
            user: created.clone(),
            password: password.clone(),
        });

        Ok(created)
    }

    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        Ok(self.tables().user(user_id).cloned())
    }

    async fn fetch_user_by_username(&self, username: &Username) -> Result<Option<User>> {
        Ok(self
            .tables()
            .users
            .iter()
            .find(|stored| &stored.user.username == username)
            .map(|stored| stored.user.clone()))
    }

    async fn fetch_password_hash(
        &self,
        username: &Username,
    ) -> Result<Option<(Id<UserMarker>, HashedPassword)>> {
        Ok(self
            .tables()
            .users
            .iter()
            .find(|stored| &stored.user.username == username)
            .map(|stored| (stored.user.id, stored.password.clone())))
    }

    async fn create_session(&self, session: &Authentication) -> Result<()> {
        let mut tables = self.tables();
        if tables.user(session.user).is_none() {
            return Err(DbError::MissingReference("user"));
        }
        tables.sessions.push(session.clone());
        Ok(())
    }

    async fn fetch_session(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        Ok(self
            .tables()
            .sessions
            .iter()
            .find(|session| &session.token_hash == token_hash)
            .cloned())
    }

    async fn delete_session(&self, token_hash: &AuthTokenHash) -> Result<bool> {
        let mut tables = self.tables();
        let before = tables.sessions.len();
        tables
            .sessions
            .retain(|session| &session.token_hash != token_hash);
        Ok(tables.sessions.len() < before)
    }

    async fn delete_expired_sessions(&self, now: UtcDateTime) -> Result<u64> {
        let mut tables = self.tables();
        let before = tables.sessions.len();
        tables.sessions.retain(|session| !session.is_expired_at(now));
        Ok((before - tables.sessions.len()) as u64)
    }

    async fn create_group(&self, group: &CreateGroup) -> Result<Group> {
        let group_id = self.ids.next()?;
        let mut tables = self.tables();

        if tables.groups.iter().any(|existing| existing.slug == group.slug) {
            return Err(DbError::SlugTaken(group.slug.clone()));
        }

        let created = Group {
            id: group_id,
            title: group.title.clone(),
            slug: group.slug.clone(),
            description: group.description.clone(),
        };
        tables.groups.push(created.clone());

        Ok(created)
    }

    async fn fetch_group(&self, group_id: Id<GroupMarker>) -> Result<Option<Group>> {
        Ok(self.tables().group(group_id).cloned())
    }

    async fn fetch_group_by_slug(&self, slug: &GroupSlug) -> Result<Option<Group>> {
        Ok(self
            .tables()
            .groups
            .iter()
            .find(|group| &group.slug == slug)
            .cloned())
    }

    async fn fetch_groups(&self) -> Result<Vec<Group>> {
        let mut groups = self.tables().groups.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(groups)
    }

    async fn create_post(&self, post: &CreatePost) -> Result<Post> {
        let post_id = self.ids.next()?;
        let mut tables = self.tables();

        if tables.user(post.author).is_none() {
            return Err(DbError::MissingReference("author"));
        }
        if post.group.is_some_and(|group_id| tables.group(group_id).is_none()) {
            return Err(DbError::MissingReference("group"));
        }

        let stored = StoredPost {
            id: post_id,
            text: post.text.clone(),
            pub_date: UtcDateTime::now(),
            author: post.author,
            group: post.group,
            image: post.image.clone(),
        };
        let created = tables.resolve_post(&stored)?;
        tables.posts.push(stored);

        Ok(created)
    }

    async fn update_post(&self, post_id: Id<PostMarker>, post: &UpdatePost) -> Result<Option<Post>> {
        let mut tables = self.tables();

        if post.group.is_some_and(|group_id| tables.group(group_id).is_none()) {
            return Err(DbError::MissingReference("group"));
        }

        let Some(stored) = tables.posts.iter_mut().find(|stored| stored.id == post_id) else {
            return Ok(None);
        };
        stored.text.clone_from(&post.text);
        stored.group = post.group;
        if let Some(image) = &post.image {
            stored.image = Some(image.clone());
        }

        let stored = stored.clone();
        tables.resolve_post(&stored).map(Some)
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let tables = self.tables();
        tables
            .posts
            .iter()
            .find(|stored| stored.id == post_id)
            .map(|stored| tables.resolve_post(stored))
            .transpose()
    }

    async fn fetch_posts(
        &self,
        filter: PostFilter,
        page: PageRequest,
        page_size: NonZeroU64,
    ) -> Result<Page<Post>> {
        let tables = self.tables();

        let mut matching: Vec<&StoredPost> = tables
            .posts
            .iter()
            .filter(|stored| tables.matches(stored, filter))
            .collect();
        matching.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));

        let total = matching.len() as u64;
        let window = page.resolve(total, page_size);
        let posts = matching[window.range(matching.len())]
            .iter()
            .map(|stored| tables.resolve_post(stored))
            .collect::<Result<_>>()?;

        Ok(Page::new(posts, window, total))
    }

    async fn count_user_posts(&self, user_id: Id<UserMarker>) -> Result<u64> {
        let count = self
            .tables()
            .posts
            .iter()
            .filter(|stored| stored.author == user_id)
            .count();
        Ok(count as u64)
    }

    async fn create_comment(&self, comment: &CreateComment) -> Result<Comment> {
        let comment_id = self.ids.next()?;
        let mut tables = self.tables();

        if !tables.posts.iter().any(|stored| stored.id == comment.post) {
            return Err(DbError::MissingReference("post"));
        }

        let stored = StoredComment {
            id: comment_id,
            post: comment.post,
            author: comment.author,
            text: comment.text.clone(),
            created: UtcDateTime::now(),
        };
        let created = tables.resolve_comment(&stored)?;
        tables.comments.push(stored);

        Ok(created)
    }

    async fn fetch_post_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let tables = self.tables();
        let mut comments: Vec<&StoredComment> = tables
            .comments
            .iter()
            .filter(|comment| comment.post == post_id)
            .collect();
        comments.sort_by(|a, b| a.created.cmp(&b.created).then(a.id.cmp(&b.id)));

        comments
            .into_iter()
            .map(|comment| tables.resolve_comment(comment))
            .collect()
    }

    async fn follow(&self, follow: Follow) -> Result<bool> {
        if follow.is_self_follow() {
            return Err(DbError::SelfFollow(follow.user));
        }

        let mut tables = self.tables();
        if tables.user(follow.user).is_none() || tables.user(follow.author).is_none() {
            return Err(DbError::MissingReference("user or author"));
        }

        Ok(tables.follows.insert(follow))
    }

    async fn unfollow(&self, follow: Follow) -> Result<bool> {
        Ok(self.tables().follows.remove(&follow))
    }

    async fn is_following(&self, follow: Follow) -> Result<bool> {
        Ok(self.tables().follows.contains(&follow))
    }

    async fn follow_stats(&self, user_id: Id<UserMarker>) -> Result<FollowStats> {
        let tables = self.tables();
        let followers = tables
            .follows
            .iter()
            .filter(|follow| follow.author == user_id)
            .count();
        let following = tables
            .follows
            .iter()
            .filter(|follow| follow.user == user_id)
            .count();

        Ok(FollowStats {
            followers: followers as u64,
            following: following as u64,
        })
    }
}
