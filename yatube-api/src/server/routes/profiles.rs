use crate::server::{
    Found, Result, ServerError, ServerRouter, Settings,
    auth::{AuthenticatedUser, Viewer},
    routes::{PageParam, page_request, parse_username, profile_path},
    templates,
};
use axum::{Router, extract::State, response::Html};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use yatube_common::model::{follow::Follow, post::PostFilter, user::User};
use yatube_db::Store;

pub fn routes() -> ServerRouter {
    Router::new()
        .typed_get(profile)
        .typed_get(follow_index)
        .typed_get(profile_follow)
        .typed_get(profile_unfollow)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/{username}/", rejection(ServerError))]
struct ProfilePath {
    username: String,
}

#[derive(TypedPath)]
#[typed_path("/follow/")]
struct FollowIndexPath;

#[derive(TypedPath, Deserialize)]
#[typed_path("/{username}/follow/", rejection(ServerError))]
struct FollowPath {
    username: String,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/{username}/unfollow/", rejection(ServerError))]
struct UnfollowPath {
    username: String,
}

async fn fetch_author(store: &dyn Store, username: String) -> Result<User> {
    let parsed = parse_username(username)?;
    store
        .fetch_user_by_username(&parsed)
        .await?
        .ok_or_else(|| ServerError::UserNotFound(parsed.into_inner()))
}

async fn profile(
    ProfilePath { username }: ProfilePath,
    page: PageParam,
    viewer: Viewer,
    State(store): State<Arc<dyn Store>>,
    State(settings): State<Arc<Settings>>,
) -> Result<Html<String>> {
    let author = fetch_author(store.as_ref(), username).await?;

    let posts = store
        .fetch_posts(PostFilter::Author(author.id), page_request(page), settings.page_size)
        .await?;
    let stats = store.follow_stats(author.id).await?;
    let following = match viewer.user_id() {
        Some(user) => {
            store
                .is_following(Follow {
                    user,
                    author: author.id,
                })
                .await?
        }
        None => false,
    };

    let mut context = templates::context(viewer.user());
    context.insert("author", &author);
    context.insert("page", &posts);
    context.insert("post_user_count", &posts.total);
    context.insert("following", &following);
    context.insert("stats", &stats);
    Ok(templates::render("profile.html", &context)?)
}

async fn follow_index(
    _: FollowIndexPath,
    page: PageParam,
    AuthenticatedUser(viewer): AuthenticatedUser,
    State(store): State<Arc<dyn Store>>,
    State(settings): State<Arc<Settings>>,
) -> Result<Html<String>> {
    let posts = store
        .fetch_posts(PostFilter::FollowedBy(viewer.id), page_request(page), settings.page_size)
        .await?;

    let mut context = templates::context(Some(&viewer));
    context.insert("page", &posts);
    Ok(templates::render("follow.html", &context)?)
}

async fn profile_follow(
    FollowPath { username }: FollowPath,
    AuthenticatedUser(viewer): AuthenticatedUser,
    State(store): State<Arc<dyn Store>>,
) -> Result<Found> {
    let author = fetch_author(store.as_ref(), username).await?;

    if author.id != viewer.id {
        let created = store
            .follow(Follow {
                user: viewer.id,
                author: author.id,
            })
            .await?;
        if created {
            info!(user = %viewer.username, author = %author.username, "Followed author");
        }
    }

    Ok(Found::to(profile_path(&author.username)))
}

async fn profile_unfollow(
    UnfollowPath { username }: UnfollowPath,
    AuthenticatedUser(viewer): AuthenticatedUser,
    State(store): State<Arc<dyn Store>>,
) -> Result<Found> {
    let author = fetch_author(store.as_ref(), username).await?;

    if author.id != viewer.id {
        let removed = store
            .unfollow(Follow {
                user: viewer.id,
                author: author.id,
            })
            .await?;
        if removed {
            info!(user = %viewer.username, author = %author.username, "Unfollowed author");
        }
    }

    Ok(Found::to(profile_path(&author.username)))
}
