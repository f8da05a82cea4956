use crate::server::{Result, ServerError, ServerRouter};
use axum::{Router, extract::Query};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use yatube_common::{
    model::{Id, post::{Post, PostMarker}, user::Username},
    page::PageRequest,
};
use yatube_db::Store;

mod about;
mod accounts;
mod comments;
mod groups;
mod posts;
mod profiles;

pub fn routes() -> ServerRouter {
    Router::new()
        .merge(posts::routes())
        .merge(groups::routes())
        .merge(profiles::routes())
        .merge(comments::routes())
        .merge(accounts::routes())
        .merge(about::routes())
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
pub struct PageQuery {
    page: Option<String>,
}

/// The `?page=` parameter of a listing.
pub type PageParam = WithRejection<Query<PageQuery>, ServerError>;

fn page_request(WithRejection(Query(query), _): PageParam) -> PageRequest {
    PageRequest::parse(query.page.as_deref())
}

/// Looks a post up by its address, which has to name its actual author.
async fn fetch_authored_post(
    store: &dyn Store,
    username: &str,
    post_id: Id<PostMarker>,
) -> Result<Post> {
    store
        .fetch_post(post_id)
        .await?
        .filter(|post| post.author.username.get() == username)
        .ok_or(ServerError::PostNotFound(post_id))
}

fn parse_username(username: String) -> Result<Username> {
    Username::new(username.clone()).map_err(|_| ServerError::UserNotFound(username))
}

fn post_path(post: &Post) -> String {
    format!("/{}/{}/", post.author.username, post.id)
}

fn profile_path(username: &Username) -> String {
    format!("/{username}/")
}
