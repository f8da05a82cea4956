use crate::server::{
    Result, ServerError, ServerRouter, Settings,
    auth::Viewer,
    routes::{PageParam, page_request},
    templates,
};
use axum::{Router, extract::State, response::Html};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use std::sync::Arc;
use yatube_common::model::{group::GroupSlug, post::PostFilter};
use yatube_db::Store;

pub fn routes() -> ServerRouter {
    Router::new().typed_get(group_posts)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/group/{slug}/", rejection(ServerError))]
struct GroupPath {
    slug: String,
}

async fn group_posts(
    GroupPath { slug }: GroupPath,
    page: PageParam,
    viewer: Viewer,
    State(store): State<Arc<dyn Store>>,
    State(settings): State<Arc<Settings>>,
) -> Result<Html<String>> {
    let group = match GroupSlug::new(slug.clone()) {
        Ok(group_slug) => store.fetch_group_by_slug(&group_slug).await?,
        Err(_) => None,
    }
    .ok_or(ServerError::GroupNotFound(slug))?;

    let posts = store
        .fetch_posts(PostFilter::Group(group.id), page_request(page), settings.page_size)
        .await?;

    let mut context = templates::context(viewer.user());
    context.insert("group", &group);
    context.insert("page", &posts);
    Ok(templates::render("group.html", &context)?)
}
