use crate::server::{Result, ServerRouter, auth::Viewer, templates};
use axum::{Router, response::Html};
use axum_extra::routing::{RouterExt, TypedPath};

pub fn routes() -> ServerRouter {
    Router::new().typed_get(author).typed_get(tech)
}

#[derive(TypedPath)]
#[typed_path("/about/author/")]
struct AuthorPath;

#[derive(TypedPath)]
#[typed_path("/about/tech/")]
struct TechPath;

async fn author(_: AuthorPath, viewer: Viewer) -> Result<Html<String>> {
    Ok(templates::render("about/author.html", &templates::context(viewer.user()))?)
}

async fn tech(_: TechPath, viewer: Viewer) -> Result<Html<String>> {
    Ok(templates::render("about/tech.html", &templates::context(viewer.user()))?)
}
