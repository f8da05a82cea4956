use crate::server::{
    Found, Result, ServerError, ServerRouter,
    auth::Viewer,
    forms::{CommentForm, CommentFormView},
    routes::{fetch_authored_post, post_path},
    templates,
};
use axum::{
    Form, Router,
    extract::{FromRef, FromRequestParts, State},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use axum_extra::{
    extract::WithRejection,
    routing::{RouterExt, TypedPath},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use yatube_common::model::{
    Id,
    comment::CreateComment,
    post::{Post, PostMarker},
    user::User,
};
use yatube_db::Store;

pub fn routes() -> ServerRouter {
    Router::new()
        .typed_get(comment_form)
        .typed_post(add_comment)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/{username}/{post_id}/comment/", rejection(ServerError))]
struct CommentPath {
    username: String,
    post_id: Id<PostMarker>,
}

/// The logged in user writing a comment. Guests are sent to the login
/// page without a way back, before any request body is read.
struct Commenter(User);

impl<S> FromRequestParts<S> for Commenter
where
    Arc<dyn Store>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Viewer(user) = Viewer::from_request_parts(parts, state).await?;
        user.map(Self).ok_or(ServerError::LoginRequired(None))
    }
}

fn render_comment_form(viewer: &User, post: &Post, form: &CommentFormView) -> Result<Response> {
    let mut context = templates::context(Some(viewer));
    context.insert("post", post);
    context.insert("form", form);
    Ok(templates::render("comments.html", &context)?.into_response())
}

async fn comment_form(
    CommentPath { username, post_id }: CommentPath,
    Commenter(viewer): Commenter,
    State(store): State<Arc<dyn Store>>,
) -> Result<Response> {
    let post = fetch_authored_post(store.as_ref(), &username, post_id).await?;

    render_comment_form(&viewer, &post, &CommentFormView::default())
}

async fn add_comment(
    CommentPath { username, post_id }: CommentPath,
    Commenter(viewer): Commenter,
    State(store): State<Arc<dyn Store>>,
    WithRejection(Form(form), _): WithRejection<Form<CommentForm>, ServerError>,
) -> Result<Response> {
    let post = fetch_authored_post(store.as_ref(), &username, post_id).await?;

    let text = match form.clean() {
        Ok(text) => text,
        Err(form) => return render_comment_form(&viewer, &post, &form),
    };

    let comment = store
        .create_comment(&CreateComment {
            post: post.id,
            author: viewer.id,
            text,
        })
        .await?;
    info!(comment_id = %comment.id, post_id = %post.id, "Added comment");

    Ok(Found::to(post_path(&post)).into_response())
}
