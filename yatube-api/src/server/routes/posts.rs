use crate::server::{
    Found, IndexCache, MediaStore, Result, ServerError, ServerRouter, Settings,
    auth::{AuthenticatedUser, Viewer},
    forms::{CommentFormView, PostForm, PostFormView},
    media::ImageFormat,
    routes::{PageParam, fetch_authored_post, page_request, post_path},
    templates,
};
use axum::{
    Router,
    body::Bytes,
    extract::State,
    response::{Html, IntoResponse, Response},
};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use yatube_common::{
    model::{
        Id,
        group::Group,
        post::{CreatePost, ImagePath, Post, PostFilter, PostMarker, UpdatePost},
        user::User,
    },
    page::PageRequest,
};
use yatube_db::Store;

pub fn routes() -> ServerRouter {
    Router::new()
        .typed_get(index)
        .typed_get(post_view)
        .typed_get(new_post_form)
        .typed_post(create_post)
        .typed_get(edit_post_form)
        .typed_post(update_post)
}

#[derive(TypedPath)]
#[typed_path("/")]
struct IndexPath;

#[derive(TypedPath, Deserialize)]
#[typed_path("/{username}/{post_id}/", rejection(ServerError))]
struct PostPath {
    username: String,
    post_id: Id<PostMarker>,
}

#[derive(TypedPath)]
#[typed_path("/new/")]
struct NewPostPath;

#[derive(TypedPath, Deserialize)]
#[typed_path("/{username}/{post_id}/edit/", rejection(ServerError))]
struct EditPostPath {
    username: String,
    post_id: Id<PostMarker>,
}

/// Texts the shared post form is labelled with.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
struct Captions {
    title: &'static str,
    header: &'static str,
    button: &'static str,
}

const NEW_POST: Captions = Captions {
    title: "New post",
    header: "Add post",
    button: "Add",
};

const EDIT_POST: Captions = Captions {
    title: "Edit post",
    header: "Edit",
    button: "Save",
};

async fn index(
    _: IndexPath,
    page: PageParam,
    viewer: Viewer,
    State(store): State<Arc<dyn Store>>,
    State(cache): State<IndexCache>,
    State(settings): State<Arc<Settings>>,
) -> Result<Html<String>> {
    let requested = page_request(page);
    if let Some(cached) = cache.get(&IndexCache::key(requested, viewer.user_id())).await {
        return Ok(Html(cached));
    }

    let posts = store
        .fetch_posts(PostFilter::All, requested, settings.page_size)
        .await?;

    // Entries are only stored under page numbers that exist.
    let resolved = PageRequest::new(posts.number);
    let key = IndexCache::key(resolved, viewer.user_id());
    if resolved != requested {
        if let Some(cached) = cache.get(&key).await {
            return Ok(Html(cached));
        }
    }

    let mut context = templates::context(viewer.user());
    context.insert("page", &posts);
    let rendered = templates::render_string("index.html", &context)?;

    cache.insert(key, rendered.clone()).await;
    Ok(Html(rendered))
}

async fn post_view(
    PostPath { username, post_id }: PostPath,
    viewer: Viewer,
    State(store): State<Arc<dyn Store>>,
) -> Result<Html<String>> {
    let post = fetch_authored_post(store.as_ref(), &username, post_id).await?;
    let comments = store.fetch_post_comments(post.id).await?;
    let post_user_count = store.count_user_posts(post.author.id).await?;

    let mut context = templates::context(viewer.user());
    context.insert("author", &post.author);
    context.insert("post", &post);
    context.insert("comments", &comments);
    context.insert("form", &CommentFormView::default());
    context.insert("post_user_count", &post_user_count);
    Ok(templates::render("post.html", &context)?)
}

fn render_post_form(
    viewer: &User,
    captions: Captions,
    groups: &[Group],
    form: &PostFormView,
    post: Option<&Post>,
) -> Result<Response> {
    let mut context = templates::context(Some(viewer));
    context.insert("title", captions.title);
    context.insert("header", captions.header);
    context.insert("button", captions.button);
    context.insert("groups", groups);
    context.insert("form", form);
    context.insert("post", &post);
    Ok(templates::render("new.html", &context)?.into_response())
}

async fn save_image(
    media: &MediaStore,
    image: Option<(ImageFormat, Bytes)>,
) -> Result<Option<ImagePath>> {
    match image {
        Some((format, bytes)) => Ok(Some(media.save_post_image(format, &bytes).await?)),
        None => Ok(None),
    }
}

async fn new_post_form(
    _: NewPostPath,
    AuthenticatedUser(viewer): AuthenticatedUser,
    State(store): State<Arc<dyn Store>>,
) -> Result<Response> {
    let groups = store.fetch_groups().await?;
    render_post_form(&viewer, NEW_POST, &groups, &PostFormView::default(), None)
}

async fn create_post(
    _: NewPostPath,
    AuthenticatedUser(viewer): AuthenticatedUser,
    State(store): State<Arc<dyn Store>>,
    State(media): State<Arc<MediaStore>>,
    State(settings): State<Arc<Settings>>,
    form: PostForm,
) -> Result<Response> {
    let groups = store.fetch_groups().await?;
    let clean = match form.clean(&groups, settings.max_upload_bytes) {
        Ok(clean) => clean,
        Err(form) => return render_post_form(&viewer, NEW_POST, &groups, &form, None),
    };

    let post = store
        .create_post(&CreatePost {
            author: viewer.id,
            text: clean.text,
            group: clean.group,
            image: save_image(&media, clean.image).await?,
        })
        .await?;
    info!(post_id = %post.id, author = %viewer.username, "Created post");

    Ok(Found::to("/").into_response())
}

async fn edit_post_form(
    EditPostPath { username, post_id }: EditPostPath,
    AuthenticatedUser(viewer): AuthenticatedUser,
    State(store): State<Arc<dyn Store>>,
) -> Result<Response> {
    let post = fetch_authored_post(store.as_ref(), &username, post_id).await?;
    if post.author.id != viewer.id {
        return Ok(Found::to(post_path(&post)).into_response());
    }

    let groups = store.fetch_groups().await?;
    let form = PostFormView::prefilled(&post.text, post.group.as_ref());
    render_post_form(&viewer, EDIT_POST, &groups, &form, Some(&post))
}

async fn update_post(
    EditPostPath { username, post_id }: EditPostPath,
    AuthenticatedUser(viewer): AuthenticatedUser,
    State(store): State<Arc<dyn Store>>,
    State(media): State<Arc<MediaStore>>,
    State(settings): State<Arc<Settings>>,
    form: PostForm,
) -> Result<Response> {
    let post = fetch_authored_post(store.as_ref(), &username, post_id).await?;
    if post.author.id != viewer.id {
        return Ok(Found::to(post_path(&post)).into_response());
    }

    let groups = store.fetch_groups().await?;
    let clean = match form.clean(&groups, settings.max_upload_bytes) {
        Ok(clean) => clean,
        Err(form) => return render_post_form(&viewer, EDIT_POST, &groups, &form, Some(&post)),
    };

    let updated = store
        .update_post(
            post.id,
            &UpdatePost {
                text: clean.text,
                group: clean.group,
                image: save_image(&media, clean.image).await?,
            },
        )
        .await?
        .ok_or(ServerError::PostNotFound(post.id))?;
    info!(post_id = %updated.id, "Edited post");

    Ok(Found::to(post_path(&updated)).into_response())
}
