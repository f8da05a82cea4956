mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{SMALL_GIF, TestApp, assert_redirect, body_text, location};
use yatube_common::{
    model::post::PostFilter,
    page::{DEFAULT_PAGE_SIZE, PageRequest},
};
use yatube_db::Store;

async fn all_posts(app: &TestApp) -> Vec<yatube_common::model::post::Post> {
    app.store
        .fetch_posts(PostFilter::All, PageRequest::FIRST, DEFAULT_PAGE_SIZE)
        .await
        .unwrap()
        .items
}

#[tokio::test]
async fn new_post_form_has_add_captions() {
    let app = TestApp::new();
    let user = app.create_user("TestUser").await;
    let cookie = app.login(&user).await;

    let page = body_text(app.get("/new/", Some(&cookie)).await).await;
    assert!(page.contains("<title>New post"));
    assert!(page.contains("<h1>Add post</h1>"));
    assert!(page.contains(">Add</button>"));
}

#[tokio::test]
async fn valid_post_is_created_and_redirects_home() {
    let app = TestApp::new();
    let user = app.create_user("TestUser").await;
    let group = app.create_group("test-slug").await;
    let cookie = app.login(&user).await;

    let response = app
        .post_form("/new/", Some(&cookie), &format!("text=Hello+world&group={}", group.id))
        .await;
    assert_redirect(&response, "/");

    let posts = all_posts(&app).await;
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].text, "Hello world");
    assert_eq!(posts[0].author, user);
    assert_eq!(posts[0].group.as_ref(), Some(&group));
}

#[tokio::test]
async fn invalid_post_rerenders_form() {
    let app = TestApp::new();
    let user = app.create_user("TestUser").await;
    let cookie = app.login(&user).await;

    let response = app.post_form("/new/", Some(&cookie), "text=&group=999").await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response).await;
    assert!(page.contains("This field is required."));
    assert!(page.contains("Select a valid choice."));
    assert!(all_posts(&app).await.is_empty());
}

#[tokio::test]
async fn guest_cannot_create_post() {
    let app = TestApp::new();

    let response = app.post_form("/new/", None, "text=Sneaky").await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(location(&response).starts_with("/auth/login/"));
    assert!(all_posts(&app).await.is_empty());
}

#[tokio::test]
async fn post_with_image_is_stored_and_shown() {
    let app = TestApp::new();
    let user = app.create_user("TestUser").await;
    let cookie = app.login(&user).await;

    let response = app
        .post_multipart(
            "/new/",
            &cookie,
            &[("text", "With a picture"), ("group", "")],
            Some(("small.gif", SMALL_GIF)),
        )
        .await;
    assert_redirect(&response, "/");

    let post = all_posts(&app).await.remove(0);
    let image = post.image.clone().unwrap();
    assert!(image.get().starts_with("posts/"));
    assert_eq!(std::fs::read(app.media_root().join(image.get())).unwrap(), SMALL_GIF);

    let page = body_text(app.get(&format!("/TestUser/{}/", post.id), None).await).await;
    assert!(page.contains("<img"));

    let served = app.get(&format!("/media/{image}"), None).await;
    assert_eq!(served.status(), StatusCode::OK);
}

#[tokio::test]
async fn non_image_upload_is_rejected() {
    let app = TestApp::new();
    let user = app.create_user("TestUser").await;
    let cookie = app.login(&user).await;

    let response = app
        .post_multipart(
            "/new/",
            &cookie,
            &[("text", "Not a picture")],
            Some(("notes.txt", b"just some text")),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Upload a valid image."));
    assert!(all_posts(&app).await.is_empty());
}

#[tokio::test]
async fn author_edits_post() {
    let app = TestApp::new();
    let user = app.create_user("TestUser").await;
    let group = app.create_group("test-slug").await;
    let post = app.create_post(&user, "Original", None).await;
    let cookie = app.login(&user).await;
    let edit_uri = format!("/TestUser/{}/edit/", post.id);

    let page = body_text(app.get(&edit_uri, Some(&cookie)).await).await;
    assert!(page.contains("<title>Edit post"));
    assert!(page.contains("<h1>Edit</h1>"));
    assert!(page.contains(">Save</button>"));
    assert!(page.contains("Original"));

    let response = app
        .post_form(&edit_uri, Some(&cookie), &format!("text=EditText&group={}", group.id))
        .await;
    assert_redirect(&response, &format!("/TestUser/{}/", post.id));

    let edited = app.store.fetch_post(post.id).await.unwrap().unwrap();
    assert_eq!(edited.text, "EditText");
    assert_eq!(edited.group, Some(group));
    assert_eq!(edited.pub_date, post.pub_date);
    assert_eq!(all_posts(&app).await.len(), 1);
}

#[tokio::test]
async fn editing_with_new_image_replaces_it() {
    let app = TestApp::new();
    let user = app.create_user("TestUser").await;
    let cookie = app.login(&user).await;
    app.post_multipart(
        "/new/",
        &cookie,
        &[("text", "Original")],
        Some(("first.gif", SMALL_GIF)),
    )
    .await;
    let post = all_posts(&app).await.remove(0);
    let original = post.image.clone().unwrap();

    let response = app
        .post_multipart(
            &format!("/TestUser/{}/edit/", post.id),
            &cookie,
            &[("text", "Replaced picture"), ("group", "")],
            Some(("second.gif", SMALL_GIF)),
        )
        .await;
    assert_redirect(&response, &format!("/TestUser/{}/", post.id));

    let edited = app.store.fetch_post(post.id).await.unwrap().unwrap();
    let replaced = edited.image.unwrap();
    assert_ne!(replaced, original);
    assert_eq!(edited.text, "Replaced picture");
    assert_eq!(std::fs::read(app.media_root().join(replaced.get())).unwrap(), SMALL_GIF);
}

#[tokio::test]
async fn editing_without_file_keeps_image() {
    let app = TestApp::new();
    let user = app.create_user("TestUser").await;
    let cookie = app.login(&user).await;
    app.post_multipart(
        "/new/",
        &cookie,
        &[("text", "Original")],
        Some(("first.gif", SMALL_GIF)),
    )
    .await;
    let post = all_posts(&app).await.remove(0);

    let response = app
        .post_multipart(
            &format!("/TestUser/{}/edit/", post.id),
            &cookie,
            &[("text", "Only the text changed"), ("group", "")],
            Some(("", b"")),
        )
        .await;
    assert_redirect(&response, &format!("/TestUser/{}/", post.id));

    let edited = app.store.fetch_post(post.id).await.unwrap().unwrap();
    assert_eq!(edited.text, "Only the text changed");
    assert_eq!(edited.image, post.image);
}

#[tokio::test]
async fn other_user_cannot_edit() {
    let app = TestApp::new();
    let author = app.create_user("TestUser").await;
    let other = app.create_user("TestUser1").await;
    let post = app.create_post(&author, "Original", None).await;
    let cookie = app.login(&other).await;

    let response = app
        .post_form(&format!("/TestUser/{}/edit/", post.id), Some(&cookie), "text=Hijacked")
        .await;
    assert_redirect(&response, &format!("/TestUser/{}/", post.id));

    let unchanged = app.store.fetch_post(post.id).await.unwrap().unwrap();
    assert_eq!(unchanged.text, "Original");
}

#[tokio::test]
async fn guest_comment_goes_to_login() {
    let app = TestApp::new();
    let user = app.create_user("TestUser").await;
    let post = app.create_post(&user, "Test", None).await;
    let uri = format!("/TestUser/{}/comment/", post.id);

    assert_redirect(&app.get(&uri, None).await, "/auth/login/");
    assert_redirect(&app.post_form(&uri, None, "text=Hi").await, "/auth/login/");
    assert!(app.store.fetch_post_comments(post.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn guest_comment_with_odd_body_goes_to_login() {
    let app = TestApp::new();
    let user = app.create_user("TestUser").await;
    let post = app.create_post(&user, "Test", None).await;

    let request = Request::post(format!("/TestUser/{}/comment/", post.id))
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("Hi"))
        .unwrap();
    assert_redirect(&app.send(request).await, "/auth/login/");
}

#[tokio::test]
async fn user_comments_on_post() {
    let app = TestApp::new();
    let author = app.create_user("TestUser").await;
    let reader = app.create_user("reader").await;
    let post = app.create_post(&author, "Test", None).await;
    let cookie = app.login(&reader).await;
    let uri = format!("/TestUser/{}/comment/", post.id);

    let response = app.get(&uri, Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.post_form(&uri, Some(&cookie), "text=Great+post").await;
    assert_redirect(&response, &format!("/TestUser/{}/", post.id));

    let comments = app.store.fetch_post_comments(post.id).await.unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].author, reader);

    let page = body_text(app.get(&format!("/TestUser/{}/", post.id), None).await).await;
    assert!(page.contains("Great post"));
}

#[tokio::test]
async fn empty_comment_rerenders_form() {
    let app = TestApp::new();
    let user = app.create_user("TestUser").await;
    let post = app.create_post(&user, "Test", None).await;
    let cookie = app.login(&user).await;

    let response = app
        .post_form(&format!("/TestUser/{}/comment/", post.id), Some(&cookie), "text=")
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("This field is required."));
}

#[tokio::test]
async fn post_text_is_escaped() {
    let app = TestApp::new();
    let user = app.create_user("TestUser").await;
    let post = app.create_post(&user, "<script>alert(1)</script>\nsecond line", None).await;

    let page = body_text(app.get(&format!("/TestUser/{}/", post.id), None).await).await;
    assert!(!page.contains("<script>"));
    assert!(page.contains("&lt;script&gt;"));
    assert!(page.contains("<br>"));
}
