mod common;

use axum::http::StatusCode;
use common::{TestApp, assert_redirect, body_text, card_count, location};
use std::time::Duration;
use yatube_api::server::Settings;

#[tokio::test]
async fn guest_status_codes() {
    let app = TestApp::new();
    let user = app.create_user("TestUser").await;
    let group = app.create_group("test-slug").await;
    let post = app.create_post(&user, "Test", None).await;

    for (uri, status) in [
        ("/".to_owned(), StatusCode::OK),
        ("/new/".to_owned(), StatusCode::FOUND),
        (format!("/group/{}/", group.slug), StatusCode::OK),
        ("/TestUser/".to_owned(), StatusCode::OK),
        (format!("/TestUser/{}/", post.id), StatusCode::OK),
        (format!("/TestUser/{}/edit/", post.id), StatusCode::FOUND),
        ("/follow/".to_owned(), StatusCode::FOUND),
        ("/about/author/".to_owned(), StatusCode::OK),
        ("/about/tech/".to_owned(), StatusCode::OK),
    ] {
        let response = app.get(&uri, None).await;
        assert_eq!(response.status(), status, "{uri}");
    }
}

#[tokio::test]
async fn authorized_status_codes() {
    let app = TestApp::new();
    let user = app.create_user("TestUser").await;
    let group = app.create_group("test-slug").await;
    let post = app.create_post(&user, "Test", None).await;
    let cookie = app.login(&user).await;

    for (uri, status) in [
        ("/new/".to_owned(), StatusCode::OK),
        (format!("/group/{}/", group.slug), StatusCode::OK),
        ("/new/notexist/".to_owned(), StatusCode::NOT_FOUND),
        ("/TestUser/".to_owned(), StatusCode::OK),
        (format!("/TestUser/{}/", post.id), StatusCode::OK),
        (format!("/TestUser/{}/edit/", post.id), StatusCode::OK),
        ("/follow/".to_owned(), StatusCode::OK),
    ] {
        let response = app.get(&uri, Some(&cookie)).await;
        assert_eq!(response.status(), status, "{uri}");
    }
}

#[tokio::test]
async fn protected_pages_send_guests_to_login() {
    let app = TestApp::new();

    let response = app.get("/new/", None).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(location(&response).starts_with("/auth/login/?next="));
    assert!(location(&response).contains("new"));

    let response = app.get("/follow/", None).await;
    assert!(location(&response).starts_with("/auth/login/?next="));
}

#[tokio::test]
async fn pages_use_their_templates() {
    let app = TestApp::new();
    let user = app.create_user("TestUser").await;
    let group = app.create_group("test-slug").await;
    let post = app.create_post(&user, "Test", Some(&group)).await;
    let cookie = app.login(&user).await;

    for (uri, title) in [
        ("/".to_owned(), "Latest posts"),
        ("/new/".to_owned(), "New post"),
        (format!("/TestUser/{}/", post.id), "Post by TestUser"),
        ("/group/test-slug/".to_owned(), "Group test-slug"),
        ("/TestUser/".to_owned(), "TestUser | Yatube"),
        ("/follow/".to_owned(), "Subscriptions"),
        ("/new/notexist".to_owned(), "Page not found"),
    ] {
        let page = body_text(app.get(&uri, Some(&cookie)).await).await;
        assert!(page.contains(&format!("<title>{title}")), "{uri}: {page}");
    }
}

#[tokio::test]
async fn unknown_pages_render_not_found() {
    let app = TestApp::new();
    app.create_user("TestUser").await;

    for uri in ["/nobody/", "/group/missing/", "/TestUser/12345/", "/TestUser/abc/", "/no/such/page"] {
        let response = app.get(uri, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        assert!(body_text(response).await.contains("Page not found"));
    }
}

#[tokio::test]
async fn post_page_requires_matching_author() {
    let app = TestApp::new();
    let author = app.create_user("TestUser").await;
    app.create_user("Other").await;
    let post = app.create_post(&author, "Test", None).await;

    let response = app.get(&format!("/Other/{}/", post.id), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn listings_paginate_by_ten() {
    let app = TestApp::new();
    let user = app.create_user("TestUser").await;
    let group = app.create_group("test-slug").await;
    for i in 0..15 {
        app.create_post(&user, &format!("Test post {i}"), Some(&group)).await;
    }

    for base in ["/", "/group/test-slug/", "/TestUser/"] {
        let first = body_text(app.get(base, None).await).await;
        assert_eq!(card_count(&first), 10, "{base}");
        assert!(first.contains("Test post 14"));

        let second = body_text(app.get(&format!("{base}?page=2"), None).await).await;
        assert_eq!(card_count(&second), 5, "{base}");
        assert!(second.contains("Test post 0"));

        let past_end = body_text(app.get(&format!("{base}?page=9"), None).await).await;
        assert_eq!(card_count(&past_end), 5, "{base}");

        let garbage = body_text(app.get(&format!("{base}?page=last"), None).await).await;
        assert_eq!(card_count(&garbage), 10, "{base}");
    }
}

#[tokio::test]
async fn follow_feed_paginates() {
    let app = TestApp::new();
    let reader = app.create_user("reader").await;
    let author = app.create_user("author").await;
    for i in 0..15 {
        app.create_post(&author, &format!("Followed {i}"), None).await;
    }
    let cookie = app.login(&reader).await;
    app.get("/author/follow/", Some(&cookie)).await;

    let first = body_text(app.get("/follow/", Some(&cookie)).await).await;
    assert_eq!(card_count(&first), 10);
    let second = body_text(app.get("/follow/?page=2", Some(&cookie)).await).await;
    assert_eq!(card_count(&second), 5);
}

#[tokio::test]
async fn index_is_cached_until_cleared() {
    let app = TestApp::new();
    let user = app.create_user("TestUser").await;
    app.create_post(&user, "First post", None).await;

    let before = body_text(app.get("/", None).await).await;
    assert!(before.contains("First post"));

    app.create_post(&user, "Second post", None).await;
    let cached = body_text(app.get("/", None).await).await;
    assert_eq!(cached, before);
    assert!(!cached.contains("Second post"));

    app.state.index_cache.clear();
    let fresh = body_text(app.get("/", None).await).await;
    assert!(fresh.contains("Second post"));
}

#[tokio::test]
async fn out_of_range_pages_share_the_last_page_entry() {
    let app = TestApp::new();
    let user = app.create_user("TestUser").await;
    for i in 0..15 {
        app.create_post(&user, &format!("Test post {i}"), None).await;
    }

    let last = body_text(app.get("/?page=2", None).await).await;
    assert_eq!(card_count(&last), 5);

    app.create_post(&user, "Test post 15", None).await;
    for uri in ["/?page=99", "/?page=1000"] {
        let page = body_text(app.get(uri, None).await).await;
        assert_eq!(page, last, "{uri}");
    }
}

#[tokio::test]
async fn index_cache_expires() {
    let app = TestApp::with_settings(Settings {
        index_cache_ttl: Some(Duration::from_millis(100)),
        ..Settings::default()
    });
    let user = app.create_user("TestUser").await;

    let before = body_text(app.get("/", None).await).await;
    app.create_post(&user, "Late post", None).await;
    assert_eq!(body_text(app.get("/", None).await).await, before);

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(body_text(app.get("/", None).await).await.contains("Late post"));
}

#[tokio::test]
async fn index_cache_is_per_viewer() {
    let app = TestApp::new();
    let user = app.create_user("TestUser").await;
    let cookie = app.login(&user).await;

    let guest = body_text(app.get("/", None).await).await;
    assert!(guest.contains("Log in"));

    let member = body_text(app.get("/", Some(&cookie)).await).await;
    assert!(member.contains("Log out"));
}

#[tokio::test]
async fn edit_by_other_user_redirects_to_post() {
    let app = TestApp::new();
    let author = app.create_user("TestUser").await;
    let other = app.create_user("TestUser1").await;
    let post = app.create_post(&author, "Test", None).await;
    let cookie = app.login(&other).await;

    let response = app.get(&format!("/TestUser/{}/edit/", post.id), Some(&cookie)).await;
    assert_redirect(&response, &format!("/TestUser/{}/", post.id));
}

#[tokio::test]
async fn stylesheet_is_served() {
    let app = TestApp::new();
    let response = app.get("/static/style.css", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains(".navbar"));
}
