#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, StatusCode, header},
};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use yatube_api::server::{ServerState, Settings, app, auth};
use yatube_common::model::{
    auth::HashedPassword,
    group::{CreateGroup, Group},
    post::{CreatePost, Post},
    user::{CreateUser, User, Username},
};
use yatube_db::{MemoryStore, Store};

pub const PASSWORD: &str = "correct horse battery";

pub const SMALL_GIF: &[u8] = b"GIF89a\x01\x00\x01\x00\x80\x00\x00\x00\x00\x00\xff\xff\xff\
    \x21\xf9\x04\x01\x00\x00\x00\x00\x2c\x00\x00\x00\x00\x01\x00\x01\x00\x00\x02\x02\x4c\x01\x00\x3b";

pub struct TestApp {
    pub state: ServerState,
    pub store: Arc<MemoryStore>,
    router: Router,
    media_root: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        let media_root = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::default());
        let settings = Settings {
            media_root: media_root.path().to_owned(),
            ..settings
        };
        let state = ServerState::new(store.clone(), settings);

        Self {
            router: app(state.clone()),
            state,
            store,
            media_root,
        }
    }

    pub fn media_root(&self) -> &std::path::Path {
        self.media_root.path()
    }

    pub async fn create_user(&self, username: &str) -> User {
        let create = CreateUser {
            username: Username::new(username.to_owned()).unwrap(),
            first_name: "Test".to_owned(),
            last_name: "User".to_owned(),
            email: format!("{username}@example.com"),
        };
        let password = HashedPassword::hash(PASSWORD).unwrap();
        self.store.create_user(&create, &password).await.unwrap()
    }

    pub async fn create_group(&self, slug: &str) -> Group {
        let create = CreateGroup::new(format!("Group {slug}"), slug.to_owned(), "Test group".to_owned())
            .unwrap();
        self.store.create_group(&create).await.unwrap()
    }

    pub async fn create_post(&self, author: &User, text: &str, group: Option<&Group>) -> Post {
        self.store
            .create_post(&CreatePost {
                author: author.id,
                text: text.to_owned(),
                group: group.map(|group| group.id),
                image: None,
            })
            .await
            .unwrap()
    }

    /// A `Cookie` header value for a fresh session of `user`.
    pub async fn login(&self, user: &User) -> String {
        let token = auth::start_session(self.store.as_ref(), user.id, None)
            .await
            .unwrap();
        format!("{}={}", auth::SESSION_COOKIE, token.to_cookie_value())
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut request = Request::get(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.send(request.body(Body::empty()).unwrap()).await
    }

    pub async fn post_form(&self, uri: &str, cookie: Option<&str>, body: &str) -> Response<Body> {
        let mut request = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.send(request.body(Body::from(body.to_owned())).unwrap()).await
    }

    /// Sends `fields` and an optional image as `multipart/form-data`.
    pub async fn post_multipart(
        &self,
        uri: &str,
        cookie: &str,
        fields: &[(&str, &str)],
        image: Option<(&str, &[u8])>,
    ) -> Response<Body> {
        const BOUNDARY: &str = "yatube-test-boundary";

        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, bytes)) = image {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; \
                    filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::post(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .header(header::COOKIE, cookie)
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

pub fn assert_redirect(response: &Response<Body>, to: &str) {
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(response), to);
}

/// How many post cards a listing page shows.
pub fn card_count(page: &str) -> usize {
    page.matches("<article class=\"card\">").count()
}
