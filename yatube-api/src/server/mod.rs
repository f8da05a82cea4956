use axum::{
    Router,
    extract::{
        DefaultBodyLimit, FromRef, Request,
        multipart::{MultipartError, MultipartRejection},
        rejection::{FormRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::get,
};
use std::{num::NonZeroU64, path::PathBuf, sync::Arc, time::Duration};
use tera::Context;
use thiserror::Error;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{debug, error};
use url::form_urlencoded;
use yatube_common::{
    model::{
        Id,
        auth::{AuthTokenHashError, PasswordHashError},
        post::PostMarker,
    },
    page::DEFAULT_PAGE_SIZE,
    util::PositiveDuration,
};
use yatube_db::{DbError, Store};

pub mod auth;
mod cache;
mod forms;
mod media;
mod routes;
mod templates;

pub use cache::IndexCache;
pub use media::{ImageFormat, MediaStore};

pub type ServerRouter = Router<ServerState>;

/// Room for the non-file parts of a multipart body on top of the upload.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

const STYLESHEET: &str = include_str!("../../static/style.css");

pub const LOGIN_PATH: &str = "/auth/login/";

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Settings {
    pub page_size: NonZeroU64,
    /// `None` disables the index page cache.
    pub index_cache_ttl: Option<Duration>,
    /// `None` keeps sessions alive until logout.
    pub session_lifetime: Option<PositiveDuration>,
    pub max_upload_bytes: usize,
    pub media_root: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            index_cache_ttl: Some(Duration::from_secs(20)),
            session_lifetime: PositiveDuration::from_seconds(60 * 60 * 24 * 14),
            max_upload_bytes: 5 * 1024 * 1024,
            media_root: PathBuf::from("media"),
        }
    }
}

impl From<&crate::config::Env> for Settings {
    fn from(env: &crate::config::Env) -> Self {
        Self {
            page_size: env.page_size,
            index_cache_ttl: (env.index_cache_seconds > 0)
                .then(|| Duration::from_secs(env.index_cache_seconds)),
            session_lifetime: PositiveDuration::from_seconds(env.session_lifetime_seconds),
            max_upload_bytes: env.max_upload_bytes,
            media_root: env.media_root.clone(),
        }
    }
}

#[derive(Clone, FromRef)]
pub struct ServerState {
    pub store: Arc<dyn Store>,
    pub index_cache: IndexCache,
    pub media: Arc<MediaStore>,
    pub settings: Arc<Settings>,
}

impl ServerState {
    pub fn new(store: Arc<dyn Store>, settings: Settings) -> Self {
        Self {
            store,
            index_cache: IndexCache::new(settings.index_cache_ttl),
            media: Arc::new(MediaStore::new(settings.media_root.clone())),
            settings: Arc::new(settings),
        }
    }
}

/// The complete site, ready to be served.
pub fn app(state: ServerState) -> Router {
    let body_limit = state
        .settings
        .max_upload_bytes
        .saturating_add(FORM_OVERHEAD_BYTES);
    let media = ServeDir::new(state.media.root());

    routes::routes()
        .route("/static/style.css", get(stylesheet))
        .nest_service("/media", media)
        .fallback(fallback)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn stylesheet() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css; charset=utf-8")], STYLESHEET)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

/// A `302 Found` redirect.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Found(String);

impl Found {
    pub fn to(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    /// The login page, returning to `next` afterwards when given.
    #[must_use]
    pub fn login(next: Option<&str>) -> Self {
        match next {
            Some(next) => {
                let query = form_urlencoded::Serializer::new(String::new())
                    .append_pair("next", next)
                    .finish();
                Self(format!("{LOGIN_PATH}?{query}"))
            }
            None => Self(LOGIN_PATH.to_owned()),
        }
    }

    #[must_use]
    pub fn location(&self) -> &str {
        &self.0
    }
}

impl IntoResponse for Found {
    fn into_response(self) -> Response {
        (StatusCode::FOUND, [(header::LOCATION, self.0)]).into_response()
    }
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Query rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("Form rejected: {0}")]
    FormRejection(#[from] FormRejection),
    #[error("Multipart form rejected: {0}")]
    MultipartRejection(#[from] MultipartRejection),
    #[error("Reading multipart form failed: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Login required")]
    LoginRequired(Option<String>),
    #[error(transparent)]
    Database(#[from] DbError),
    #[error("Rendering template failed: {0}")]
    Template(#[from] tera::Error),
    #[error("Media storage failed: {0}")]
    Media(#[from] std::io::Error),
    #[error("The auth token could not be hashed: {0}")]
    AuthTokenHash(#[from] AuthTokenHashError),
    #[error(transparent)]
    PasswordHash(#[from] PasswordHashError),
    #[error("User {0} was not found.")]
    UserNotFound(String),
    #[error("Group {0} was not found.")]
    GroupNotFound(String),
    #[error("Post with id {0} was not found.")]
    PostNotFound(Id<PostMarker>),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::UserNotFound(_)
            | ServerError::GroupNotFound(_)
            | ServerError::PostNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::QueryRejection(rejection) => rejection.status(),
            ServerError::FormRejection(rejection) => rejection.status(),
            ServerError::MultipartRejection(rejection) => rejection.status(),
            ServerError::Multipart(e) => e.status(),
            ServerError::LoginRequired(_) => StatusCode::FOUND,
            ServerError::Database(_)
            | ServerError::Template(_)
            | ServerError::Media(_)
            | ServerError::AuthTokenHash(_)
            | ServerError::PasswordHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(error = %self, %status, "Replying with error");
        } else {
            debug!(error = %self, %status, "Replying with error");
        }

        let (template, path) = match self {
            ServerError::LoginRequired(next) => {
                return Found::login(next.as_deref()).into_response();
            }
            ServerError::UnknownRoute(uri) => ("misc/404.html", uri.path().to_owned()),
            _ if status == StatusCode::NOT_FOUND => ("misc/404.html", String::new()),
            _ if status.is_server_error() => ("misc/500.html", String::new()),
            _ => {
                let reason = status.canonical_reason().unwrap_or("Bad request");
                return (status, reason).into_response();
            }
        };

        let mut context = templates::context(None);
        context.insert("path", &path);
        error_page(status, template, &context)
    }
}

fn error_page(status: StatusCode, template: &str, context: &Context) -> Response {
    match templates::render(template, context) {
        Ok(page) => (status, page).into_response(),
        Err(e) => {
            error!(error = %e, template, "Rendering error page failed");
            status.into_response()
        }
    }
}
