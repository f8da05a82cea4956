use crate::server::{Result, ServerError};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;
use time::UtcDateTime;
use tracing::debug;
use yatube_common::{
    model::{
        Id,
        auth::{AuthToken, Authentication},
        user::{User, UserMarker},
    },
    util::PositiveDuration,
};
use yatube_db::Store;

pub const SESSION_COOKIE: &str = "yatube_session";

/// Whoever is making the request. Missing, malformed, unknown and
/// expired session cookies all make a guest.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Viewer(pub Option<User>);

impl Viewer {
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.0.as_ref()
    }

    #[must_use]
    pub fn user_id(&self) -> Option<Id<UserMarker>> {
        self.0.as_ref().map(|user| user.id)
    }
}

impl<S> FromRequestParts<S> for Viewer
where
    Arc<dyn Store>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let Some(token) = session_token(&jar) else {
            return Ok(Self(None));
        };

        let store = Arc::<dyn Store>::from_ref(state);
        Ok(Self(resolve_session(store.as_ref(), &token).await?))
    }
}

/// A logged in user. Guests are sent to the login page and brought
/// back afterwards.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<dyn Store>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Viewer(user) = Viewer::from_request_parts(parts, state).await?;

        user.map(Self).ok_or_else(|| {
            let next = parts
                .uri
                .path_and_query()
                .map_or_else(|| parts.uri.path().to_owned(), ToString::to_string);
            ServerError::LoginRequired(Some(next))
        })
    }
}

fn session_token(jar: &CookieJar) -> Option<AuthToken> {
    let cookie = jar.get(SESSION_COOKIE)?;
    match cookie.value().parse() {
        Ok(token) => Some(token),
        Err(e) => {
            debug!(error = %e, "Ignoring undecodable session cookie");
            None
        }
    }
}

async fn resolve_session(store: &dyn Store, token: &AuthToken) -> Result<Option<User>> {
    let token_hash = token.hash()?;

    let Some(authentication) = store.fetch_session(&token_hash).await? else {
        return Ok(None);
    };

    if authentication.user != token.user_id {
        return Ok(None);
    }
    if authentication.is_expired_at(UtcDateTime::now()) {
        store.delete_session(&token_hash).await?;
        debug!(user_id = %token.user_id, "Dropped expired session");
        return Ok(None);
    }

    Ok(store.fetch_user(authentication.user).await?)
}

/// Stores a new session for the user and returns the token to hand out.
pub async fn start_session(
    store: &dyn Store,
    user_id: Id<UserMarker>,
    lifetime: Option<PositiveDuration>,
) -> Result<AuthToken> {
    let now = UtcDateTime::now();
    let purged = store.delete_expired_sessions(now).await?;
    if purged > 0 {
        debug!(purged, "Purged expired sessions");
    }

    let token = AuthToken::generate_random(user_id);
    let authentication = Authentication {
        user: user_id,
        token_hash: token.hash()?,
        created_at: now,
        expires_after: lifetime,
    };
    store.create_session(&authentication).await?;

    Ok(token)
}

#[must_use]
pub fn session_cookie(token: &AuthToken, lifetime: Option<PositiveDuration>) -> Cookie<'static> {
    let mut cookie = Cookie::build((SESSION_COOKIE, token.to_cookie_value()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    if let Some(lifetime) = lifetime {
        cookie = cookie.max_age(lifetime.get());
    }
    cookie.build()
}

/// Forgets the session the cookie refers to and drops the cookie.
pub async fn end_session(store: &dyn Store, jar: CookieJar) -> Result<CookieJar> {
    if let Some(token) = session_token(&jar) {
        let removed = store.delete_session(&token.hash()?).await?;
        debug!(user_id = %token.user_id, removed, "Ended session");
    }

    Ok(jar.remove(Cookie::build(SESSION_COOKIE).path("/")))
}
