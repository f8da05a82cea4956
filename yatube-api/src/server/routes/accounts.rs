use crate::server::{
    Found, LOGIN_PATH, Result, ServerError, ServerRouter, Settings,
    auth::{self, Viewer},
    forms::{
        INVALID_LOGIN, LoginForm, LoginFormView, SignupForm, SignupFormView, USERNAME_TAKEN,
        safe_next,
    },
    templates,
};
use axum::{
    Form, Router,
    extract::{Query, State},
    response::{Html, IntoResponse, Response},
};
use axum_extra::{
    extract::{CookieJar, WithRejection},
    routing::{RouterExt, TypedPath},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};
use yatube_common::model::{
    auth::HashedPassword,
    user::{CreateUser, Username},
};
use yatube_db::{DbError, Store};

pub fn routes() -> ServerRouter {
    Router::new()
        .typed_get(signup_form)
        .typed_post(signup)
        .typed_get(login_form)
        .typed_post(login)
        .typed_get(logout)
}

#[derive(TypedPath)]
#[typed_path("/auth/signup/")]
struct SignupPath;

#[derive(TypedPath)]
#[typed_path("/auth/login/")]
struct LoginPath;

#[derive(TypedPath)]
#[typed_path("/auth/logout/")]
struct LogoutPath;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
struct NextQuery {
    next: Option<String>,
}

fn render_signup(viewer: &Viewer, form: &SignupFormView) -> Result<Response> {
    let mut context = templates::context(viewer.user());
    context.insert("form", form);
    Ok(templates::render("auth/signup.html", &context)?.into_response())
}

fn render_login(viewer: &Viewer, form: &LoginFormView) -> Result<Response> {
    let mut context = templates::context(viewer.user());
    context.insert("form", form);
    Ok(templates::render("auth/login.html", &context)?.into_response())
}

async fn signup_form(_: SignupPath, viewer: Viewer) -> Result<Response> {
    render_signup(&viewer, &SignupFormView::default())
}

async fn signup(
    _: SignupPath,
    viewer: Viewer,
    State(store): State<Arc<dyn Store>>,
    WithRejection(Form(form), _): WithRejection<Form<SignupForm>, ServerError>,
) -> Result<Response> {
    let clean = match form.clean() {
        Ok(clean) => clean,
        Err(form) => return render_signup(&viewer, &form),
    };

    let password = HashedPassword::hash(&clean.password)?;
    let create = CreateUser {
        username: clean.username.clone(),
        first_name: clean.first_name.clone(),
        last_name: clean.last_name.clone(),
        email: clean.email.clone(),
    };

    match store.create_user(&create, &password).await {
        Ok(user) => {
            info!(user_id = %user.id, username = %user.username, "Signed up");
            Ok(Found::to(LOGIN_PATH).into_response())
        }
        Err(DbError::UsernameTaken(_)) => {
            render_signup(&viewer, &clean.into_view(USERNAME_TAKEN))
        }
        Err(e) => Err(e.into()),
    }
}

async fn login_form(
    _: LoginPath,
    viewer: Viewer,
    WithRejection(Query(query), _): WithRejection<Query<NextQuery>, ServerError>,
) -> Result<Response> {
    let form = LoginFormView {
        next: query.next.unwrap_or_default(),
        ..LoginFormView::default()
    };
    render_login(&viewer, &form)
}

async fn login(
    _: LoginPath,
    viewer: Viewer,
    State(store): State<Arc<dyn Store>>,
    State(settings): State<Arc<Settings>>,
    jar: CookieJar,
    WithRejection(Form(form), _): WithRejection<Form<LoginForm>, ServerError>,
) -> Result<Response> {
    let credentials = match Username::new(form.username.trim().to_owned()) {
        Ok(username) => store.fetch_password_hash(&username).await?,
        Err(_) => None,
    };

    let user_id = match credentials {
        Some((user_id, hash)) if hash.verify(&form.password) => user_id,
        _ => {
            debug!(username = %form.username, "Rejected login");
            let view = LoginFormView {
                username: form.username,
                next: form.next.unwrap_or_default(),
                errors: vec![INVALID_LOGIN],
            };
            return render_login(&viewer, &view);
        }
    };

    let token = auth::start_session(store.as_ref(), user_id, settings.session_lifetime).await?;
    let jar = jar.add(auth::session_cookie(&token, settings.session_lifetime));
    info!(%user_id, "Logged in");

    let next = safe_next(form.next.as_deref().filter(|next| !next.is_empty()));
    Ok((jar, Found::to(next)).into_response())
}

async fn logout(
    _: LogoutPath,
    State(store): State<Arc<dyn Store>>,
    jar: CookieJar,
) -> Result<(CookieJar, Html<String>)> {
    let jar = auth::end_session(store.as_ref(), jar).await?;
    let page = templates::render("auth/logged_out.html", &templates::context(None))?;
    Ok((jar, page))
}
