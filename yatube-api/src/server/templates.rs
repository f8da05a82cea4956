//! Page templates, compiled into the binary.

use axum::response::Html;
use std::sync::LazyLock;
use tera::{Context, Tera};
use yatube_common::model::user::User;

macro_rules! templates {
    ($($name:literal),* $(,)?) => {
        [$(($name, include_str!(concat!("../../templates/", $name)))),*]
    };
}

static TEMPLATES: LazyLock<Result<Tera, tera::Error>> = LazyLock::new(|| {
    let mut tera = Tera::default();
    tera.add_raw_templates(templates![
        "base.html",
        "includes/post_card.html",
        "includes/paginator.html",
        "index.html",
        "group.html",
        "profile.html",
        "post.html",
        "new.html",
        "comments.html",
        "follow.html",
        "auth/login.html",
        "auth/signup.html",
        "auth/logged_out.html",
        "about/author.html",
        "about/tech.html",
        "misc/404.html",
        "misc/500.html",
    ])?;
    Ok(tera)
});

/// A context holding the user the page is rendered for.
pub fn context(viewer: Option<&User>) -> Context {
    let mut context = Context::new();
    context.insert("viewer", &viewer);
    context
}

pub fn render_string(template: &str, context: &Context) -> Result<String, tera::Error> {
    match &*TEMPLATES {
        Ok(tera) => tera.render(template, context),
        Err(e) => Err(tera::Error::msg(format!("Templates failed to load: {e}"))),
    }
}

pub fn render(template: &str, context: &Context) -> Result<Html<String>, tera::Error> {
    render_string(template, context).map(Html)
}
