//! HTML forms: reading submissions, validating them and echoing them
//! back with messages when they are invalid.

use crate::server::{ServerError, media::ImageFormat};
use axum::{
    body::Bytes,
    extract::{Form, FromRequest, Multipart, Request},
};
use headers::{ContentType, HeaderMapExt};
use serde::{Deserialize, Serialize};
use yatube_common::model::{
    Id,
    auth::PASSWORD_MIN_LEN,
    group::{Group, GroupMarker},
    user::{InvalidUsernameError, NAME_MAX_LEN, Username},
};

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_GROUP: &str =
    "Select a valid choice. That choice is not one of the available choices.";
pub const INVALID_IMAGE: &str = "Upload a valid image. The file you uploaded was either not an \
    image or a corrupted image.";
pub const IMAGE_TOO_LARGE: &str = "The uploaded image is too large.";
pub const USERNAME_TAKEN: &str = "A user with that username already exists.";
pub const PASSWORD_MISMATCH: &str = "The two password fields didn't match.";
pub const INVALID_LOGIN: &str = "Please enter a correct username and password. Note that both \
    fields may be case-sensitive.";

/// A file sent along with a form.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Upload {
    pub file_name: Option<String>,
    pub bytes: Bytes,
}

/// A post as submitted, either url-encoded or as multipart with an
/// optional image.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
pub struct PostForm {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub group: String,
    #[serde(skip)]
    pub image: Option<Upload>,
}

impl<S> FromRequest<S> for PostForm
where
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .typed_get::<ContentType>()
            .is_some_and(|content_type| content_type.to_string().starts_with("multipart/form-data"));

        if !is_multipart {
            let Form(form) = Form::<Self>::from_request(req, state).await?;
            return Ok(form);
        }

        let mut multipart = Multipart::from_request(req, state).await?;
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().map(ToOwned::to_owned);
            match name.as_deref() {
                Some("text") => form.text = field.text().await?,
                Some("group") => form.group = field.text().await?,
                Some("image") => {
                    let file_name = field.file_name().map(ToOwned::to_owned);
                    let bytes = field.bytes().await?;
                    // Browsers send an empty part when no file was picked.
                    if !bytes.is_empty() {
                        form.image = Some(Upload { file_name, bytes });
                    }
                }
                _ => {}
            }
        }

        Ok(form)
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
pub struct PostFormErrors {
    pub text: Vec<&'static str>,
    pub group: Vec<&'static str>,
    pub image: Vec<&'static str>,
}

/// What the post form template shows in its fields.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
pub struct PostFormView {
    pub text: String,
    pub group: String,
    pub errors: PostFormErrors,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CleanPost {
    pub text: String,
    pub group: Option<Id<GroupMarker>>,
    pub image: Option<(ImageFormat, Bytes)>,
}

impl PostForm {
    /// `groups` are the choices offered for the group field.
    pub fn clean(self, groups: &[Group], max_upload_bytes: usize) -> Result<CleanPost, PostFormView> {
        let mut errors = PostFormErrors::default();

        if self.text.trim().is_empty() {
            errors.text.push(REQUIRED);
        }

        let group = match self.group.trim() {
            "" => None,
            raw => {
                let chosen = raw
                    .parse::<Id<GroupMarker>>()
                    .ok()
                    .filter(|group_id| groups.iter().any(|group| group.id == *group_id));
                if chosen.is_none() {
                    errors.group.push(INVALID_GROUP);
                }
                chosen
            }
        };

        let image = match self.image {
            None => None,
            Some(upload) if upload.bytes.len() > max_upload_bytes => {
                errors.image.push(IMAGE_TOO_LARGE);
                None
            }
            Some(upload) => {
                let format = ImageFormat::sniff(&upload.bytes);
                if format.is_none() {
                    errors.image.push(INVALID_IMAGE);
                }
                format.map(|format| (format, upload.bytes))
            }
        };

        if errors == PostFormErrors::default() {
            Ok(CleanPost {
                text: self.text,
                group,
                image,
            })
        } else {
            Err(PostFormView {
                text: self.text,
                group: self.group,
                errors,
            })
        }
    }
}

impl PostFormView {
    #[must_use]
    pub fn prefilled(text: &str, group: Option<&Group>) -> Self {
        Self {
            text: text.to_owned(),
            group: group.map(|group| group.id.to_string()).unwrap_or_default(),
            errors: PostFormErrors::default(),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
pub struct CommentFormView {
    pub text: String,
    pub errors: Vec<&'static str>,
}

impl CommentForm {
    pub fn clean(self) -> Result<String, CommentFormView> {
        if self.text.trim().is_empty() {
            Err(CommentFormView {
                text: self.text,
                errors: vec![REQUIRED],
            })
        } else {
            Ok(self.text)
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
pub struct SignupFormErrors {
    pub first_name: Vec<String>,
    pub last_name: Vec<String>,
    pub username: Vec<String>,
    pub email: Vec<String>,
    pub password1: Vec<String>,
    pub password2: Vec<String>,
}

/// Passwords are never echoed back.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
pub struct SignupFormView {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub errors: SignupFormErrors,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CleanSignup {
    pub first_name: String,
    pub last_name: String,
    pub username: Username,
    pub email: String,
    pub password: String,
}

fn username_message(error: &InvalidUsernameError) -> String {
    match error {
        InvalidUsernameError::Empty => REQUIRED.to_owned(),
        other => other.to_string(),
    }
}

impl SignupForm {
    pub fn clean(self) -> Result<CleanSignup, SignupFormView> {
        let mut errors = SignupFormErrors::default();

        if self.first_name.chars().count() > NAME_MAX_LEN {
            errors
                .first_name
                .push(format!("Ensure this value has at most {NAME_MAX_LEN} characters."));
        }
        if self.last_name.chars().count() > NAME_MAX_LEN {
            errors
                .last_name
                .push(format!("Ensure this value has at most {NAME_MAX_LEN} characters."));
        }

        let username = Username::new(self.username.trim().to_owned())
            .map_err(|e| errors.username.push(username_message(&e)))
            .ok();

        let email = self.email.trim();
        if !email.is_empty() && !is_plausible_email(email) {
            errors.email.push("Enter a valid email address.".to_owned());
        }

        if self.password1.is_empty() {
            errors.password1.push(REQUIRED.to_owned());
        } else if self.password1.chars().count() < PASSWORD_MIN_LEN {
            errors.password1.push(format!(
                "This password is too short. It must contain at least {PASSWORD_MIN_LEN} characters."
            ));
        }
        if self.password2.is_empty() {
            errors.password2.push(REQUIRED.to_owned());
        } else if self.password1 != self.password2 {
            errors.password2.push(PASSWORD_MISMATCH.to_owned());
        }

        match username {
            Some(username) if errors == SignupFormErrors::default() => Ok(CleanSignup {
                email: email.to_owned(),
                first_name: self.first_name,
                last_name: self.last_name,
                username,
                password: self.password1,
            }),
            _ => Err(SignupFormView {
                email: email.to_owned(),
                first_name: self.first_name,
                last_name: self.last_name,
                username: self.username,
                errors,
            }),
        }
    }
}

impl CleanSignup {
    /// Used when the store turns the username down after validation passed.
    #[must_use]
    pub fn into_view(self, username_error: &str) -> SignupFormView {
        SignupFormView {
            first_name: self.first_name,
            last_name: self.last_name,
            username: self.username.into_inner(),
            email: self.email,
            errors: SignupFormErrors {
                username: vec![username_error.to_owned()],
                ..SignupFormErrors::default()
            },
        }
    }
}

fn is_plausible_email(email: &str) -> bool {
    email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
            && !email.chars().any(char::is_whitespace)
    })
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
pub struct LoginFormView {
    pub username: String,
    pub next: String,
    pub errors: Vec<&'static str>,
}

/// Only same-site paths are followed after logging in.
#[must_use]
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(next)
            if next.starts_with('/')
                && !next.starts_with("//")
                && !next.contains('\\')
                && !next.chars().any(char::is_control) =>
        {
            next
        }
        _ => "/",
    }
}

#[cfg(test)]
mod tests {
    use crate::server::{
        forms::{
            CommentForm, INVALID_GROUP, INVALID_IMAGE, IMAGE_TOO_LARGE, PASSWORD_MISMATCH,
            PostForm, REQUIRED, SignupForm, Upload, safe_next,
        },
        media::ImageFormat,
    };
    use axum::body::Bytes;
    use yatube_common::model::{Id, group::Group};

    fn group(id: u64) -> Group {
        Group {
            id: Id::from(id),
            title: "Group".to_owned(),
            ..Group::default()
        }
    }

    fn post_form(text: &str, group: &str, image: Option<&'static [u8]>) -> PostForm {
        PostForm {
            text: text.to_owned(),
            group: group.to_owned(),
            image: image.map(|bytes| Upload {
                file_name: Some("small.gif".to_owned()),
                bytes: Bytes::from_static(bytes),
            }),
        }
    }

    #[test]
    fn valid_post_with_group_and_image() {
        let clean = post_form("Test", "7", Some(b"GIF89a\x01\x00"))
            .clean(&[group(7)], 1024)
            .unwrap();

        assert_eq!(clean.text, "Test");
        assert_eq!(clean.group, Some(Id::from(7_u64)));
        assert_eq!(clean.image.map(|(format, _)| format), Some(ImageFormat::Gif));
    }

    #[test]
    fn post_text_is_required() {
        let view = post_form("  ", "", None).clean(&[], 1024).unwrap_err();
        assert_eq!(view.errors.text, [REQUIRED]);
        assert!(view.errors.group.is_empty());
    }

    #[test]
    fn unknown_group_is_rejected() {
        let view = post_form("Test", "8", None).clean(&[group(7)], 1024).unwrap_err();
        assert_eq!(view.errors.group, [INVALID_GROUP]);
        assert_eq!(view.group, "8");

        let view = post_form("Test", "abc", None).clean(&[group(7)], 1024).unwrap_err();
        assert_eq!(view.errors.group, [INVALID_GROUP]);
    }

    #[test]
    fn images_are_checked() {
        let view = post_form("Test", "", Some(b"not an image"))
            .clean(&[], 1024)
            .unwrap_err();
        assert_eq!(view.errors.image, [INVALID_IMAGE]);

        let view = post_form("Test", "", Some(b"GIF89a\x01\x00"))
            .clean(&[], 4)
            .unwrap_err();
        assert_eq!(view.errors.image, [IMAGE_TOO_LARGE]);
    }

    #[test]
    fn comment_text_is_required() {
        assert_eq!(
            CommentForm {
                text: "Nice".to_owned()
            }
            .clean(),
            Ok("Nice".to_owned())
        );
        assert_eq!(
            CommentForm::default().clean().unwrap_err().errors,
            [REQUIRED]
        );
    }

    fn signup(username: &str, password1: &str, password2: &str) -> SignupForm {
        SignupForm {
            username: username.to_owned(),
            email: "user@example.com".to_owned(),
            password1: password1.to_owned(),
            password2: password2.to_owned(),
            ..SignupForm::default()
        }
    }

    #[test]
    fn signup_accepts_valid_input() {
        let clean = signup("new_user", "long enough", "long enough").clean().unwrap();
        assert_eq!(clean.username.get(), "new_user");
        assert_eq!(clean.email, "user@example.com");
    }

    #[test]
    fn signup_reports_each_field() {
        let view = signup("bad name", "short", "different").clean().unwrap_err();

        assert_eq!(view.username, "bad name");
        assert_eq!(view.errors.username.len(), 1);
        assert_eq!(view.errors.password1.len(), 1);
        assert_eq!(view.errors.password2, [PASSWORD_MISMATCH]);

        let mut form = signup("fine", "long enough", "long enough");
        form.email = "nope".to_owned();
        assert_eq!(form.clean().unwrap_err().errors.email.len(), 1);
    }

    #[test]
    fn reserved_usernames_are_rejected() {
        assert!(signup("follow", "long enough", "long enough").clean().is_err());
    }

    #[test]
    fn next_must_stay_on_site() {
        assert_eq!(safe_next(Some("/new/")), "/new/");
        assert_eq!(safe_next(Some("/follow/?page=2")), "/follow/?page=2");
        assert_eq!(safe_next(Some("//evil.example")), "/");
        assert_eq!(safe_next(Some("https://evil.example")), "/");
        assert_eq!(safe_next(Some("/\\evil")), "/");
        assert_eq!(safe_next(None), "/");
    }
}
