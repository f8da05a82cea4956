use crate::{
    model::{Id, user::UserMarker},
    util::PositiveDuration,
};
use argon2::{
    Argon2, Params, PasswordHasher, PasswordVerifier,
    password_hash::{self, SaltString},
};
use base64::{DecodeError, Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use std::{
    fmt::{Debug, Formatter},
    num::ParseIntError,
    str::FromStr,
};
use thiserror::Error;
use time::UtcDateTime;

/// Bytes of the session secret that get hashed.
pub const SESSION_KEY_LEN: usize = 24;
/// Bytes of the session secret used as the hash salt.
pub const SESSION_SALT_LEN: usize = 16;
pub const SESSION_SECRET_LEN: usize = SESSION_KEY_LEN + SESSION_SALT_LEN;
pub const AUTH_TOKEN_HASH_LEN: usize = Params::DEFAULT_OUTPUT_LEN;
pub const PASSWORD_SALT_LEN: usize = 16;
pub const PASSWORD_MIN_LEN: usize = 8;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Hashing session secret failed: {0}")]
pub struct AuthTokenHashError(argon2::Error);

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum AuthTokenDecodeError {
    #[error("Session cookie has no '.' separator")]
    MissingSeparator,
    #[error("Invalid user id: {0}")]
    InvalidUserId(ParseIntError),
    #[error("Decoding session secret failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("Session secret is {0} bytes long")]
    InvalidSecretLength(usize),
}

/// Value of the session cookie.
///
/// Encoded as `{user_id}.{secret}` with the secret in unpadded url-safe
/// base64, so it needs no quoting inside a cookie. The store only ever sees
/// [`AuthTokenHash`].
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct AuthToken {
    pub user_id: Id<UserMarker>,
    secret: [u8; SESSION_SECRET_LEN],
}

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct AuthTokenHash(pub Box<[u8; AUTH_TOKEN_HASH_LEN]>);

impl Debug for AuthToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthToken")
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

impl Debug for AuthTokenHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthTokenHash(..)")
    }
}

/// A login session as stored.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Authentication {
    pub user: Id<UserMarker>,
    pub token_hash: AuthTokenHash,
    pub created_at: UtcDateTime,
    pub expires_after: Option<PositiveDuration>,
}

impl Authentication {
    #[must_use]
    pub fn is_expired_at(&self, now: UtcDateTime) -> bool {
        self.expires_after
            .is_some_and(|expires_after| self.created_at + expires_after.get() < now)
    }
}

impl AuthToken {
    #[must_use]
    pub fn generate_random(user_id: Id<UserMarker>) -> Self {
        Self {
            user_id,
            secret: rand::random(),
        }
    }

    #[must_use]
    pub fn to_cookie_value(&self) -> String {
        format!(
            "{}.{}",
            self.user_id,
            BASE64_URL_SAFE_NO_PAD.encode(self.secret)
        )
    }

    pub fn hash(&self) -> Result<AuthTokenHash, AuthTokenHashError> {
        let (key, salt) = self.secret.split_at(SESSION_KEY_LEN);

        let mut hash = Box::new([0; AUTH_TOKEN_HASH_LEN]);
        Argon2::default()
            .hash_password_into(key, salt, &mut *hash)
            .map_err(AuthTokenHashError)?;

        Ok(AuthTokenHash(hash))
    }
}

impl FromStr for AuthToken {
    type Err = AuthTokenDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (user_id, secret) = s.split_once('.').ok_or(Self::Err::MissingSeparator)?;

        let user_id = user_id
            .parse::<u64>()
            .map_err(Self::Err::InvalidUserId)?
            .into();
        let secret = BASE64_URL_SAFE_NO_PAD.decode(secret)?;
        let secret = <[u8; SESSION_SECRET_LEN]>::try_from(secret.as_slice())
            .map_err(|_| Self::Err::InvalidSecretLength(secret.len()))?;

        Ok(Self { user_id, secret })
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Stored session hash has the wrong length")]
pub struct InvalidAuthTokenHashError;

impl TryFrom<Vec<u8>> for AuthTokenHash {
    type Error = InvalidAuthTokenHashError;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        value
            .into_boxed_slice()
            .try_into()
            .map(Self)
            .map_err(|_| InvalidAuthTokenHashError)
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Hashing password failed: {0}")]
pub struct PasswordHashError(password_hash::Error);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Stored password hash is not in PHC format")]
pub struct InvalidPasswordHashError;

/// Argon2 password hash in PHC string format.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct HashedPassword(String);

impl HashedPassword {
    pub fn hash(password: &str) -> Result<Self, PasswordHashError> {
        let salt_bytes: [u8; PASSWORD_SALT_LEN] = rand::random();
        let salt = SaltString::encode_b64(&salt_bytes).map_err(PasswordHashError)?;

        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(PasswordHashError)?;

        Ok(Self(hash.to_string()))
    }

    pub fn from_phc(phc: String) -> Result<Self, InvalidPasswordHashError> {
        password_hash::PasswordHash::new(&phc).map_err(|_| InvalidPasswordHashError)?;
        Ok(Self(phc))
    }

    #[must_use]
    pub fn verify(&self, password: &str) -> bool {
        password_hash::PasswordHash::new(&self.0).is_ok_and(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
    }

    #[must_use]
    pub fn as_phc(&self) -> &str {
        &self.0
    }
}

impl Debug for HashedPassword {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("HashedPassword").field(&"[redacted]").finish()
    }
}
