//! Account service error types.

use thiserror::Error;

/// Account service errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The token is unknown, expired, or revoked.
    #[error("invalid token")]
    InvalidToken,

    /// The caller has no session to end.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The caller already holds a live session.
    #[error("already logged in")]
    AlreadyLoggedIn,

    #[error("password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("wrong password")]
    WrongPassword,

    #[error("user with email {0} already exists")]
    UserAlreadyExists(String),

    #[error("user not found")]
    UserNotFound,

    /// A request field failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A stored role name is not recognised.
    #[error("unknown role '{0}'")]
    UnknownRole(String),

    #[error(transparent)]
    Access(#[from] access::Error),

    #[error(transparent)]
    Cache(#[from] cache::Error),

    #[error(transparent)]
    Storage(#[from] storage::Error),
}

impl Error {
    /// The HTTP status a web layer would answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::InvalidToken | Error::NotAuthenticated | Error::WrongPassword => 401,
            Error::Access(access::Error::Denied { .. }) => 403,
            Error::UserNotFound | Error::Cache(cache::Error::NotFound { .. }) => 404,
            Error::AlreadyLoggedIn | Error::UserAlreadyExists(_) => 409,
            Error::PasswordTooShort { .. } | Error::InvalidInput(_) => 422,
            _ => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
