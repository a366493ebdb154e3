//! Access control error types.

use thiserror::Error;

/// Access control errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// No registered policy allowed the action.
    #[error("access denied: {action}")]
    Denied { action: String },

    /// A declarative rule is malformed.
    #[error("invalid policy: {0}")]
    Invalid(String),

    /// Failed to parse a rules file.
    #[error("failed to parse policy: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, Error>;
