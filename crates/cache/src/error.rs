//! Result cache error types.

use thiserror::Error;

/// Result cache errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The wrapped operation produced an empty result on a miss.
    #[error("not found: {operation} returned no data")]
    NotFound { operation: String },

    /// A required parameter was not supplied.
    #[error("missing argument '{name}' for {operation}")]
    MissingArgument { operation: String, name: String },

    /// An argument was supplied that the operation does not declare.
    #[error("unexpected argument '{name}' for {operation}")]
    UnexpectedArgument { operation: String, name: String },

    /// A stored payload does not match the declared result shape.
    #[error("corrupt cache entry: {0}")]
    CorruptEntry(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backing store failed.
    #[error(transparent)]
    Store(#[from] storage::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
