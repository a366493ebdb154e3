//! CLI error types.

use crate::config::ConfigError;
use thiserror::Error;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// No data directory could be determined.
    #[error("no data directory found; set storage.data_dir in the config")]
    NoDataDir,

    /// Configuration is invalid or unreadable.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// An error occurred in the account service.
    #[error("{0} (status {status})", status = .0.status_code())]
    Accounts(#[from] accounts::Error),

    /// An error occurred in the access layer.
    #[error(transparent)]
    Access(#[from] access::Error),

    /// An error occurred in the storage layer.
    #[error(transparent)]
    Storage(#[from] storage::Error),

    /// A log filter directive failed to parse.
    #[error("invalid log directive: {0}")]
    LogFilter(#[from] tracing_subscriber::filter::ParseError),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
