//! Logging errors.

use thiserror::Error;

/// Result type for logger setup.
pub type LogResult<T> = Result<T, LogError>;

/// Logger setup failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LogError {
    /// The filter directive could not be parsed.
    #[error("invalid log filter: {0}")]
    Filter(String),

    /// The format name is not known.
    #[error("unknown log format '{0}' (expected pretty, compact or json)")]
    UnknownFormat(String),

    /// A global subscriber is already installed.
    #[error("logger already initialized: {0}")]
    AlreadyInitialized(String),
}
