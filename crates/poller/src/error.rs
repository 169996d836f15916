//! Error types for polling sessions.

use std::sync::Arc;

use execwatch_client::FetchError;
use thiserror::Error;

/// Result type for poller construction.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Terminal error state of a polling query.
///
/// Only surfaced once the retry budget is spent (or the fetch can never
/// succeed); failures inside the budget are retried silently.
#[derive(Error, Debug, Clone)]
pub enum PollError {
    /// Consecutive fetch failures exceeded the retry budget.
    #[error("gave up after {attempts} consecutive failures: {last}")]
    MaxRetriesExceeded {
        /// Number of consecutive failed fetches.
        attempts: u32,
        /// The last failure.
        last: Arc<FetchError>,
    },

    /// The fetch was rejected before any request was made.
    #[error("fetch rejected: {0}")]
    Rejected(Arc<FetchError>),
}

impl PollError {
    /// The fetch failure behind this error.
    pub fn fetch_error(&self) -> &FetchError {
        match self {
            Self::MaxRetriesExceeded { last, .. } => last,
            Self::Rejected(err) => err,
        }
    }
}

/// Failure reported by a [`StatusListener`](crate::StatusListener).
///
/// Logged and discarded; it never affects polling or tracker state.
#[derive(Error, Debug)]
#[error("status listener failed: {message}")]
pub struct ListenerError {
    message: String,
}

impl ListenerError {
    /// Create a listener error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The failure message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for ListenerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ListenerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Invalid poller configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A duration that must be positive was zero.
    #[error("{field} must be greater than zero")]
    ZeroDuration {
        /// The offending field.
        field: &'static str,
    },

    /// The backoff cap is below the base delay.
    #[error("retry cap ({cap_ms}ms) is below the base delay ({base_ms}ms)")]
    CapBelowBase {
        /// Base delay in milliseconds.
        base_ms: u128,
        /// Cap in milliseconds.
        cap_ms: u128,
    },

    /// The event buffer cannot hold any event.
    #[error("event buffer must hold at least one event")]
    EmptyEventBuffer,
}
