//! Error types for status fetching.
use thiserror::Error;

/// Boxed transport error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure of a single status or list fetch.
#[derive(Error, Debug)]
pub enum FetchError {
    /// No response was received.
    #[error("network error: {source}")]
    Network {
        /// The transport error.
        #[source]
        source: BoxError,
    },

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}{}", message_suffix(.message))]
    Http {
        /// HTTP status code.
        status: u16,
        /// Human-readable message from the JSON body, if any.
        message: Option<String>,
    },

    /// The response body was not a status record.
    #[error("invalid response body: {message}")]
    Decode {
        /// What went wrong.
        message: String,
    },

    /// A required identifier was empty; no request was issued.
    #[error("missing identifier: {field}")]
    MissingIdentifier {
        /// Which identifier was empty.
        field: &'static str,
    },
}

impl FetchError {
    /// Create a network error from any transport failure.
    pub fn network(source: impl Into<BoxError>) -> Self {
        Self::Network {
            source: source.into(),
        }
    }

    /// Create an HTTP error.
    pub fn http(status: u16, message: Option<String>) -> Self {
        Self::Http { status, message }
    }

    /// Create a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Whether the poller may retry after this error.
    ///
    /// Client and server errors are not distinguished.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::MissingIdentifier { .. })
    }

    /// The HTTP status code, when the server answered.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn message_suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(": {m}"))
        .unwrap_or_default()
}

/// Errors from building a client or managing the request context.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The client configuration is invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The underlying HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),

    /// A base URL could not be parsed or cannot carry path segments.
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl {
        /// The offending URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An operation needs a logged-in context.
    #[error("no active session; log in first")]
    NotAuthenticated,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_display_with_and_without_message() {
        assert_eq!(FetchError::http(503, None).to_string(), "HTTP 503");
        assert_eq!(
            FetchError::http(404, Some("execution not found".into())).to_string(),
            "HTTP 404: execution not found"
        );
    }

    #[test]
    fn network_wraps_any_transport_error() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = FetchError::network(io);
        assert_eq!(err.to_string(), "network error: refused");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn retryability() {
        assert!(FetchError::http(404, None).is_retryable());
        assert!(FetchError::http(500, None).is_retryable());
        assert!(FetchError::decode("truncated").is_retryable());
        assert!(
            !FetchError::MissingIdentifier {
                field: "execution_id"
            }
            .is_retryable()
        );
    }

    #[test]
    fn status_code_only_for_http() {
        assert_eq!(FetchError::http(418, None).status_code(), Some(418));
        assert_eq!(FetchError::decode("x").status_code(), None);
    }
}
