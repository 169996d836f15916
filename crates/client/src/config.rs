//! HTTP client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Default header carrying the tenant id.
pub const DEFAULT_TENANT_HEADER: &str = "X-Organization-Id";

/// Configuration for [`HttpStatusFetcher`](crate::HttpStatusFetcher).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Whole-request timeout. `None` keeps the transport default.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Option<Duration>,
    /// TCP connect timeout.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// User agent sent with every request.
    pub user_agent: String,
    /// Name of the header that carries the tenant id.
    pub tenant_header: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: None,
            connect_timeout: Duration::from_secs(10),
            user_agent: format!("execwatch/{}", env!("CARGO_PKG_VERSION")),
            tenant_header: DEFAULT_TENANT_HEADER.to_owned(),
        }
    }
}

impl ClientConfig {
    /// Check the configuration for values the client cannot use.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.connect_timeout.is_zero() {
            return Err(ClientError::Configuration(
                "connect timeout cannot be zero".into(),
            ));
        }
        if self.request_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ClientError::Configuration(
                "request timeout cannot be zero".into(),
            ));
        }
        if reqwest::header::HeaderName::from_bytes(self.tenant_header.as_bytes()).is_err() {
            return Err(ClientError::Configuration(format!(
                "invalid tenant header name '{}'",
                self.tenant_header
            )));
        }
        Ok(())
    }
}
