//! Poller configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backoff::RetryPolicy;
use crate::error::ConfigError;

/// Configuration shared by every session a [`Poller`](crate::Poller) opens.
///
/// Durations are written in humantime form (`"5s"`, `"1m 30s"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Base interval for single-execution sessions.
    #[serde(with = "humantime_serde")]
    pub execution_interval: Duration,
    /// Base interval for document list sessions. Longer than the
    /// single-execution interval since list views are lower priority.
    #[serde(with = "humantime_serde")]
    pub document_interval: Duration,
    /// Retry policy for failed fetches.
    pub retry: RetryPolicy,
    /// Capacity of the status event broadcast buffer.
    pub event_buffer: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            execution_interval: Duration::from_secs(5),
            document_interval: Duration::from_secs(45),
            retry: RetryPolicy::default(),
            event_buffer: 256,
        }
    }
}

impl PollerConfig {
    /// Check the configuration for unusable values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.execution_interval.is_zero() {
            return Err(ConfigError::ZeroDuration {
                field: "execution_interval",
            });
        }
        if self.document_interval.is_zero() {
            return Err(ConfigError::ZeroDuration {
                field: "document_interval",
            });
        }
        if self.event_buffer == 0 {
            return Err(ConfigError::EmptyEventBuffer);
        }
        self.retry.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_valid() {
        PollerConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: PollerConfig = serde_json::from_str(
            r#"{"execution_interval": "2s", "retry": {"max_retries": 5}}"#,
        )
        .unwrap();
        assert_eq!(config.execution_interval, Duration::from_secs(2));
        assert_eq!(config.document_interval, Duration::from_secs(45));
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.base, Duration::from_secs(1));
    }

    #[test]
    fn rejects_zero_intervals() {
        let config = PollerConfig {
            document_interval: Duration::ZERO,
            ..PollerConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroDuration {
                field: "document_interval"
            })
        );

        let config = PollerConfig {
            event_buffer: 0,
            ..PollerConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyEventBuffer));
    }
}
