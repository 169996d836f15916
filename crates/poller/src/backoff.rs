//! Capped exponential backoff for failed fetches.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Retry budget and delays for consecutive fetch failures.
///
/// After the `n`-th consecutive failure (1-based) a session waits
/// `delay(n - 1)` and tries again, as long as `n <= max_retries`. The failure
/// after that ends the session with
/// [`PollError::MaxRetriesExceeded`](crate::PollError::MaxRetriesExceeded).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    #[serde(with = "humantime_serde")]
    pub base: Duration,
    /// Upper bound for any retry delay.
    #[serde(with = "humantime_serde")]
    pub cap: Duration,
    /// Retries allowed before giving up.
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based): `min(base * 2^attempt, cap)`.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.cap)
    }

    /// Whether a session that has failed `consecutive_failures` times in a
    /// row should try again.
    #[must_use]
    pub fn allows_retry(&self, consecutive_failures: u32) -> bool {
        consecutive_failures <= self.max_retries
    }

    /// Check the policy for unusable values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base.is_zero() {
            return Err(ConfigError::ZeroDuration {
                field: "retry.base",
            });
        }
        if self.cap < self.base {
            return Err(ConfigError::CapBelowBase {
                base_ms: self.base.as_millis(),
                cap_ms: self.cap.as_millis(),
            });
        }
        Ok(())
    }
}
