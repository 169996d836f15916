//! Execution-level status values.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The status of a server-side document execution.
///
/// The wire representation is a lowercase string. Parsing never fails: a
/// value outside the known set is kept verbatim in
/// [`ExecutionStatus::Unrecognized`] and treated as non-final.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExecutionStatus {
    /// Queued, not yet started.
    Pending,
    /// Explicitly waiting in a queue.
    Queued,
    /// Actively generating.
    Running,
    /// An approval action is in flight.
    Approving,
    /// Halted; can be resumed.
    Paused,
    /// Finished successfully.
    Completed,
    /// Finished and explicitly approved by a user.
    Approved,
    /// Terminated with an error.
    Failed,
    /// Terminated by a user or operator.
    Cancelled,
    /// A value this client does not know about.
    Unrecognized(String),
}

impl ExecutionStatus {
    /// Every recognized status, in lifecycle order.
    pub const KNOWN: [ExecutionStatus; 9] = [
        Self::Pending,
        Self::Queued,
        Self::Running,
        Self::Approving,
        Self::Paused,
        Self::Completed,
        Self::Approved,
        Self::Failed,
        Self::Cancelled,
    ];

    /// Returns `true` once the remote job can no longer change state.
    #[must_use]
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Approved | Self::Failed | Self::Cancelled
        )
    }

    /// Returns `true` if a document-level list poll should stay alive for
    /// this execution.
    ///
    /// Narrower than `!is_final()`: paused and approving executions do not
    /// keep a list poll running.
    #[must_use]
    pub fn is_list_active(&self) -> bool {
        matches!(self, Self::Running | Self::Pending | Self::Queued)
    }

    /// Returns `true` if the execution is halted but can be resumed.
    #[must_use]
    pub fn is_resumable(&self) -> bool {
        matches!(self, Self::Paused)
    }

    /// Returns `true` if in-flight indicators should still render.
    ///
    /// Completed and approved executions have nothing left to show; failed
    /// and cancelled ones stay visible so the user learns the outcome.
    #[must_use]
    pub fn should_display(&self) -> bool {
        !matches!(self, Self::Completed | Self::Approved)
    }

    /// Returns `true` for values inside the known set, `false` for
    /// [`Unrecognized`](Self::Unrecognized) ones.
    #[must_use]
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }

    /// The wire string for this status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Approving => "approving",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Approved => "approved",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Unrecognized(raw) => raw,
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ExecutionStatus {
    fn from(raw: &str) -> Self {
        match raw {
            "pending" => Self::Pending,
            "queued" => Self::Queued,
            "running" => Self::Running,
            "approving" => Self::Approving,
            "paused" => Self::Paused,
            "completed" => Self::Completed,
            "approved" => Self::Approved,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            other => Self::Unrecognized(other.to_owned()),
        }
    }
}

impl From<String> for ExecutionStatus {
    fn from(raw: String) -> Self {
        match Self::from(raw.as_str()) {
            Self::Unrecognized(_) => Self::Unrecognized(raw),
            known => known,
        }
    }
}

impl From<ExecutionStatus> for String {
    fn from(status: ExecutionStatus) -> Self {
        match status {
            ExecutionStatus::Unrecognized(raw) => raw,
            known => known.as_str().to_owned(),
        }
    }
}

impl FromStr for ExecutionStatus {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}
