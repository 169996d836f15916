//! Presentation descriptors for execution statuses.

use std::fmt;

use serde::Serialize;

use crate::status::ExecutionStatus;

/// Visual category a display collaborator maps to an icon or colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    /// Work is actively happening.
    InProgress,
    /// Waiting for capacity or for a user.
    Waiting,
    /// Finished well.
    Success,
    /// Finished badly.
    Error,
    /// No particular emphasis.
    Neutral,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InProgress => "in-progress",
            Self::Waiting => "waiting",
            Self::Success => "success",
            Self::Error => "error",
            Self::Neutral => "neutral",
        })
    }
}

/// How a status should be presented to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct StatusDescriptor {
    /// Short label, e.g. for a badge.
    pub label: &'static str,
    /// One-sentence explanation.
    pub description: &'static str,
    /// Visual category.
    pub category: Category,
}

impl StatusDescriptor {
    const fn new(label: &'static str, description: &'static str, category: Category) -> Self {
        Self {
            label,
            description,
            category,
        }
    }
}

const PENDING: StatusDescriptor = StatusDescriptor::new(
    "Pending",
    "The execution is waiting to start.",
    Category::Waiting,
);
const QUEUED: StatusDescriptor = StatusDescriptor::new(
    "Queued",
    "The execution is queued behind other work.",
    Category::Waiting,
);
const RUNNING: StatusDescriptor = StatusDescriptor::new(
    "Generating",
    "Sections are being generated.",
    Category::InProgress,
);
const APPROVING: StatusDescriptor = StatusDescriptor::new(
    "Approving",
    "The generated content is being approved.",
    Category::InProgress,
);
const PAUSED: StatusDescriptor = StatusDescriptor::new(
    "Paused",
    "The execution is paused and can be resumed.",
    Category::Waiting,
);
const COMPLETED: StatusDescriptor = StatusDescriptor::new(
    "Completed",
    "Generation finished successfully.",
    Category::Success,
);
const APPROVED: StatusDescriptor = StatusDescriptor::new(
    "Approved",
    "The generated content was approved.",
    Category::Success,
);
const FAILED: StatusDescriptor = StatusDescriptor::new(
    "Failed",
    "The execution stopped with an error.",
    Category::Error,
);
const CANCELLED: StatusDescriptor = StatusDescriptor::new(
    "Cancelled",
    "The execution was cancelled.",
    Category::Neutral,
);
const UNKNOWN: StatusDescriptor = StatusDescriptor::new(
    "Unknown",
    "The execution reported a status this client does not recognise.",
    Category::Neutral,
);

/// Map a status to its presentation descriptor.
///
/// Total and pure; unrecognized values get a neutral descriptor.
#[must_use]
pub fn classify(status: &ExecutionStatus) -> StatusDescriptor {
    match status {
        ExecutionStatus::Pending => PENDING,
        ExecutionStatus::Queued => QUEUED,
        ExecutionStatus::Running => RUNNING,
        ExecutionStatus::Approving => APPROVING,
        ExecutionStatus::Paused => PAUSED,
        ExecutionStatus::Completed => COMPLETED,
        ExecutionStatus::Approved => APPROVED,
        ExecutionStatus::Failed => FAILED,
        ExecutionStatus::Cancelled => CANCELLED,
        ExecutionStatus::Unrecognized(_) => UNKNOWN,
    }
}

/// [`classify`] for a raw wire string.
#[must_use]
pub fn classify_str(raw: &str) -> StatusDescriptor {
    classify(&ExecutionStatus::from(raw))
}
