//! Transition tracking.
//!
//! A tracker remembers the previously observed status and reports a
//! [`StatusChange`] only when a new observation differs from it. The first
//! observation never produces a change: there is nothing to transition from.

use std::collections::BTreeMap;

use execwatch_status::{ExecutionRecord, ExecutionStatus};

/// A status transition observed for one execution.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    /// The execution that changed.
    pub execution_id: String,
    /// Status before the change.
    pub prior: ExecutionStatus,
    /// Status after the change.
    pub next: ExecutionStatus,
    /// The record that carried the new status.
    pub record: ExecutionRecord,
}

/// Tracks a single execution's status across fetches.
#[derive(Debug, Clone, Default)]
pub struct TransitionTracker {
    last: Option<ExecutionStatus>,
}

impl TransitionTracker {
    /// A tracker in the uninitialized state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observation and report a change if there was one.
    ///
    /// The stored status is updated before this returns, so a caller that
    /// reacts to the change by fetching again sees the new value.
    pub fn observe(&mut self, record: &ExecutionRecord) -> Option<StatusChange> {
        let prior = self.last.replace(record.status.clone())?;
        (prior != record.status).then(|| StatusChange {
            execution_id: record.id.clone(),
            prior,
            next: record.status.clone(),
            record: record.clone(),
        })
    }

    /// The last observed status, `None` before the first observation.
    pub fn last(&self) -> Option<&ExecutionStatus> {
        self.last.as_ref()
    }

    /// Whether at least one observation has been recorded.
    pub fn is_tracking(&self) -> bool {
        self.last.is_some()
    }

    /// Return to the uninitialized state.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Per-execution trackers for a list of executions, keyed by execution id.
#[derive(Debug, Clone, Default)]
pub struct TrackedExecutionSet {
    members: BTreeMap<String, TransitionTracker>,
}

impl TrackedExecutionSet {
    /// An empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe a freshly fetched list.
    ///
    /// Each execution is tracked independently, so an execution that first
    /// appears in this list produces no change. Executions missing from the
    /// list are forgotten. When an id appears more than once, its last entry
    /// wins.
    pub fn observe_all(&mut self, records: &[ExecutionRecord]) -> Vec<StatusChange> {
        let mut latest: BTreeMap<&str, usize> = BTreeMap::new();
        for (index, record) in records.iter().enumerate() {
            latest.insert(record.id.as_str(), index);
        }
        self.members
            .retain(|id, _| latest.contains_key(id.as_str()));
        records
            .iter()
            .enumerate()
            .filter(|(index, record)| latest.get(record.id.as_str()) == Some(index))
            .filter_map(|(_, record)| {
                self.members
                    .entry(record.id.clone())
                    .or_default()
                    .observe(record)
            })
            .collect()
    }

    /// Whether any tracked execution keeps a list poll alive.
    pub fn any_active(&self) -> bool {
        self.members
            .values()
            .filter_map(TransitionTracker::last)
            .any(ExecutionStatus::is_list_active)
    }

    /// The last observed status of `execution_id`.
    pub fn status_of(&self, execution_id: &str) -> Option<&ExecutionStatus> {
        self.members.get(execution_id).and_then(TransitionTracker::last)
    }

    /// Number of tracked executions.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Forget every execution.
    pub fn reset(&mut self) {
        self.members.clear();
    }
}
