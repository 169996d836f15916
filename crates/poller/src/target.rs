//! What a query polls: one execution or a document's execution list.

use async_trait::async_trait;
use execwatch_client::{FetchError, RequestContext, StatusFetcher};
use execwatch_status::{ExecutionRecord, ExecutionStatus};

use crate::event::TargetKind;
use crate::schedule::PollSchedule;
use crate::tracker::{StatusChange, TrackedExecutionSet, TransitionTracker};

/// A pollable resource.
///
/// Ties together the fetch call, the schedule deciding when to stop and the
/// tracker detecting transitions for that kind of data.
#[async_trait]
pub trait PollTarget: Clone + Send + Sync + 'static {
    /// Fetched data.
    type Output: Clone + Send + Sync + 'static;
    /// Per-observer transition state.
    type Tracker: Default + Send + 'static;

    /// Key kind of queries for this target.
    const KIND: TargetKind;
    /// Stop condition applied after every successful fetch.
    const SCHEDULE: PollSchedule;

    /// Execution or document id.
    fn id(&self) -> &str;

    /// Perform one fetch.
    async fn fetch(
        &self,
        fetcher: &dyn StatusFetcher,
        ctx: &RequestContext,
    ) -> Result<Self::Output, FetchError>;

    /// Statuses the schedule decides on.
    fn statuses(output: &Self::Output) -> Vec<&ExecutionStatus>;

    /// Feed fetched data into a tracker, returning the transitions.
    fn observe(tracker: &mut Self::Tracker, output: &Self::Output) -> Vec<StatusChange>;
}

/// A single execution, polled until it reaches a final status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionTarget {
    execution_id: String,
}

impl ExecutionTarget {
    /// Target `execution_id`.
    pub fn new(execution_id: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
        }
    }
}

#[async_trait]
impl PollTarget for ExecutionTarget {
    type Output = ExecutionRecord;
    type Tracker = TransitionTracker;

    const KIND: TargetKind = TargetKind::Execution;
    const SCHEDULE: PollSchedule = PollSchedule::UntilFinal;

    fn id(&self) -> &str {
        &self.execution_id
    }

    async fn fetch(
        &self,
        fetcher: &dyn StatusFetcher,
        ctx: &RequestContext,
    ) -> Result<ExecutionRecord, FetchError> {
        fetcher.fetch_status(ctx, &self.execution_id).await
    }

    fn statuses(output: &ExecutionRecord) -> Vec<&ExecutionStatus> {
        vec![&output.status]
    }

    fn observe(tracker: &mut TransitionTracker, output: &ExecutionRecord) -> Vec<StatusChange> {
        tracker.observe(output).into_iter().collect()
    }
}

/// Every execution of a document, polled while any is running, pending or
/// queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentTarget {
    document_id: String,
}

impl DocumentTarget {
    /// Target the executions of `document_id`.
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
        }
    }
}

#[async_trait]
impl PollTarget for DocumentTarget {
    type Output = Vec<ExecutionRecord>;
    type Tracker = TrackedExecutionSet;

    const KIND: TargetKind = TargetKind::Document;
    const SCHEDULE: PollSchedule = PollSchedule::WhileListActive;

    fn id(&self) -> &str {
        &self.document_id
    }

    async fn fetch(
        &self,
        fetcher: &dyn StatusFetcher,
        ctx: &RequestContext,
    ) -> Result<Vec<ExecutionRecord>, FetchError> {
        fetcher.fetch_executions(ctx, &self.document_id).await
    }

    fn statuses(output: &Vec<ExecutionRecord>) -> Vec<&ExecutionStatus> {
        output.iter().map(|record| &record.status).collect()
    }

    fn observe(tracker: &mut TrackedExecutionSet, output: &Vec<ExecutionRecord>) -> Vec<StatusChange> {
        tracker.observe_all(output)
    }
}
