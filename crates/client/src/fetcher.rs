//! The fetch seam between the poller and the transport.

use std::sync::Arc;

use async_trait::async_trait;
use execwatch_status::ExecutionRecord;

use crate::context::RequestContext;
use crate::error::FetchError;

/// Read-only access to execution status.
///
/// Implementations perform exactly one request per call and never retry.
#[async_trait]
pub trait StatusFetcher: Send + Sync {
    /// Fetch the current status of one execution.
    async fn fetch_status(
        &self,
        ctx: &RequestContext,
        execution_id: &str,
    ) -> Result<ExecutionRecord, FetchError>;

    /// Fetch every execution belonging to a document.
    async fn fetch_executions(
        &self,
        ctx: &RequestContext,
        document_id: &str,
    ) -> Result<Vec<ExecutionRecord>, FetchError>;
}

#[async_trait]
impl<T: StatusFetcher + ?Sized> StatusFetcher for Arc<T> {
    async fn fetch_status(
        &self,
        ctx: &RequestContext,
        execution_id: &str,
    ) -> Result<ExecutionRecord, FetchError> {
        (**self).fetch_status(ctx, execution_id).await
    }

    async fn fetch_executions(
        &self,
        ctx: &RequestContext,
        document_id: &str,
    ) -> Result<Vec<ExecutionRecord>, FetchError> {
        (**self).fetch_executions(ctx, document_id).await
    }
}

/// Reject empty identifiers before any request is built.
pub fn require_identifier(value: &str, field: &'static str) -> Result<(), FetchError> {
    if value.trim().is_empty() {
        Err(FetchError::MissingIdentifier { field })
    } else {
        Ok(())
    }
}
