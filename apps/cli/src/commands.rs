//! Command handlers.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use execwatch_client::{ContextStore, HttpStatusFetcher, RequestContext, StatusFetcher};
use execwatch_poller::{
    ListenerError, PollTarget, Poller, QuerySnapshot, Session, SessionOptions, StatusChange,
    StopReason,
};
use execwatch_status::{ExecutionRecord, classify};

use crate::config::CliConfig;

/// Resolved configuration plus the logged-in context.
pub struct App {
    config: CliConfig,
    store: ContextStore,
    fetcher: Arc<dyn StatusFetcher>,
}

impl App {
    /// Build the HTTP fetcher and log in with the configured context.
    pub fn new(config: CliConfig) -> Result<Self> {
        config.client.validate()?;
        let fetcher = HttpStatusFetcher::new(&config.client)?;
        let store = ContextStore::new();
        store.login(config.request_context()?);
        Ok(Self {
            config,
            store,
            fetcher: Arc::new(fetcher),
        })
    }

    fn context(&self) -> Result<Arc<RequestContext>> {
        Ok(self.store.require()?)
    }

    /// `status`: one fetch, no polling.
    pub async fn status(&self, execution_id: &str, json: bool) -> Result<ExitCode> {
        let ctx = self.context()?;
        let record = self
            .fetcher
            .fetch_status(&ctx, execution_id)
            .await
            .with_context(|| format!("fetching status of {execution_id}"))?;

        if json {
            println!("{}", serde_json::to_string_pretty(&record)?);
        } else {
            println!("{}", describe(&record));
        }
        Ok(ExitCode::SUCCESS)
    }

    /// `watch`: poll one execution until it stops.
    pub async fn watch(&self, execution_id: &str, interval: Option<Duration>) -> Result<ExitCode> {
        let ctx = self.context()?;
        let poller = Poller::new(Arc::clone(&self.fetcher), self.config.poller.clone())?;
        let session = poller.watch_execution(&ctx, execution_id, options(interval));

        let outcome = follow(session).await;
        poller.shutdown();
        let Some(snapshot) = outcome else {
            return Ok(ExitCode::from(130));
        };
        if let Some(record) = &snapshot.data {
            println!("{}", describe(record));
        }
        Ok(exit_code(&snapshot))
    }

    /// `list`: poll a document's executions until none is active.
    pub async fn list(&self, document_id: &str, interval: Option<Duration>) -> Result<ExitCode> {
        let ctx = self.context()?;
        let poller = Poller::new(Arc::clone(&self.fetcher), self.config.poller.clone())?;
        let session = poller.watch_document(&ctx, document_id, options(interval));

        let outcome = follow(session).await;
        poller.shutdown();
        let Some(snapshot) = outcome else {
            return Ok(ExitCode::from(130));
        };
        for record in snapshot.data.iter().flatten() {
            println!("{}", describe(record));
        }
        Ok(exit_code(&snapshot))
    }
}

fn options(interval: Option<Duration>) -> SessionOptions {
    let options = SessionOptions::new().on_status_change(print_change);
    match interval {
        Some(interval) => options.interval(interval),
        None => options,
    }
}

fn print_change(change: &StatusChange) -> Result<(), ListenerError> {
    println!("{}: {} -> {}", change.execution_id, change.prior, change.next);
    Ok(())
}

/// Wait until the session stops polling or the user interrupts. `None` on
/// interrupt.
async fn follow<T: PollTarget>(mut session: Session<T>) -> Option<QuerySnapshot<T::Output>> {
    if !session.is_enabled() {
        return Some(session.snapshot());
    }
    tokio::select! {
        snapshot = session.wait_until(|s| s.stop_reason().is_some()) => {
            if let Some(reason) = snapshot.as_ref().and_then(QuerySnapshot::stop_reason) {
                info!(query = %session.key(), %reason, "polling stopped");
            }
            snapshot
        }
        _ = tokio::signal::ctrl_c() => {
            session.stop_polling();
            None
        }
    }
}

fn describe(record: &ExecutionRecord) -> String {
    let descriptor = classify(&record.status);
    format!(
        "{}  {} [{}] {}",
        record.id, descriptor.label, descriptor.category, descriptor.description
    )
}

fn exit_code<O>(snapshot: &QuerySnapshot<O>) -> ExitCode {
    match snapshot.stop_reason() {
        Some(StopReason::Final | StopReason::Inactive) => ExitCode::SUCCESS,
        Some(StopReason::Failed) => {
            if let Some(error) = &snapshot.error {
                eprintln!("error: {error}");
            }
            ExitCode::FAILURE
        }
        Some(StopReason::Manual) | None => ExitCode::from(2),
    }
}

#[cfg(test)]
mod tests {
    use execwatch_poller::PollPhase;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn describe_uses_presentation_label() {
        let line = describe(&ExecutionRecord::new("ex-1", "running"));
        assert!(line.starts_with("ex-1  Generating"), "{line}");
    }

    #[test]
    fn exit_codes_follow_stop_reason() {
        let mut snapshot = QuerySnapshot::<ExecutionRecord>::default();
        snapshot.phase = PollPhase::Stopped(StopReason::Final);
        assert_eq!(exit_code(&snapshot), ExitCode::SUCCESS);

        snapshot.phase = PollPhase::Stopped(StopReason::Failed);
        assert_eq!(exit_code(&snapshot), ExitCode::FAILURE);

        snapshot.phase = PollPhase::Stopped(StopReason::Manual);
        assert_eq!(exit_code(&snapshot), ExitCode::from(2));
    }
}
