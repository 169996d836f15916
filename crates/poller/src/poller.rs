//! The polling hub.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use execwatch_client::{RequestContext, StatusFetcher};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::PollerConfig;
use crate::error::Result;
use crate::event::{EventBus, QueryKey, StatusEvent};
use crate::query::{Query, Shared, Slot};
use crate::session::{DocumentSession, ExecutionSession, Session, SessionId, SessionOptions};
use crate::target::{DocumentTarget, ExecutionTarget, PollTarget};

/// Live queries of one target kind.
pub(crate) struct Registry<T: PollTarget> {
    queries: DashMap<QueryKey, Arc<Query<T>>>,
    shared: Arc<Shared>,
    root: CancellationToken,
    interval: Duration,
}

impl<T: PollTarget> Registry<T> {
    fn new(shared: Arc<Shared>, root: CancellationToken, interval: Duration) -> Self {
        Self {
            queries: DashMap::new(),
            shared,
            root,
            interval,
        }
    }

    fn open(self: &Arc<Self>, ctx: &RequestContext, target: T, options: SessionOptions) -> Session<T> {
        let id = SessionId::next();
        let key = QueryKey::new(T::KIND, ctx.tenant_id(), target.id());

        if !options.enabled
            || key.id.trim().is_empty()
            || key.tenant_id.trim().is_empty()
            || self.root.is_cancelled()
        {
            tracing::debug!(session = %id, query = %key, "session disabled");
            return Session::disabled(id, key);
        }

        let cancel = self.root.child_token();
        let mut slot = Slot::new(
            id,
            options.polling_interval,
            options.listeners,
            cancel.clone(),
        );
        let query = loop {
            let query = Arc::clone(
                self.queries
                    .entry(key.clone())
                    .or_insert_with(|| {
                        tracing::debug!(query = %key, "creating query");
                        Query::spawn(
                            key.clone(),
                            target.clone(),
                            ctx.clone(),
                            Arc::clone(&self.shared),
                            self.root.child_token(),
                            self.interval,
                        )
                    })
                    .value(),
            );
            match query.attach(slot) {
                Ok(()) => break query,
                // Lost a race with the last session detaching; start over.
                Err(returned) => {
                    slot = returned;
                    self.queries
                        .remove_if(&key, |_, current| Arc::ptr_eq(current, &query));
                }
            }
        };

        tracing::debug!(session = %id, query = %key, "session attached");
        Session::attached(id, Arc::clone(self), query, cancel)
    }

    /// Drop `query` from the cache and cancel it. Called once its last
    /// session detaches.
    pub(crate) fn release(&self, key: &QueryKey, query: &Arc<Query<T>>) {
        self.queries
            .remove_if(key, |_, current| Arc::ptr_eq(current, query));
        query.cancel();
        tracing::debug!(query = %key, "query released");
    }

    fn len(&self) -> usize {
        self.queries.len()
    }
}

/// Owns the fetcher, the shared query cache and the event bus.
///
/// Sessions opened on the same tenant and id share one query and one fetch
/// loop. Dropping the poller shuts every query down; sessions still held
/// stop polling and keep their last snapshot.
///
/// Opening an enabled session spawns onto the current Tokio runtime.
pub struct Poller {
    executions: Arc<Registry<ExecutionTarget>>,
    documents: Arc<Registry<DocumentTarget>>,
    events: Arc<EventBus>,
    root: CancellationToken,
    config: PollerConfig,
}

impl Poller {
    /// Create a poller. Fails if `config` is invalid.
    pub fn new(fetcher: Arc<dyn StatusFetcher>, config: PollerConfig) -> Result<Self> {
        config.validate()?;
        let events = Arc::new(EventBus::new(config.event_buffer));
        let shared = Arc::new(Shared {
            fetcher,
            retry: config.retry,
            events: Arc::clone(&events),
        });
        let root = CancellationToken::new();
        Ok(Self {
            executions: Arc::new(Registry::new(
                Arc::clone(&shared),
                root.clone(),
                config.execution_interval,
            )),
            documents: Arc::new(Registry::new(
                shared,
                root.clone(),
                config.document_interval,
            )),
            events,
            root,
            config,
        })
    }

    /// Track one execution until it reaches a final status.
    ///
    /// The session is disabled, and never fetches, when `options` disable
    /// it, when `execution_id` or the context's tenant is empty, or after
    /// [`shutdown`](Self::shutdown).
    ///
    /// # Panics
    ///
    /// Panics when an enabled session is opened outside a Tokio runtime.
    pub fn watch_execution(
        &self,
        ctx: &RequestContext,
        execution_id: impl Into<String>,
        options: SessionOptions,
    ) -> ExecutionSession {
        self.executions
            .open(ctx, ExecutionTarget::new(execution_id), options)
    }

    /// Track every execution of a document while any is running, pending or
    /// queued. Same disabling rules as
    /// [`watch_execution`](Self::watch_execution).
    ///
    /// # Panics
    ///
    /// Panics when an enabled session is opened outside a Tokio runtime.
    pub fn watch_document(
        &self,
        ctx: &RequestContext,
        document_id: impl Into<String>,
        options: SessionOptions,
    ) -> DocumentSession {
        self.documents
            .open(ctx, DocumentTarget::new(document_id), options)
    }

    /// Subscribe to status events from every query.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.events.subscribe()
    }

    /// Number of live queries.
    pub fn active_queries(&self) -> usize {
        self.executions.len() + self.documents.len()
    }

    /// The configuration this poller was built with.
    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Cancel every query. Responses still in flight are dropped and new
    /// sessions open disabled.
    pub fn shutdown(&self) {
        if !self.root.is_cancelled() {
            tracing::debug!(queries = self.active_queries(), "shutting down poller");
        }
        self.root.cancel();
    }

    /// Whether [`shutdown`](Self::shutdown) was called.
    pub fn is_shutdown(&self) -> bool {
        self.root.is_cancelled()
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("active_queries", &self.active_queries())
            .field("shutdown", &self.root.is_cancelled())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::testing::ScriptedFetcher;

    fn ctx() -> RequestContext {
        RequestContext::parse("http://localhost/api", "org-1").unwrap()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = PollerConfig {
            event_buffer: 0,
            ..PollerConfig::default()
        };
        let err = Poller::new(Arc::new(ScriptedFetcher::new()), config).unwrap_err();
        assert_eq!(err, ConfigError::EmptyEventBuffer);
    }

    #[tokio::test(start_paused = true)]
    async fn sessions_share_and_release_queries() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.script_statuses("ex-1", &["running"]);
        let poller = Poller::new(fetcher, PollerConfig::default()).unwrap();

        let a = poller.watch_execution(&ctx(), "ex-1", SessionOptions::new());
        let b = poller.watch_execution(&ctx(), "ex-1", SessionOptions::new());
        assert_eq!(poller.active_queries(), 1);
        let query = Arc::clone(poller.executions.queries.get(a.key()).unwrap().value());
        assert_eq!(query.observer_count(), 2);

        drop(a);
        assert_eq!(query.observer_count(), 1);
        assert_eq!(poller.active_queries(), 1);

        b.close();
        assert_eq!(poller.active_queries(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_sessions_open_no_query() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let poller = Poller::new(fetcher.clone(), PollerConfig::default()).unwrap();

        let off = poller.watch_execution(&ctx(), "ex-1", SessionOptions::new().enabled(false));
        let blank = poller.watch_execution(&ctx(), "  ", SessionOptions::new());
        let no_tenant = poller.watch_document(&ctx().for_tenant(""), "doc-1", SessionOptions::new());
        assert!(!off.is_enabled());
        assert!(!blank.is_enabled());
        assert!(!no_tenant.is_enabled());
        assert_eq!(poller.active_queries(), 0);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(fetcher.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_disables_new_sessions() {
        let poller = Poller::new(Arc::new(ScriptedFetcher::new()), PollerConfig::default()).unwrap();
        poller.shutdown();
        assert!(poller.is_shutdown());
        let session = poller.watch_execution(&ctx(), "ex-1", SessionOptions::new());
        assert!(!session.is_enabled());
    }
}
