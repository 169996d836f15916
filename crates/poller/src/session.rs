//! Polling sessions: one collaborator's handle on a shared query.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use execwatch_status::{ExecutionRecord, ExecutionStatus, StatusDescriptor, classify};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::{ListenerError, PollError};
use crate::event::QueryKey;
use crate::listener::{SharedListener, StatusListener};
use crate::poller::Registry;
use crate::query::{Command, Query, QuerySnapshot};
use crate::target::{DocumentTarget, ExecutionTarget, PollTarget};
use crate::tracker::StatusChange;

/// Unique id of a session within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// SessionOptions
// ---------------------------------------------------------------------------

/// Per-session options.
#[derive(Clone)]
pub struct SessionOptions {
    pub(crate) enabled: bool,
    pub(crate) polling_interval: Option<Duration>,
    pub(crate) listeners: Vec<SharedListener>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            polling_interval: None,
            listeners: Vec::new(),
        }
    }
}

impl SessionOptions {
    /// Options with defaults: enabled, configured interval, no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A disabled session never fetches, whatever else is set.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Override the base interval for this session. A zero interval is
    /// ignored.
    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.polling_interval = (!interval.is_zero()).then_some(interval);
        self
    }

    /// Call `f` on every status transition this session observes.
    #[must_use]
    pub fn on_status_change<F>(self, f: F) -> Self
    where
        F: Fn(&StatusChange) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.listener(Arc::new(f))
    }

    /// Add a listener.
    #[must_use]
    pub fn listener(mut self, listener: Arc<dyn StatusListener>) -> Self {
        self.listeners.push(listener);
        self
    }
}

impl fmt::Debug for SessionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionOptions")
            .field("enabled", &self.enabled)
            .field("polling_interval", &self.polling_interval)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

struct Attached<T: PollTarget> {
    registry: Arc<Registry<T>>,
    query: Arc<Query<T>>,
    cancel: CancellationToken,
}

/// A collaborator's view of a polling query.
///
/// Sessions on the same tenant and id share one query: they see the same
/// snapshot and an `invalidate` from any of them refetches once for all.
/// Transition tracking and listeners are per session.
///
/// Dropping the session detaches it. When the last session on a query
/// detaches, the query is cancelled and any in-flight response is dropped.
pub struct Session<T: PollTarget> {
    id: SessionId,
    key: QueryKey,
    snapshot: watch::Receiver<QuerySnapshot<T::Output>>,
    attached: Option<Attached<T>>,
}

/// Session on a single execution.
pub type ExecutionSession = Session<ExecutionTarget>;

/// Session on a document's execution list.
pub type DocumentSession = Session<DocumentTarget>;

impl<T: PollTarget> Session<T> {
    pub(crate) fn attached(
        id: SessionId,
        registry: Arc<Registry<T>>,
        query: Arc<Query<T>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            key: query.key().clone(),
            snapshot: query.subscribe(),
            attached: Some(Attached {
                registry,
                query,
                cancel,
            }),
        }
    }

    pub(crate) fn disabled(id: SessionId, key: QueryKey) -> Self {
        let (_, snapshot) = watch::channel(QuerySnapshot::default());
        Self {
            id,
            key,
            snapshot,
            attached: None,
        }
    }

    /// This session's id.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The key of the query this session observes.
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Whether the session is attached to a query. Disabled sessions never
    /// fetch.
    pub fn is_enabled(&self) -> bool {
        self.attached.is_some()
    }

    /// The current shared state.
    pub fn snapshot(&self) -> QuerySnapshot<T::Output> {
        self.snapshot.borrow().clone()
    }

    /// The terminal error, if polling gave up.
    pub fn error(&self) -> Option<PollError> {
        self.snapshot.borrow().error.clone()
    }

    /// Whether a fetch is in flight or scheduled.
    pub fn is_polling(&self) -> bool {
        self.attached.is_some() && self.snapshot.borrow().is_polling()
    }

    /// Restart a stopped query with an immediate fetch. No effect while the
    /// query is polling.
    pub fn start_polling(&self) {
        self.send(Command::Start);
    }

    /// Stop scheduling fetches for every session on this query.
    pub fn stop_polling(&self) {
        self.send(Command::Stop);
    }

    /// Fetch now, outside the regular cadence. Restarts a stopped query if
    /// the fetched status is not final.
    pub fn invalidate(&self) {
        self.send(Command::Invalidate);
    }

    fn send(&self, command: Command) {
        if let Some(attached) = &self.attached {
            attached.query.send(command);
        }
    }

    /// Wait for the next snapshot update. Returns `false` when no update
    /// can arrive.
    pub async fn changed(&mut self) -> bool {
        self.attached.is_some() && self.snapshot.changed().await.is_ok()
    }

    /// Wait until `predicate` holds for the snapshot, checking the current
    /// one first. `None` when the session is disabled and the predicate does
    /// not already hold.
    pub async fn wait_until<F>(&mut self, mut predicate: F) -> Option<QuerySnapshot<T::Output>>
    where
        F: FnMut(&QuerySnapshot<T::Output>) -> bool,
    {
        if self.attached.is_none() {
            let snapshot = self.snapshot();
            return predicate(&snapshot).then_some(snapshot);
        }
        self.snapshot
            .wait_for(|snapshot| predicate(snapshot))
            .await
            .ok()
            .map(|snapshot| QuerySnapshot::clone(&snapshot))
    }

    /// Detach from the query. Same as dropping the session.
    pub fn close(self) {}
}

impl<T: PollTarget> Drop for Session<T> {
    fn drop(&mut self) {
        let Some(attached) = self.attached.take() else {
            return;
        };
        attached.cancel.cancel();
        if attached.query.detach(self.id) {
            attached.registry.release(&self.key, &attached.query);
        }
        tracing::debug!(session = %self.id, query = %self.key, "session closed");
    }
}

impl<T: PollTarget> fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot.borrow();
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("enabled", &self.attached.is_some())
            .field("phase", &snapshot.phase)
            .field("fetch_count", &snapshot.fetch_count)
            .finish_non_exhaustive()
    }
}

impl Session<ExecutionTarget> {
    /// The last fetched record.
    pub fn record(&self) -> Option<ExecutionRecord> {
        self.snapshot.borrow().data.clone()
    }

    /// The last fetched status.
    pub fn status(&self) -> Option<ExecutionStatus> {
        self.snapshot
            .borrow()
            .data
            .as_ref()
            .map(|record| record.status.clone())
    }

    /// Presentation descriptor for the last fetched status.
    pub fn descriptor(&self) -> Option<StatusDescriptor> {
        self.status().as_ref().map(classify)
    }

    /// Whether in-flight displays should render. False once the execution
    /// completed or was approved; true while nothing is known yet.
    pub fn should_display(&self) -> bool {
        self.status()
            .is_none_or(|status| status.should_display())
    }
}

impl Session<DocumentTarget> {
    /// The last fetched execution list. Empty before the first fetch.
    pub fn records(&self) -> Vec<ExecutionRecord> {
        self.snapshot.borrow().data.clone().unwrap_or_default()
    }

    /// Whether any execution in the last fetched list is running, pending
    /// or queued.
    pub fn any_active(&self) -> bool {
        self.snapshot
            .borrow()
            .data
            .as_deref()
            .is_some_and(execwatch_status::any_list_active)
    }
}
