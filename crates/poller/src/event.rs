//! Event broadcasting for polling observability.
//!
//! Provides [`StatusEvent`] variants emitted by polling queries and an
//! [`EventBus`] backed by `tokio::sync::broadcast`. Events are emitted once
//! per query, however many sessions share it.

use std::fmt;

use tokio::sync::broadcast;

use crate::error::PollError;
use crate::tracker::StatusChange;

// ---------------------------------------------------------------------------
// QueryKey
// ---------------------------------------------------------------------------

/// What a query polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetKind {
    /// A single execution.
    Execution,
    /// Every execution of a document.
    Document,
}

impl TargetKind {
    /// Lowercase name used in logs and keys.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Execution => "execution",
            Self::Document => "document",
        }
    }
}

/// Identity of a shared polling query.
///
/// Sessions with equal keys share one cache entry and one fetch loop. The
/// tenant is part of the key so data never crosses tenants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    /// What is polled.
    pub kind: TargetKind,
    /// The tenant the data belongs to.
    pub tenant_id: String,
    /// Execution or document id.
    pub id: String,
}

impl QueryKey {
    /// Create a key.
    pub fn new(kind: TargetKind, tenant_id: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind,
            tenant_id: tenant_id.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind.as_str(), self.tenant_id, self.id)
    }
}

// ---------------------------------------------------------------------------
// StopReason
// ---------------------------------------------------------------------------

/// Why a query stopped polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// The execution reached a final status.
    Final,
    /// No execution in the document list is active.
    Inactive,
    /// `stop_polling` was called.
    Manual,
    /// Fetching failed for good; see the snapshot's error.
    Failed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Final => "final",
            Self::Inactive => "inactive",
            Self::Manual => "manual",
            Self::Failed => "failed",
        })
    }
}

// ---------------------------------------------------------------------------
// StatusEvent
// ---------------------------------------------------------------------------

/// Events emitted by polling queries.
///
/// All variants carry the [`QueryKey`] of the query that produced them.
/// Subscribers receive cloned copies via [`EventBus::subscribe`].
#[derive(Debug, Clone)]
pub enum StatusEvent {
    /// An execution changed status.
    StatusChanged {
        /// The query that observed the change.
        key: QueryKey,
        /// The transition.
        change: StatusChange,
    },
    /// A query stopped scheduling fetches.
    PollingStopped {
        /// The query.
        key: QueryKey,
        /// Why it stopped.
        reason: StopReason,
    },
    /// A query gave up after its retry budget was spent.
    PollingFailed {
        /// The query.
        key: QueryKey,
        /// The terminal error.
        error: PollError,
    },
}

impl StatusEvent {
    /// The query that produced this event.
    pub fn key(&self) -> &QueryKey {
        match self {
            Self::StatusChanged { key, .. }
            | Self::PollingStopped { key, .. }
            | Self::PollingFailed { key, .. } => key,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Broadcast-based event bus for polling events.
///
/// Emission is fire-and-forget: if no subscribers are listening or the
/// channel is full, events are dropped without slowing the emitter.
pub struct EventBus {
    sender: broadcast::Sender<StatusEvent>,
}

impl EventBus {
    /// Create a new event bus with the given buffer size.
    ///
    /// Subscribers that fall more than `buffer_size` events behind receive a
    /// `Lagged` error and skip to the latest event.
    #[must_use]
    pub fn new(buffer_size: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer_size);
        Self { sender }
    }

    /// Emit an event to all current subscribers.
    pub fn emit(&self, event: StatusEvent) {
        // No receivers is not an error.
        let _ = self.sender.send(event);
    }

    /// Subscribe to events emitted after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}
