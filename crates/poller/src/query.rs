//! Shared polling queries.
//!
//! A [`Query`] is the cache entry for one [`QueryKey`]: the latest snapshot,
//! the sessions observing it and the single task that fetches for it. Every
//! fetch for a key happens on that task, so fetches never overlap and
//! observations arrive in order.
//!
//! The task is a small state machine driven by four inputs:
//!
//! - the timer armed after each fetch (next interval or retry delay)
//! - session commands (`Start`, `Stop`, `Invalidate`), coalesced when several
//!   are queued
//! - a session joining with a shorter interval, which pulls the armed timer in
//! - cancellation, when the last session detaches or the poller shuts down

use std::sync::Arc;
use std::time::Duration;

use execwatch_client::{FetchError, RequestContext, StatusFetcher};
use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::backoff::RetryPolicy;
use crate::error::PollError;
use crate::event::{EventBus, QueryKey, StatusEvent, StopReason};
use crate::listener::{self, SharedListener};
use crate::session::SessionId;
use crate::target::PollTarget;
use crate::tracker::StatusChange;

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Where a query is in its fetch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    /// Nothing fetched and nothing scheduled.
    Idle,
    /// A fetch is in flight.
    Fetching,
    /// The next regular fetch is due after this interval.
    Scheduled(Duration),
    /// A fetch failed; retry number `attempt` is due after `delay`.
    Retrying {
        /// 1-based retry number.
        attempt: u32,
        /// Backoff delay before the retry.
        delay: Duration,
    },
    /// No fetch is scheduled until the query is restarted.
    Stopped(StopReason),
}

impl PollPhase {
    /// Whether a fetch is in flight or scheduled.
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            Self::Fetching | Self::Scheduled(_) | Self::Retrying { .. }
        )
    }
}

/// The state of a query as seen by its sessions.
#[derive(Debug, Clone)]
pub struct QuerySnapshot<T> {
    /// Data from the last successful fetch.
    pub data: Option<T>,
    /// Terminal error, set once the retry budget is spent. Failures that
    /// are still being retried leave this `None`.
    pub error: Option<PollError>,
    /// Current phase.
    pub phase: PollPhase,
    /// Successful fetches so far.
    pub fetch_count: u64,
    /// Failed fetches since the last success.
    pub consecutive_failures: u32,
}

impl<T> Default for QuerySnapshot<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            phase: PollPhase::Idle,
            fetch_count: 0,
            consecutive_failures: 0,
        }
    }
}

impl<T> QuerySnapshot<T> {
    /// Whether a fetch is in flight or scheduled.
    pub fn is_polling(&self) -> bool {
        self.phase.is_active()
    }

    /// The stop reason, if the query is stopped.
    pub fn stop_reason(&self) -> Option<StopReason> {
        match self.phase {
            PollPhase::Stopped(reason) => Some(reason),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Session requests to the query task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    /// Resume a stopped query with an immediate fetch.
    Start,
    /// Stop scheduling fetches.
    Stop,
    /// Fetch now, outside the regular cadence.
    Invalidate,
}

impl Command {
    /// Fold a later command into this one.
    fn then(self, next: Self) -> Self {
        match (self, next) {
            (_, Self::Stop) => Self::Stop,
            (Self::Invalidate, Self::Start) => Self::Invalidate,
            (_, next) => next,
        }
    }
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// Dependencies every query task needs.
pub(crate) struct Shared {
    pub(crate) fetcher: Arc<dyn StatusFetcher>,
    pub(crate) retry: RetryPolicy,
    pub(crate) events: Arc<EventBus>,
}

/// One session's attachment to a query.
pub(crate) struct Slot<T: PollTarget> {
    session: SessionId,
    interval: Option<Duration>,
    listeners: Vec<SharedListener>,
    cancel: CancellationToken,
    tracker: T::Tracker,
}

impl<T: PollTarget> Slot<T> {
    pub(crate) fn new(
        session: SessionId,
        interval: Option<Duration>,
        listeners: Vec<SharedListener>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            session,
            interval,
            listeners,
            cancel,
            tracker: T::Tracker::default(),
        }
    }
}

struct Observers<T: PollTarget> {
    slots: Vec<Slot<T>>,
    closed: bool,
    /// Query-level tracker feeding the event bus.
    tracker: T::Tracker,
}

impl<T: PollTarget> Observers<T> {
    fn effective_interval(&self, default: Duration) -> Duration {
        self.slots
            .iter()
            .map(|slot| slot.interval.unwrap_or(default))
            .min()
            .unwrap_or(default)
    }
}

/// Changes to hand to one session's listeners.
struct Delivery {
    cancel: CancellationToken,
    listeners: Vec<SharedListener>,
    changes: Vec<StatusChange>,
}

/// The shared cache entry for one key.
pub(crate) struct Query<T: PollTarget> {
    key: QueryKey,
    snapshot: watch::Sender<QuerySnapshot<T::Output>>,
    commands: mpsc::UnboundedSender<Command>,
    /// Signalled when a session attaches.
    attached: Notify,
    cancel: CancellationToken,
    default_interval: Duration,
    observers: Mutex<Observers<T>>,
}

impl<T: PollTarget> Query<T> {
    /// Create the query and spawn its task. The first fetch is immediate.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub(crate) fn spawn(
        key: QueryKey,
        target: T,
        ctx: RequestContext,
        shared: Arc<Shared>,
        cancel: CancellationToken,
        default_interval: Duration,
    ) -> Arc<Self> {
        let (snapshot, _) = watch::channel(QuerySnapshot {
            phase: PollPhase::Fetching,
            ..QuerySnapshot::default()
        });
        let (commands, rx) = mpsc::unbounded_channel();
        let query = Arc::new(Self {
            key,
            snapshot,
            commands,
            attached: Notify::new(),
            cancel,
            default_interval,
            observers: Mutex::new(Observers {
                slots: Vec::new(),
                closed: false,
                tracker: T::Tracker::default(),
            }),
        });

        let span = tracing::debug_span!(
            "poll",
            query = %query.key,
            tenant_id = %query.key.tenant_id,
        );
        let driver = Driver {
            query: Arc::clone(&query),
            target,
            ctx,
            shared,
            commands: rx,
            failures: 0,
            last_success: None,
        };
        tokio::spawn(driver.run().instrument(span));
        query
    }

    pub(crate) fn key(&self) -> &QueryKey {
        &self.key
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<QuerySnapshot<T::Output>> {
        self.snapshot.subscribe()
    }

    /// Add a session. Hands the slot back if the query already shut down.
    ///
    /// The slot's tracker is seeded with cached data, so the session's first
    /// observation produces no change. A shorter interval than the query's
    /// current one takes effect on the armed timer.
    pub(crate) fn attach(&self, mut slot: Slot<T>) -> Result<(), Slot<T>> {
        let mut observers = self.observers.lock();
        if observers.closed {
            return Err(slot);
        }
        if let Some(data) = &self.snapshot.borrow().data {
            T::observe(&mut slot.tracker, data);
        }
        observers.slots.push(slot);
        drop(observers);
        self.attached.notify_one();
        Ok(())
    }

    /// Remove a session. Returns `true` when it was the last one; the query
    /// then accepts no further sessions.
    pub(crate) fn detach(&self, session: SessionId) -> bool {
        let mut observers = self.observers.lock();
        observers.slots.retain(|slot| slot.session != session);
        if observers.slots.is_empty() {
            observers.closed = true;
        }
        observers.closed
    }

    pub(crate) fn send(&self, command: Command) {
        // The task is gone only after cancellation.
        let _ = self.commands.send(command);
    }

    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    #[cfg(test)]
    pub(crate) fn observer_count(&self) -> usize {
        self.observers.lock().slots.len()
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

enum Wake {
    Due,
    Command(Command),
    Attached,
    Shutdown,
}

struct Driver<T: PollTarget> {
    query: Arc<Query<T>>,
    target: T,
    ctx: RequestContext,
    shared: Arc<Shared>,
    commands: mpsc::UnboundedReceiver<Command>,
    failures: u32,
    /// When the last successful fetch completed.
    last_success: Option<Instant>,
}

impl<T: PollTarget> Driver<T> {
    async fn run(mut self) {
        tracing::debug!("query started");
        let mut next = Some(Instant::now());

        loop {
            let fetch_now = match self.wait(next).await {
                Wake::Shutdown => break,
                Wake::Due => true,
                Wake::Attached => {
                    self.rearm(&mut next);
                    false
                }
                Wake::Command(first) => {
                    let command = self.coalesce(first);
                    self.apply(command, &mut next)
                }
            };
            if !fetch_now {
                continue;
            }
            let Some(result) = self.fetch().await else {
                break;
            };
            next = match result {
                Ok(output) => self.on_success(output),
                Err(error) => self.on_failure(error),
            };
        }

        self.query.snapshot.send_if_modified(|snapshot| {
            let active = snapshot.phase.is_active();
            if active {
                snapshot.phase = PollPhase::Stopped(StopReason::Manual);
            }
            active
        });
        tracing::debug!("query ended");
    }

    async fn wait(&mut self, next: Option<Instant>) -> Wake {
        let due = async {
            match next {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            biased;
            () = self.query.cancel.cancelled() => Wake::Shutdown,
            command = self.commands.recv() => command.map_or(Wake::Shutdown, Wake::Command),
            () = due => Wake::Due,
            () = self.query.attached.notified() => Wake::Attached,
        }
    }

    /// Pull the scheduled fetch in when the effective interval shrank since
    /// it was armed. Retry delays and halted queries are left alone.
    fn rearm(&self, next: &mut Option<Instant>) {
        let (Some(due), Some(last)) = (*next, self.last_success) else {
            return;
        };
        if !matches!(self.query.snapshot.borrow().phase, PollPhase::Scheduled(_)) {
            return;
        }
        let interval = self
            .query
            .observers
            .lock()
            .effective_interval(self.query.default_interval);
        let rearmed = last + interval;
        if rearmed >= due {
            return;
        }
        tracing::debug!(interval_ms = millis(interval), "shorter interval, fetch rescheduled");
        *next = Some(rearmed);
        self.query
            .snapshot
            .send_modify(|snapshot| snapshot.phase = PollPhase::Scheduled(interval));
    }

    fn coalesce(&mut self, first: Command) -> Command {
        let mut command = first;
        while let Ok(next) = self.commands.try_recv() {
            command = command.then(next);
        }
        command
    }

    /// Apply a session command. Returns whether to fetch now.
    fn apply(&mut self, command: Command, next: &mut Option<Instant>) -> bool {
        let halted = next.is_none();
        match command {
            Command::Stop => {
                if !halted {
                    *next = None;
                    self.stop(StopReason::Manual);
                }
                false
            }
            Command::Start if !halted => false,
            Command::Start | Command::Invalidate => {
                if halted {
                    tracing::debug!(?command, "restarting polling");
                    self.failures = 0;
                    self.query.snapshot.send_modify(|snapshot| {
                        snapshot.error = None;
                        snapshot.consecutive_failures = 0;
                    });
                }
                true
            }
        }
    }

    /// One fetch. `None` when the query was torn down meanwhile; the
    /// response, if any, is dropped.
    async fn fetch(&mut self) -> Option<Result<T::Output, FetchError>> {
        self.query
            .snapshot
            .send_modify(|snapshot| snapshot.phase = PollPhase::Fetching);

        let result = tokio::select! {
            biased;
            () = self.query.cancel.cancelled() => return None,
            result = self.target.fetch(self.shared.fetcher.as_ref(), &self.ctx) => result,
        };
        if self.query.cancel.is_cancelled() {
            tracing::debug!("dropping response for torn down query");
            return None;
        }
        Some(result)
    }

    fn on_success(&mut self, output: T::Output) -> Option<Instant> {
        self.failures = 0;
        let now = Instant::now();
        self.last_success = Some(now);

        let (delay, changes, deliveries) = {
            let mut observers = self.query.observers.lock();
            let interval = observers.effective_interval(self.query.default_interval);
            let delay = T::SCHEDULE.next_delay(T::statuses(&output), interval);

            let changes = T::observe(&mut observers.tracker, &output);
            let deliveries: Vec<Delivery> = observers
                .slots
                .iter_mut()
                .filter_map(|slot| {
                    let changes = T::observe(&mut slot.tracker, &output);
                    (!changes.is_empty()).then(|| Delivery {
                        cancel: slot.cancel.clone(),
                        listeners: slot.listeners.clone(),
                        changes,
                    })
                })
                .collect();

            let phase = delay.map_or(
                PollPhase::Stopped(T::SCHEDULE.stop_reason()),
                PollPhase::Scheduled,
            );
            self.query.snapshot.send_modify(|snapshot| {
                snapshot.data = Some(output);
                snapshot.error = None;
                snapshot.phase = phase;
                snapshot.fetch_count += 1;
                snapshot.consecutive_failures = 0;
            });
            (delay, changes, deliveries)
        };

        for change in changes {
            tracing::info!(
                execution_id = %change.execution_id,
                prior = %change.prior,
                next = %change.next,
                "execution status changed"
            );
            self.shared.events.emit(StatusEvent::StatusChanged {
                key: self.query.key.clone(),
                change,
            });
        }

        match delay {
            Some(delay) => tracing::trace!(delay_ms = millis(delay), "next fetch scheduled"),
            None => self.stop(T::SCHEDULE.stop_reason()),
        }

        for delivery in deliveries {
            if delivery.cancel.is_cancelled() {
                continue;
            }
            listener::dispatch(&self.query.key, &delivery.listeners, &delivery.changes);
        }

        delay.map(|delay| now + delay)
    }

    fn on_failure(&mut self, error: FetchError) -> Option<Instant> {
        self.failures = self.failures.saturating_add(1);
        let attempts = self.failures;
        let retry = self.shared.retry;

        if error.is_retryable() && retry.allows_retry(attempts) {
            let delay = retry.delay(attempts - 1);
            tracing::warn!(
                attempt = attempts,
                delay_ms = millis(delay),
                %error,
                "fetch failed, retrying"
            );
            self.query.snapshot.send_modify(|snapshot| {
                snapshot.phase = PollPhase::Retrying {
                    attempt: attempts,
                    delay,
                };
                snapshot.consecutive_failures = attempts;
            });
            return Some(Instant::now() + delay);
        }

        let error = if error.is_retryable() {
            PollError::MaxRetriesExceeded {
                attempts,
                last: Arc::new(error),
            }
        } else {
            PollError::Rejected(Arc::new(error))
        };
        tracing::error!(attempts, %error, "polling failed");
        self.query.snapshot.send_modify(|snapshot| {
            snapshot.error = Some(error.clone());
            snapshot.phase = PollPhase::Stopped(StopReason::Failed);
            snapshot.consecutive_failures = attempts;
        });
        self.shared.events.emit(StatusEvent::PollingFailed {
            key: self.query.key.clone(),
            error,
        });
        None
    }

    fn stop(&self, reason: StopReason) {
        tracing::debug!(%reason, "polling stopped");
        self.query
            .snapshot
            .send_modify(|snapshot| snapshot.phase = PollPhase::Stopped(reason));
        self.shared.events.emit(StatusEvent::PollingStopped {
            key: self.query.key.clone(),
            reason,
        });
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[Command::Invalidate, Command::Invalidate], Command::Invalidate)]
    #[case(&[Command::Invalidate, Command::Start], Command::Invalidate)]
    #[case(&[Command::Start, Command::Invalidate], Command::Invalidate)]
    #[case(&[Command::Invalidate, Command::Stop], Command::Stop)]
    #[case(&[Command::Stop, Command::Start], Command::Start)]
    #[case(&[Command::Start, Command::Stop, Command::Invalidate], Command::Invalidate)]
    fn commands_coalesce(#[case] queued: &[Command], #[case] expected: Command) {
        let folded = queued[1..]
            .iter()
            .fold(queued[0], |acc, next| acc.then(*next));
        assert_eq!(folded, expected);
    }

    #[test]
    fn snapshot_defaults_to_idle() {
        let snapshot = QuerySnapshot::<()>::default();
        assert!(!snapshot.is_polling());
        assert_eq!(snapshot.stop_reason(), None);
    }

    #[test]
    fn active_phases() {
        assert!(PollPhase::Fetching.is_active());
        assert!(PollPhase::Scheduled(Duration::from_secs(1)).is_active());
        assert!(
            PollPhase::Retrying {
                attempt: 1,
                delay: Duration::from_secs(1)
            }
            .is_active()
        );
        assert!(!PollPhase::Stopped(StopReason::Final).is_active());
        assert!(!PollPhase::Idle.is_active());
    }
}
