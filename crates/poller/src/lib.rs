#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # execwatch poller
//!
//! Tracks long-running executions by polling their status:
//!
//! - [`Poller`]: the hub; opens sessions and owns the shared query cache
//! - [`Session`]: one collaborator's handle, with `start_polling`,
//!   `stop_polling` and `invalidate`
//! - [`TransitionTracker`]: reports each status change exactly once, never
//!   on the first observation
//! - [`PollSchedule`] and [`RetryPolicy`]: when to fetch next, when to stop
//!   and how to back off after failures
//! - [`EventBus`]: typed [`StatusEvent`]s for subscribers that are not tied
//!   to a session
//!
//! ## Quick start
//!
//! ```rust,ignore
//! let poller = Poller::new(Arc::new(HttpStatusFetcher::new(&ClientConfig::default())?), PollerConfig::default())?;
//! let mut session = poller.watch_execution(
//!     &ctx,
//!     "ex-42",
//!     SessionOptions::new().on_status_change(|change| {
//!         println!("{} -> {}", change.prior, change.next);
//!         Ok(())
//!     }),
//! );
//! session.wait_until(|s| !s.is_polling()).await;
//! ```

pub mod backoff;
pub mod config;
pub mod error;
pub mod event;
pub mod listener;
pub mod poller;
pub mod query;
pub mod schedule;
pub mod session;
pub mod target;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod tracker;

pub use backoff::RetryPolicy;
pub use config::PollerConfig;
pub use error::{ConfigError, ListenerError, PollError, Result};
pub use event::{EventBus, QueryKey, StatusEvent, StopReason, TargetKind};
pub use listener::{SharedListener, StatusListener};
pub use poller::Poller;
pub use query::{PollPhase, QuerySnapshot};
pub use schedule::PollSchedule;
pub use session::{DocumentSession, ExecutionSession, Session, SessionId, SessionOptions};
pub use target::{DocumentTarget, ExecutionTarget, PollTarget};
pub use tracker::{StatusChange, TrackedExecutionSet, TransitionTracker};
