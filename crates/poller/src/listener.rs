//! Status change listeners.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::error::ListenerError;
use crate::event::QueryKey;
use crate::tracker::StatusChange;

/// Receives status transitions for one session.
///
/// Listeners run on the polling task right after the snapshot is published.
/// A returned error or a panic is logged; neither stops polling nor rolls
/// back the transition.
pub trait StatusListener: Send + Sync {
    /// Called once per observed transition.
    fn on_status_change(&self, change: &StatusChange) -> Result<(), ListenerError>;
}

impl<F> StatusListener for F
where
    F: Fn(&StatusChange) -> Result<(), ListenerError> + Send + Sync,
{
    fn on_status_change(&self, change: &StatusChange) -> Result<(), ListenerError> {
        self(change)
    }
}

/// Shared handle to a listener.
pub type SharedListener = Arc<dyn StatusListener>;

/// Deliver `changes` to every listener, logging failures and panics.
pub(crate) fn dispatch(key: &QueryKey, listeners: &[SharedListener], changes: &[StatusChange]) {
    for change in changes {
        for listener in listeners {
            let outcome = catch_unwind(AssertUnwindSafe(|| listener.on_status_change(change)));
            let error = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(error)) => error.to_string(),
                Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
            };
            tracing::warn!(
                query = %key,
                execution_id = %change.execution_id,
                prior = %change.prior,
                next = %change.next,
                %error,
                "status listener failed"
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string payload")
}
