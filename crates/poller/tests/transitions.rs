//! Transition notifications delivered to session listeners.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use rstest::rstest;

use execwatch_client::RequestContext;
use execwatch_poller::testing::ScriptedFetcher;
use execwatch_poller::{
    ListenerError, Poller, PollerConfig, SessionOptions, StatusChange, StatusEvent, StopReason,
};
use execwatch_status::ExecutionStatus;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ctx() -> RequestContext {
    RequestContext::parse("http://localhost/api", "org-1").unwrap()
}

#[derive(Clone, Default)]
struct Recorder {
    seen: Arc<Mutex<Vec<(String, String)>>>,
}

impl Recorder {
    fn options(&self) -> SessionOptions {
        let seen = Arc::clone(&self.seen);
        SessionOptions::new().on_status_change(move |change: &StatusChange| {
            seen.lock()
                .push((change.prior.to_string(), change.next.to_string()));
            Ok(())
        })
    }

    fn seen(&self) -> Vec<(String, String)> {
        self.seen.lock().clone()
    }
}

fn pair(prior: &str, next: &str) -> (String, String) {
    (prior.to_owned(), next.to_owned())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[rstest]
#[case("pending")]
#[case("running")]
#[case("paused")]
#[case("completed")]
#[case("failed")]
#[case("brand-new-state")]
#[tokio::test(start_paused = true)]
async fn first_observation_never_notifies(#[case] status: &str) {
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.script_statuses("ex-1", &[status]);
    let poller = Poller::new(fetcher.clone(), PollerConfig::default()).unwrap();
    let recorder = Recorder::default();

    let mut session = poller.watch_execution(&ctx(), "ex-1", recorder.options());
    session.wait_until(|s| s.fetch_count >= 1).await.unwrap();
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert!(fetcher.calls_for("ex-1") >= 1);
    assert_eq!(session.status(), Some(ExecutionStatus::from(status)));
    assert!(recorder.seen().is_empty());
}

#[tokio::test(start_paused = true)]
async fn notifies_exactly_once_per_change() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.script_statuses(
        "ex-1",
        &["pending", "pending", "running", "running", "completed"],
    );
    let poller = Poller::new(fetcher.clone(), PollerConfig::default()).unwrap();
    let recorder = Recorder::default();

    let mut session = poller.watch_execution(&ctx(), "ex-1", recorder.options());
    let snapshot = session
        .wait_until(|s| s.stop_reason().is_some())
        .await
        .unwrap();

    assert_eq!(snapshot.stop_reason(), Some(StopReason::Final));
    assert_eq!(snapshot.fetch_count, 5);
    assert_eq!(
        recorder.seen(),
        vec![pair("pending", "running"), pair("running", "completed")]
    );
}

#[tokio::test(start_paused = true)]
async fn failing_listener_does_not_stop_polling() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.script_statuses("ex-1", &["queued", "running", "failed"]);
    let poller = Poller::new(fetcher.clone(), PollerConfig::default()).unwrap();
    let recorder = Recorder::default();

    let options = recorder
        .options()
        .on_status_change(|_| Err(ListenerError::new("toast queue full")));
    let mut session = poller.watch_execution(&ctx(), "ex-1", options);
    session
        .wait_until(|s| s.stop_reason().is_some())
        .await
        .unwrap();

    assert_eq!(fetcher.calls_for("ex-1"), 3);
    assert_eq!(session.status(), Some(ExecutionStatus::Failed));
    assert_eq!(
        recorder.seen(),
        vec![pair("queued", "running"), pair("running", "failed")]
    );
}

#[tokio::test(start_paused = true)]
async fn panicking_listener_does_not_kill_the_query() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.script_statuses("ex-1", &["queued", "running", "running", "completed"]);
    let poller = Poller::new(fetcher.clone(), PollerConfig::default()).unwrap();
    let recorder = Recorder::default();

    let options = recorder
        .options()
        .on_status_change(|change| -> Result<(), ListenerError> {
            panic!("toast renderer crashed on {}", change.next)
        });
    let mut session = poller.watch_execution(&ctx(), "ex-1", options);
    let snapshot = session
        .wait_until(|s| s.stop_reason().is_some())
        .await
        .unwrap();

    assert_eq!(snapshot.stop_reason(), Some(StopReason::Final));
    assert!(snapshot.error.is_none());
    assert!(!session.is_polling());
    assert_eq!(fetcher.calls_for("ex-1"), 4);
    assert_eq!(session.status(), Some(ExecutionStatus::Completed));
    assert_eq!(
        recorder.seen(),
        vec![pair("queued", "running"), pair("running", "completed")]
    );
}

#[tokio::test(start_paused = true)]
async fn late_session_tracks_from_cached_status() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.script_statuses("ex-1", &["pending", "running"]);
    let poller = Poller::new(fetcher.clone(), PollerConfig::default()).unwrap();

    let early = Recorder::default();
    let late = Recorder::default();
    let mut first = poller.watch_execution(&ctx(), "ex-1", early.options());
    first.wait_until(|s| s.fetch_count == 1).await.unwrap();

    // Joins while the cache holds "pending".
    let mut second = poller.watch_execution(&ctx(), "ex-1", late.options());
    second.wait_until(|s| s.fetch_count == 2).await.unwrap();

    assert_eq!(early.seen(), vec![pair("pending", "running")]);
    assert_eq!(late.seen(), vec![pair("pending", "running")]);
    assert_eq!(fetcher.calls_for("ex-1"), 2);
}

#[tokio::test(start_paused = true)]
async fn events_are_emitted_once_per_query() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.script_statuses("ex-1", &["running", "completed"]);
    let poller = Poller::new(fetcher.clone(), PollerConfig::default()).unwrap();
    let mut events = poller.subscribe();

    let mut a = poller.watch_execution(&ctx(), "ex-1", SessionOptions::new());
    let _b = poller.watch_execution(&ctx(), "ex-1", SessionOptions::new());
    a.wait_until(|s| s.stop_reason().is_some()).await.unwrap();

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    assert_eq!(received.len(), 2);
    assert!(matches!(
        &received[0],
        StatusEvent::StatusChanged { change, .. }
            if change.prior == ExecutionStatus::Running && change.next == ExecutionStatus::Completed
    ));
    assert!(matches!(
        &received[1],
        StatusEvent::PollingStopped { reason: StopReason::Final, key } if key.id == "ex-1"
    ));
}

#[tokio::test(start_paused = true)]
async fn unrecognized_status_keeps_polling_and_displays() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.script_statuses("ex-1", &["rehydrating"]);
    let poller = Poller::new(fetcher.clone(), PollerConfig::default()).unwrap();

    let mut session = poller.watch_execution(&ctx(), "ex-1", SessionOptions::new());
    session.wait_until(|s| s.fetch_count >= 3).await.unwrap();

    assert!(session.is_polling());
    assert!(session.should_display());
    let descriptor = session.descriptor().unwrap();
    assert_eq!(descriptor, execwatch_status::classify_str("rehydrating"));
}

#[tokio::test(start_paused = true)]
async fn completed_execution_hides_display() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.script_statuses("ex-1", &["running", "approved"]);
    let poller = Poller::new(fetcher.clone(), PollerConfig::default()).unwrap();

    let mut session = poller.watch_execution(&ctx(), "ex-1", SessionOptions::new());
    session.wait_until(|s| s.fetch_count == 1).await.unwrap();
    assert!(session.should_display());

    session
        .wait_until(|s| s.stop_reason().is_some())
        .await
        .unwrap();
    assert!(!session.should_display());
    assert_eq!(session.record().unwrap().id, "ex-1");
}
