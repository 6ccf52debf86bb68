//! Timeout poisoning: a dispatched call that exceeds its timeout marks the
//! session unusable, every later call rejects with the synthetic `-999`
//! code, and teardown never waits on the wedged worker.

use jv_test_utils::{ScriptedClient, StubHandle};
use jvlink_core::error::TIMEOUT_CODE;
use jvlink_core::{JvLink, JvLinkConfig, OpenRequest, SessionPolicy, SessionState};
use std::time::{Duration, Instant};

fn impatient_policy() -> SessionPolicy {
    SessionPolicy {
        call_timeout: Duration::from_millis(10),
        join_timeout: Duration::from_secs(1),
        ..SessionPolicy::default()
    }
}

fn scripted_session() -> (JvLink<ScriptedClient>, StubHandle) {
    let (client, handle) = ScriptedClient::new();
    let config = JvLinkConfig::new("test-suite/1.0").unwrap();
    let session = JvLink::with_policy(config, impatient_policy(), move || Ok(client)).unwrap();
    (session, handle)
}

fn race_request() -> OpenRequest {
    OpenRequest::new(
        "RACE",
        chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap(),
        1,
    )
}

#[tokio::test]
async fn timed_out_open_poisons_the_session() {
    let (session, handle) = scripted_session();
    handle.set_open_delay(Duration::from_millis(100));
    handle.queue_payload(b"never delivered");

    let err = session.fetch_all(race_request()).await.unwrap_err();
    assert_eq!(err.code(), Some(TIMEOUT_CODE));
    assert!(session.is_poisoned());
    assert!(session.poison_reason().unwrap().contains("open"));

    // Subsequent operations reject immediately, without touching the worker.
    let started = Instant::now();
    let err = session.get_status().await.unwrap_err();
    assert_eq!(err.code(), Some(TIMEOUT_CODE));
    assert!(started.elapsed() < Duration::from_millis(50));

    // Streams reject the same way.
    let mut stream = session.stream(race_request());
    let item = stream.next().await.unwrap();
    assert_eq!(item.unwrap_err().code(), Some(TIMEOUT_CODE));

    // Watch events are refused too.
    let err = session.start_watch_events().await.unwrap_err();
    assert_eq!(err.code(), Some(TIMEOUT_CODE));
}

#[tokio::test]
async fn poisoned_dispose_does_not_hang() {
    let (session, handle) = scripted_session();
    // Long enough that a join would be felt, short enough that the worker
    // thread does not outlive the test binary by much.
    handle.set_open_delay(Duration::from_millis(500));
    handle.queue_payload(b"x");

    let err = session.fetch_all(race_request()).await.unwrap_err();
    assert_eq!(err.code(), Some(TIMEOUT_CODE));

    let started = Instant::now();
    drop(session);
    // Abandoned teardown: no join on the wedged worker.
    assert!(started.elapsed() < Duration::from_millis(100));
}

#[tokio::test]
async fn poisoned_fetch_does_not_dispatch_close_through_the_worker() {
    let (session, handle) = scripted_session();
    handle.queue_payload(b"ok");
    handle.set_open_delay(Duration::from_millis(100));

    let err = session.fetch_all(race_request()).await.unwrap_err();
    assert_eq!(err.code(), Some(TIMEOUT_CODE));
    // The worker may still be wedged inside open; the orchestrator must not
    // queue a close behind it.
    assert_eq!(handle.close_calls(), 0);
    assert_ne!(session.session_state(), SessionState::Closed);
}
