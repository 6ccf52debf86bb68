//! Streaming surface: lazy open-on-first-pull, close-on-exhaustion and
//! close-on-drop, graceful cancellation, realtime polling, and the blocking
//! iterator facade.

use futures_util::StreamExt;
use jv_test_utils::{ScriptedClient, StubHandle};
use jvlink_core::error::JvLinkError;
use jvlink_core::{JvLink, JvLinkConfig, OpenRequest, Payload, SessionPolicy, blocking};
use std::time::Duration;
use tokio::sync::watch;

fn quick_policy() -> SessionPolicy {
    SessionPolicy {
        call_timeout: Duration::from_secs(5),
        retry_backoff: Duration::from_millis(10),
        download_pending_delay: Duration::from_millis(10),
        poll_interval: Duration::from_millis(20),
        join_timeout: Duration::from_secs(1),
        ..SessionPolicy::default()
    }
}

fn scripted_session() -> (JvLink<ScriptedClient>, StubHandle) {
    let (client, handle) = ScriptedClient::new();
    let config = JvLinkConfig::new("test-suite/1.0").unwrap();
    let session = JvLink::with_policy(config, quick_policy(), move || Ok(client)).unwrap();
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

async fn drain<C: jvlink_core::JvLinkClient>(
    stream: &mut jvlink_core::PayloadStream<C>,
) -> (Vec<Payload>, Vec<JvLinkError>) {
    let mut payloads = Vec::new();
    let mut errors = Vec::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(payload) => payloads.push(payload),
            Err(err) => errors.push(err),
        }
    }
    (payloads, errors)
}

// ---------------------------------------------------------------------------
// Async streaming
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stream_is_lazy_and_closes_on_exhaustion() {
    let (session, handle) = scripted_session();
    handle.queue_payload(b"A");
    handle.queue_payload(b"B");
    handle.queue_end_of_stream();

    let mut stream = session.stream(race_request());
    // Nothing has touched the native layer yet.
    assert_eq!(handle.open_calls(), 0);

    let (payloads, errors) = drain(&mut stream).await;
    assert!(errors.is_empty());
    let data: Vec<&[u8]> = payloads.iter().map(|p| p.data.as_slice()).collect();
    assert_eq!(data, [b"A".as_slice(), b"B".as_slice()]);
    assert_eq!(handle.open_calls(), 1);
    assert_eq!(handle.close_calls(), 1);

    // The gate is released: the session is reusable.
    handle.queue_payload(b"C");
    handle.queue_end_of_stream();
    assert_eq!(session.fetch_all(race_request()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn dropping_a_stream_mid_drain_closes_the_session() {
    let (session, handle) = scripted_session();
    handle.queue_payload(b"A");
    handle.queue_payload(b"B");
    handle.queue_end_of_stream();

    let mut stream = session.stream(race_request());
    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.data, b"A");
    drop(stream);

    // The detached close runs on the worker; give it a beat.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(handle.close_calls(), 1);

    // Gate released after drop: a fresh operation proceeds and picks up the
    // reads the dropped stream never consumed.
    let leftover = session.fetch_all(race_request()).await.unwrap();
    assert_eq!(leftover.len(), 1);
    assert_eq!(leftover[0].data, b"B");
}

#[tokio::test]
async fn cancellation_during_download_pending_terminates_gracefully() {
    let (session, handle) = scripted_session();
    // A long pending run with no payload behind it.
    handle.queue_download_pending(10_000);

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let mut stream = session.stream_cancellable(race_request(), Duration::from_millis(10), cancel_rx);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(60)).await;
        let _ = cancel_tx.send(true);
    });

    let (payloads, errors) = drain(&mut stream).await;
    // Graceful: no payloads, no error items, session closed.
    assert!(payloads.is_empty());
    assert!(errors.is_empty());
    assert_eq!(handle.close_calls(), 1);
}

#[tokio::test]
async fn stream_yields_error_items_for_fatal_failures() {
    let (session, handle) = scripted_session();
    handle.queue_payload(b"ok");
    handle.queue_read_failure(-401);

    let mut stream = session.stream(race_request());
    let (payloads, errors) = drain(&mut stream).await;
    assert_eq!(payloads.len(), 1);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code(), Some(-401));
    assert_eq!(handle.close_calls(), 1);
}

#[tokio::test]
async fn empty_open_yields_an_empty_stream() {
    let (session, handle) = scripted_session();
    let mut stream = session.stream(race_request());
    assert!(stream.next().await.is_none());
    assert_eq!(handle.open_calls(), 1);
    assert_eq!(handle.close_calls(), 1);
}

#[tokio::test]
async fn into_stream_adapts_to_futures() {
    let (session, handle) = scripted_session();
    handle.queue_payload(b"A");
    handle.queue_payload(b"B");
    handle.queue_end_of_stream();

    let collected: Vec<_> = session
        .stream(race_request())
        .into_stream()
        .collect()
        .await;
    assert_eq!(collected.len(), 2);
    assert!(collected.iter().all(Result::is_ok));
}

// ---------------------------------------------------------------------------
// Realtime streaming
// ---------------------------------------------------------------------------

#[tokio::test]
async fn realtime_stream_drains_one_snapshot() {
    let (session, handle) = scripted_session();
    handle.queue_payload(b"odds");
    handle.queue_end_of_stream();

    let mut stream = session.stream_realtime("0B31", "2024050505030211");
    let (payloads, errors) = drain(&mut stream).await;
    assert_eq!(payloads.len(), 1);
    assert!(errors.is_empty());
    assert_eq!(
        handle.realtime_opens(),
        [("0B31".to_owned(), "2024050505030211".to_owned())]
    );
    assert_eq!(handle.close_calls(), 1);
}

#[tokio::test]
async fn realtime_cancellable_polls_until_cancelled() {
    let (session, handle) = scripted_session();
    handle.queue_payload(b"snapshot");
    handle.queue_end_of_stream();

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let mut stream = session.stream_realtime_cancellable(
        "0B31",
        "2024050505030211",
        Duration::from_millis(10),
        cancel_rx,
    );

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.data, b"snapshot");

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(80)).await;
        let _ = cancel_tx.send(true);
    });

    // The stream idles at end-of-stream, polling, until the cancel lands.
    assert!(stream.next().await.is_none());
    // Idle polling re-read past the scripted queue more than once.
    assert!(handle.read_calls() > 2);
    assert_eq!(handle.close_calls(), 1);
}

// ---------------------------------------------------------------------------
// Blocking facade
// ---------------------------------------------------------------------------

#[test]
fn blocking_fetch_and_iterator_match_the_async_surface() {
    let (client, handle) = ScriptedClient::new();
    let config = JvLinkConfig::new("test-suite/1.0").unwrap();
    let session = blocking::JvLink::with_policy(config, quick_policy(), move || Ok(client)).unwrap();

    handle.queue_payload(b"A");
    handle.queue_payload(b"B");
    handle.queue_end_of_stream();
    let eager = session.fetch_all(race_request()).unwrap();
    assert_eq!(eager.len(), 2);

    handle.queue_payload(b"A");
    handle.queue_payload(b"B");
    handle.queue_end_of_stream();
    let lazy: Vec<_> = session
        .stream(race_request())
        .map(Result::unwrap)
        .collect();
    // Observationally identical sequences from both surfaces.
    assert_eq!(
        eager.iter().map(|p| &p.data).collect::<Vec<_>>(),
        lazy.iter().map(|p| &p.data).collect::<Vec<_>>()
    );
    assert_eq!(handle.close_calls(), 2);
}

#[test]
fn blocking_iterator_drop_closes_the_session() {
    let (client, handle) = ScriptedClient::new();
    let config = JvLinkConfig::new("test-suite/1.0").unwrap();
    let session = blocking::JvLink::with_policy(config, quick_policy(), move || Ok(client)).unwrap();

    handle.queue_payload(b"A");
    handle.queue_payload(b"B");
    handle.queue_end_of_stream();

    let mut iter = session.stream(race_request());
    assert!(iter.next().is_some());
    drop(iter);

    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(handle.close_calls(), 1);

    // Session still usable afterwards; the unread tail is still queued.
    let leftover = session.fetch_all(race_request()).unwrap();
    assert_eq!(leftover.len(), 1);
    assert_eq!(leftover[0].data, b"B");
}
