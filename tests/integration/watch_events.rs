//! Watch-event pump end to end: callback keys in, parsed events out, FIFO
//! order, idempotent start, overflow accounting, and restartability.

use jv_test_utils::{ScriptedClient, StubHandle};
use jvdata_core::watch::WatchEventKind;
use jvlink_core::error::JvLinkError;
use jvlink_core::{EventItem, JvLink, JvLinkConfig, SessionPolicy};
use std::time::Duration;
use tokio::sync::broadcast;

fn policy_with_capacity(capacity: usize) -> SessionPolicy {
    SessionPolicy {
        call_timeout: Duration::from_secs(5),
        join_timeout: Duration::from_secs(1),
        event_queue_capacity: capacity,
        ..SessionPolicy::default()
    }
}

fn scripted_session(capacity: usize) -> (JvLink<ScriptedClient>, StubHandle) {
    let (client, handle) = ScriptedClient::new();
    let config = JvLinkConfig::new("test-suite/1.0").unwrap();
    let session =
        JvLink::with_policy(config, policy_with_capacity(capacity), move || Ok(client)).unwrap();
    (session, handle)
}

async fn recv_item(rx: &mut broadcast::Receiver<EventItem>) -> EventItem {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for a watch event")
        .expect("event channel closed")
}

#[tokio::test]
async fn keys_arrive_as_parsed_events_in_callback_order() {
    let (session, handle) = scripted_session(10_000);
    let mut rx = session.watch_events();

    assert!(session.start_watch_events().await.unwrap());
    assert!(handle.watch_registered());

    handle.emit_watch_key("0B11202401010511");
    handle.emit_watch_key("0B12202401010511");
    handle.emit_watch_key("0B16202401010511JC");

    let first = recv_item(&mut rx).await.unwrap();
    let second = recv_item(&mut rx).await.unwrap();
    let third = recv_item(&mut rx).await.unwrap();
    assert_eq!(first.kind, WatchEventKind::HorseWeight);
    assert_eq!(second.kind, WatchEventKind::PayoffConfirmed);
    assert_eq!(third.kind, WatchEventKind::JockeyChange);
    assert!(third.timestamp.is_some());

    session.stop_watch_events().await.unwrap();
    assert!(!handle.watch_registered());
}

#[tokio::test]
async fn second_start_is_a_no_op() {
    let (session, handle) = scripted_session(16);
    assert!(session.start_watch_events().await.unwrap());
    assert!(!session.start_watch_events().await.unwrap());

    // The pump still works after the redundant start.
    let mut rx = session.watch_events();
    handle.emit_watch_key("0B11202401010511");
    assert!(recv_item(&mut rx).await.is_ok());

    session.stop_watch_events().await.unwrap();
    // Stopping twice is harmless as well.
    session.stop_watch_events().await.unwrap();
}

#[tokio::test]
async fn malformed_keys_surface_as_error_items() {
    let (session, handle) = scripted_session(16);
    let mut rx = session.watch_events();
    session.start_watch_events().await.unwrap();

    handle.emit_watch_key("garbage");
    handle.emit_watch_key("0B12202401010511");

    assert!(matches!(
        recv_item(&mut rx).await,
        Err(JvLinkError::Native(_))
    ));
    assert_eq!(
        recv_item(&mut rx).await.unwrap().kind,
        WatchEventKind::PayoffConfirmed
    );
    session.stop_watch_events().await.unwrap();
}

#[tokio::test]
async fn overflow_is_reported_in_stream_and_the_pump_survives() {
    let (session, handle) = scripted_session(2);
    let mut rx = session.watch_events();
    session.start_watch_events().await.unwrap();

    // Let the consumer park on its empty queue, then burst more keys than
    // the queue holds before it can wake: two land, the rest are dropped
    // and counted.
    tokio::time::sleep(Duration::from_millis(50)).await;
    for _ in 0..5 {
        handle.emit_watch_key("0B11202401010511");
    }

    let mut ok_items = 0u64;
    let mut dropped_total = 0u64;
    while ok_items + dropped_total < 5 {
        match recv_item(&mut rx).await {
            Ok(_) => ok_items += 1,
            Err(JvLinkError::EventQueueOverflow { dropped }) => dropped_total += dropped,
            Err(other) => panic!("unexpected error item: {other}"),
        }
    }
    assert!(ok_items >= 2, "the queue capacity must still deliver");
    assert!(dropped_total >= 3, "the surplus keys must be counted");

    // The stream stays usable after the overflow drained.
    handle.emit_watch_key("0B12202401010511");
    assert_eq!(
        recv_item(&mut rx).await.unwrap().kind,
        WatchEventKind::PayoffConfirmed
    );
    session.stop_watch_events().await.unwrap();
}

#[tokio::test]
async fn stop_then_start_builds_a_fresh_queue() {
    let (session, handle) = scripted_session(16);
    session.start_watch_events().await.unwrap();
    handle.emit_watch_key("0B11202401010511");
    session.stop_watch_events().await.unwrap();

    // Events do not reach a stopped pump.
    assert!(!handle.emit_watch_key("0B11202401010511"));

    // A fresh start delivers again.
    assert!(session.start_watch_events().await.unwrap());
    let mut rx = session.watch_events();
    handle.emit_watch_key("0B16202401010511WE");
    assert_eq!(
        recv_item(&mut rx).await.unwrap().kind,
        WatchEventKind::WeatherChange
    );
    session.stop_watch_events().await.unwrap();
}

#[tokio::test]
async fn events_stop_flowing_after_stop() {
    let (session, handle) = scripted_session(16);
    session.start_watch_events().await.unwrap();
    session.stop_watch_events().await.unwrap();
    // The native subscription was closed before the queue completed.
    assert!(!handle.watch_registered());
    assert!(!handle.emit_watch_key("0B11202401010511"));
}
