//! Session fetch lifecycle over the scripted stub.
//!
//! Covers the eager surface: open/read/close bookkeeping, file boundaries,
//! download-pending polling, the retry-then-skip policy for unusable
//! artefacts, the reentrancy guard, typed fetches, and the pass-through
//! wrappers.

use jv_test_utils::{ScriptedClient, StubHandle};
use jvlink_core::error::{JvLinkError, NativeFailure};
use jvlink_core::{JvLink, JvLinkConfig, MovieType, OpenRequest, SessionPolicy, SessionState};
use std::time::Duration;
use tokio::sync::watch;

// ---------------------------------------------------------------------------
// Harness helpers
// ---------------------------------------------------------------------------

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

/// A minimal `RA` record buffer: race key plus an ASCII race name.
fn ra_record() -> Vec<u8> {
    let mut bytes = vec![b' '; 127];
    bytes[..2].copy_from_slice(b"RA");
    bytes[2] = b'1';
    bytes[11..27].copy_from_slice(b"2024050505030211");
    bytes[28..37].copy_from_slice(b"TEST RACE");
    bytes
}

// ---------------------------------------------------------------------------
// Eager fetch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_all_collects_payloads_and_closes_once() {
    let (session, handle) = scripted_session();
    handle.queue_payload(b"1");
    handle.queue_end_of_stream();

    let payloads = session.fetch_all(race_request()).await.unwrap();

    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].data, b"1");
    assert_eq!(handle.init_calls(), 1);
    assert_eq!(handle.open_calls(), 1);
    assert_eq!(handle.close_calls(), 1);
    assert_eq!(
        handle.open_requests(),
        [("RACE".to_owned(), "20240101000000".to_owned(), 1)]
    );
    assert_eq!(session.session_state(), SessionState::Closed);
}

#[tokio::test]
async fn file_boundaries_are_transparent() {
    let (session, handle) = scripted_session();
    handle.queue_file_boundary();
    handle.queue_payload(b"A");
    handle.queue_file_boundary();
    handle.queue_payload(b"B");
    handle.queue_end_of_stream();

    let payloads = session.fetch_all(race_request()).await.unwrap();
    let data: Vec<&[u8]> = payloads.iter().map(|p| p.data.as_slice()).collect();
    assert_eq!(data, [b"A".as_slice(), b"B".as_slice()]);
    assert_eq!(handle.close_calls(), 1);
}

#[tokio::test]
async fn download_pending_is_polled_through() {
    let (session, handle) = scripted_session();
    handle.queue_download_pending(4);
    handle.queue_payload(b"ready");
    handle.queue_end_of_stream();

    let payloads = session.fetch_all(race_request()).await.unwrap();
    assert_eq!(payloads.len(), 1);
    assert_eq!(handle.close_calls(), 1);
    // Four pending reads, one payload read, one end-of-stream read.
    assert_eq!(handle.read_calls(), 6);
}

#[tokio::test]
async fn recoverable_error_retries_then_skips() {
    let (session, handle) = scripted_session();
    handle.queue_read_failure(-402);
    handle.queue_read_failure(-402);
    handle.queue_read_failure(-402);
    handle.queue_payload(b"Z");
    handle.queue_end_of_stream();

    let payloads = session.fetch_all(race_request()).await.unwrap();

    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].data, b"Z");
    // First read plus two retries consumed the three failures, then skip.
    assert_eq!(handle.skip_calls(), 1);
    assert_eq!(handle.read_calls(), 5);
    assert_eq!(handle.close_calls(), 1);
}

#[tokio::test]
async fn skip_failure_surfaces_the_original_error() {
    let (session, handle) = scripted_session();
    for _ in 0..3 {
        handle.queue_read_failure(-402);
    }
    handle.queue_skip_failure(-203);

    let err = session.fetch_all(race_request()).await.unwrap_err();
    // No silent partial data: the original artefact error comes back.
    assert_eq!(err.code(), Some(-402));
    assert_eq!(handle.skip_calls(), 1);
    assert_eq!(handle.close_calls(), 1);
}

#[tokio::test]
async fn fatal_error_closes_and_surfaces() {
    let (session, handle) = scripted_session();
    handle.queue_payload(b"kept");
    handle.queue_read_failure(-401);

    let err = session.fetch_all(race_request()).await.unwrap_err();
    assert_eq!(err.code(), Some(-401));
    assert_eq!(handle.skip_calls(), 0);
    assert_eq!(handle.close_calls(), 1);
}

#[tokio::test]
async fn empty_open_returns_no_payloads_and_closes() {
    let (session, handle) = scripted_session();
    // Nothing queued: the stub reports has_data = false.
    let payloads = session.fetch_all(race_request()).await.unwrap();
    assert!(payloads.is_empty());
    assert_eq!(handle.open_calls(), 1);
    assert_eq!(handle.close_calls(), 1);
    assert_eq!(handle.read_calls(), 0);
}

#[tokio::test]
async fn empty_payloads_are_discarded_silently() {
    let (session, handle) = scripted_session();
    handle.queue_payload(b"");
    handle.queue_payload(b"X");
    handle.queue_end_of_stream();

    let payloads = session.fetch_all(race_request()).await.unwrap();
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].data, b"X");
}

#[tokio::test]
async fn read_size_accumulates_payload_bytes() {
    let (session, handle) = scripted_session();
    handle.queue_payload(b"12345");
    handle.queue_payload(b"678");
    handle.queue_end_of_stream();

    let (payloads, bytes) = session
        .fetch_all_with_read_size(race_request())
        .await
        .unwrap();
    assert_eq!(payloads.len(), 2);
    assert_eq!(bytes, 8);
}

#[tokio::test]
async fn gets_fast_path_is_selected_by_config() {
    let (client, handle) = ScriptedClient::new();
    let config = JvLinkConfig::new("test-suite/1.0")
        .unwrap()
        .with_gets_fast_path(true);
    let session = JvLink::with_policy(config, quick_policy(), move || Ok(client)).unwrap();
    handle.queue_payload(b"fast");
    handle.queue_end_of_stream();

    let payloads = session.fetch_all(race_request()).await.unwrap();
    assert_eq!(payloads.len(), 1);
    assert_eq!(handle.read_calls(), 0);
    assert_eq!(handle.gets_calls(), 2);
}

#[tokio::test]
async fn validation_failure_never_reaches_the_native_layer() {
    let (session, handle) = scripted_session();
    let bad = OpenRequest::new(
        "TOOLONG",
        chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap(),
        1,
    );
    let err = session.fetch_all(bad).await.unwrap_err();
    assert!(matches!(err, JvLinkError::Validation { .. }));
    assert_eq!(handle.open_calls(), 0);
    assert_eq!(handle.init_calls(), 0);
}

#[tokio::test]
async fn second_caller_gets_invalid_state_immediately() {
    let (session, handle) = scripted_session();
    handle.set_open_delay(Duration::from_millis(150));
    handle.queue_payload(b"slow");
    handle.queue_end_of_stream();

    let racing = session.clone();
    let first = tokio::spawn(async move { racing.fetch_all(race_request()).await });
    tokio::time::sleep(Duration::from_millis(40)).await;

    let second = session.fetch_all(race_request()).await;
    match second {
        Err(JvLinkError::Native(NativeFailure::InvalidState { .. })) => {}
        other => panic!("expected InvalidState, got: {other:?}"),
    }

    let payloads = first.await.unwrap().unwrap();
    assert_eq!(payloads.len(), 1);
    assert_eq!(handle.open_calls(), 1);
}

#[tokio::test]
async fn pre_cancelled_fetch_reports_cancelled_and_closes() {
    let (session, handle) = scripted_session();
    handle.queue_payload(b"1");
    handle.queue_end_of_stream();
    let (tx, rx) = watch::channel(true);
    drop(tx);

    let err = session
        .fetch_all_cancellable(race_request(), rx)
        .await
        .unwrap_err();
    assert_eq!(err, JvLinkError::Cancelled);
    assert_eq!(handle.close_calls(), 1);
}

// ---------------------------------------------------------------------------
// Typed fetch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn typed_fetch_parses_records() {
    let (session, handle) = scripted_session();
    handle.queue_payload(&ra_record());
    handle.queue_end_of_stream();

    let records = session.fetch_typed_records(race_request()).await.unwrap();
    assert_eq!(records.len(), 1);
    match &records[0] {
        jvdata_core::ParsedRecord::Race(race) => {
            assert_eq!(race.id.as_str(), "2024050505030211");
            assert_eq!(race.name, "TEST RACE");
        }
        other => panic!("expected Race, got {}", other.kind()),
    }
}

#[tokio::test]
async fn typed_fetch_collecting_reports_bad_records() {
    let (session, handle) = scripted_session();
    handle.queue_payload(&ra_record());
    handle.queue_payload(b"RA");
    handle.queue_end_of_stream();

    let (records, failures) = session
        .fetch_typed_records_collecting(race_request())
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, 1);
}

// ---------------------------------------------------------------------------
// Pass-through wrappers and properties
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_and_delete_file_pass_through() {
    let (session, handle) = scripted_session();
    handle.set_status(7);
    assert_eq!(session.get_status().await.unwrap(), 7);

    session.delete_file("RA20240101.jvd").await.unwrap();
    assert_eq!(handle.deleted_files(), ["RA20240101.jvd"]);
}

#[tokio::test]
async fn property_setters_update_the_cached_config() {
    let (session, _handle) = scripted_session();
    assert_eq!(session.version().await.unwrap(), "stub/4.9.0");
    assert!(!session.save_flag().await.unwrap());

    session.set_save_flag(true).await.unwrap();
    assert!(session.save_flag().await.unwrap());
    assert!(session.config().save_flag);

    session.set_save_path("/var/lib/jvlink").await.unwrap();
    assert_eq!(session.config().save_path.as_deref(), Some("/var/lib/jvlink"));
}

#[tokio::test]
async fn try_get_on_a_write_only_property_is_none() {
    let (session, _handle) = scripted_session();
    let value = session
        .try_get_property(jvlink_core::Property::ParentWindowHandle)
        .await
        .unwrap();
    assert_eq!(value, None);
}

#[tokio::test]
async fn configured_options_are_applied_at_init() {
    let (client, handle) = ScriptedClient::new();
    let config = JvLinkConfig::new("test-suite/1.0")
        .unwrap()
        .with_service_key("A1B2C3D4E5F6G7H8I")
        .unwrap()
        .with_save_flag(true);
    let session = JvLink::with_policy(config, quick_policy(), move || Ok(client)).unwrap();
    handle.queue_end_of_stream();

    let _ = session.fetch_all(race_request()).await.unwrap();
    assert_eq!(handle.init_sids(), ["test-suite/1.0"]);
    // A later operation does not re-init.
    let _ = session.get_status().await.unwrap();
    assert_eq!(handle.init_calls(), 1);
}

// ---------------------------------------------------------------------------
// Workout listings
// ---------------------------------------------------------------------------

#[tokio::test]
async fn workout_videos_read_the_movie_listing() {
    let (session, handle) = scripted_session();
    handle.queue_movie_line("202404252019105219");
    handle.queue_movie_line("202404262018101234");
    handle.queue_movie_line("not-a-listing");

    let listings = session
        .fetch_workout_videos(MovieType::Workout, "20240425")
        .await
        .unwrap();
    assert_eq!(listings.len(), 2);
    assert_eq!(listings[0].horse.as_str(), "2019105219");
    assert_eq!(
        listings[1].date,
        chrono::NaiveDate::from_ymd_opt(2024, 4, 26).unwrap()
    );
    assert_eq!(handle.close_calls(), 1);
}

#[tokio::test]
async fn media_helpers_pass_through() {
    let (session, _handle) = scripted_session();
    let diagram = session.course_diagram("202405050503").await.unwrap();
    assert_eq!(diagram, b"diagram:202405050503");
    let silks = session.silks_bitmap("001234").await.unwrap();
    assert_eq!(silks, b"silks:001234");
    assert!(
        !session
            .movie_check(MovieType::Race, "2024050505030211")
            .await
            .unwrap()
    );
}
