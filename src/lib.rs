//! jvlink: a strongly-typed client for the JRA-VAN JV-Link data service.
//!
//! JV-Link delivers Japanese horse-racing data as Shift-JIS fixed-length
//! records through a single-threaded, blocking native component. This crate
//! is the umbrella over the workspace:
//!
//! - [`jvlink_core`] -- session orchestration: the apartment-confined
//!   dispatcher, the reentrancy-guarded session state machine with eager
//!   and lazy (sync + cancellable async) read surfaces, and the bounded
//!   watch-event pump.
//! - [`jvdata_core`] -- the record codec: Shift-JIS text handling, the
//!   field-spec tables, typed record parsers, and code tables.
//!
//! ```no_run
//! use jvlink::{JvLink, JvLinkConfig, OpenRequest};
//!
//! # async fn demo() -> Result<(), jvlink::JvLinkError> {
//! // In production the factory constructs the native COM-backed client on
//! // the dispatcher worker; tests script the in-memory stub instead.
//! let (client, _handle) = jv_test_utils::ScriptedClient::new();
//! let config = JvLinkConfig::new("my-tool/1.0")?;
//! let session = JvLink::new(config, move || Ok(client))?;
//! let races = session
//!     .fetch_typed_records(OpenRequest::new(
//!         "RACE",
//!         chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
//!             .unwrap()
//!             .and_hms_opt(0, 0, 0)
//!             .unwrap(),
//!         1,
//!     ))
//!     .await?;
//! # let _ = races;
//! # Ok(())
//! # }
//! ```

pub use jvdata_core::{
    ParsedRecord, RaceId, RecordError, RunnerId, WatchEvent, WatchEventKind, codes, fieldspec,
    records, text,
};
pub use jvlink_core::{
    EventItem, EventSink, JvLink, JvLinkClient, JvLinkConfig, JvLinkError, MovieType,
    NativeFailure, OpenRequest, OpenSummary, Payload, PayloadStream, Property, PropertyAccess,
    PropertyValue, ReadOutcome, SessionPolicy, SessionState, WorkoutListing, blocking,
    load_config_from_path, load_config_from_str, parse_from_time,
};
