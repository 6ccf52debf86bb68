//! The client capability contract.
//!
//! [`JvLinkClient`] is the seam between the orchestrator and whatever backs
//! it: the real apartment-threaded component on Windows, or the scripted
//! stub in tests. Implementations are driven exclusively from the
//! dispatcher's worker thread, so they need not be `Send`; the dispatcher
//! constructs them there and never lets them leave.
//!
//! Errors and control signals are split: a read that hits a file boundary or
//! a pending download returns a [`ReadOutcome`] variant, never an `Err`.

use crate::error::NativeFailure;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Requests and outcomes
// ---------------------------------------------------------------------------

/// Parameters for opening a stored-data session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRequest {
    /// Four-character dataspec, e.g. `"RACE"` or `"DIFF"`.
    pub spec: String,
    /// Lower bound for the data to deliver.
    pub from: NaiveDateTime,
    /// Native open option (1 standard, 2 this week, 3 setup, 4 silent setup).
    pub option: i32,
}

impl OpenRequest {
    pub fn new(spec: impl Into<String>, from: NaiveDateTime, option: i32) -> OpenRequest {
        OpenRequest {
            spec: spec.into(),
            from,
            option,
        }
    }

    /// Check the request before it reaches the native layer.
    pub fn validate(&self) -> Result<(), String> {
        if self.spec.len() != 4 || !self.spec.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(format!(
                "dataspec must be 4 alphanumeric characters, got '{}'",
                self.spec
            ));
        }
        if !(1..=4).contains(&self.option) {
            return Err(format!("open option must be 1-4, got {}", self.option));
        }
        Ok(())
    }

    /// The `yyyyMMddHHmmss` form the native open call takes.
    pub fn from_time(&self) -> String {
        self.from.format("%Y%m%d%H%M%S").to_string()
    }
}

/// Parse a native `yyyyMMddHHmmss` timestamp. Invariant-culture: the result
/// does not depend on the process locale or its calendar.
pub fn parse_from_time(s: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(s.trim(), "%Y%m%d%H%M%S")
        .map_err(|_| format!("'{s}' is not a yyyyMMddHHmmss timestamp"))
}

/// Metadata returned by the native open family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenSummary {
    pub has_data: bool,
    pub file_count: i32,
    pub pending_download_count: i32,
    pub last_timestamp: Option<DateTime<Utc>>,
}

/// One raw record with its capture timestamp, when the native layer reports
/// one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub data: Vec<u8>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Payload {
    pub fn new(data: impl Into<Vec<u8>>) -> Payload {
        Payload {
            data: data.into(),
            timestamp: None,
        }
    }
}

/// What one native read produced. Errors travel on the failure channel,
/// never through this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Payload(Payload),
    /// `-1`: the next payload starts a new underlying file.
    FileBoundary,
    /// `-3`: required artefacts are still arriving; try again later.
    DownloadPending,
    EndOfStream,
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

/// The enumerated native properties, with their access mode in the type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    SaveFlag,
    SavePath,
    ServiceKey,
    ParentWindowHandle,
    PayoffDialogSuppressed,
    Version,
    /// Total size of the files the current session will read, in kilobytes.
    TotalReadFileSizeKb,
    /// Size of the file currently being read, in bytes.
    CurrentReadFileSizeBytes,
    CurrentFileTimestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyAccess {
    ReadWrite,
    ReadOnly,
    WriteOnly,
}

impl Property {
    pub fn access(self) -> PropertyAccess {
        match self {
            Property::SaveFlag | Property::SavePath | Property::ServiceKey => {
                PropertyAccess::ReadWrite
            }
            Property::ParentWindowHandle => PropertyAccess::WriteOnly,
            Property::PayoffDialogSuppressed
            | Property::Version
            | Property::TotalReadFileSizeKb
            | Property::CurrentReadFileSizeBytes
            | Property::CurrentFileTimestamp => PropertyAccess::ReadOnly,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Property::SaveFlag => "save_flag",
            Property::SavePath => "save_path",
            Property::ServiceKey => "service_key",
            Property::ParentWindowHandle => "parent_window_handle",
            Property::PayoffDialogSuppressed => "payoff_dialog_suppressed",
            Property::Version => "version",
            Property::TotalReadFileSizeKb => "total_read_file_size_kb",
            Property::CurrentReadFileSizeBytes => "current_read_file_size_bytes",
            Property::CurrentFileTimestamp => "current_file_timestamp",
        }
    }
}

/// A property value. Which shape a property carries is fixed per property;
/// backends reject mismatches with [`NativeFailure::InvalidState`].
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Flag(bool),
    Text(String),
    Size(u64),
    Handle(isize),
    Timestamp(Option<DateTime<Utc>>),
}

// ---------------------------------------------------------------------------
// Media
// ---------------------------------------------------------------------------

/// Movie categories of the movie helper family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovieType {
    Race,
    Paddock,
    Workout,
    PatrolFilm,
}

impl MovieType {
    pub fn code(self) -> &'static str {
        match self {
            MovieType::Race => "00",
            MovieType::Paddock => "01",
            MovieType::Workout => "02",
            MovieType::PatrolFilm => "03",
        }
    }
}

/// Callback handed to the native layer for watch events. Invoked on the
/// dispatcher worker with the raw event key; it must not block.
pub type EventSink = Box<dyn Fn(&str) + Send + 'static>;

// ---------------------------------------------------------------------------
// The contract
// ---------------------------------------------------------------------------

/// Capability set every backend implements.
///
/// All methods are called from the dispatcher worker thread, one at a time.
/// `close` is infallible and idempotent; dropping an implementation must
/// release the native handle (and close any open session) on its own.
pub trait JvLinkClient: 'static {
    /// Idempotent for the same software id.
    fn init(&mut self, sid: &str) -> Result<(), NativeFailure>;

    fn open(&mut self, request: &OpenRequest) -> Result<OpenSummary, NativeFailure>;
    fn open_realtime(&mut self, spec: &str, key: &str) -> Result<OpenSummary, NativeFailure>;

    fn read(&mut self) -> Result<ReadOutcome, NativeFailure>;
    /// Fast-path read that extracts bytes directly from the native array,
    /// avoiding one internal re-encoding. Same outcome shape as `read`.
    fn gets(&mut self) -> Result<ReadOutcome, NativeFailure>;

    fn skip(&mut self) -> Result<(), NativeFailure>;
    fn cancel(&mut self) -> Result<(), NativeFailure>;
    fn close(&mut self);
    fn status(&mut self) -> Result<i32, NativeFailure>;
    fn delete_file(&mut self, name: &str) -> Result<(), NativeFailure>;

    fn watch_event(&mut self, sink: EventSink) -> Result<(), NativeFailure>;
    fn watch_event_close(&mut self) -> Result<(), NativeFailure>;

    fn get_property(&mut self, property: Property) -> Result<PropertyValue, NativeFailure>;
    fn set_property(
        &mut self,
        property: Property,
        value: PropertyValue,
    ) -> Result<(), NativeFailure>;

    fn course_diagram(&mut self, key: &str) -> Result<Vec<u8>, NativeFailure>;
    /// Silks bitmap by key, returned as bytes.
    fn silks_bitmap(&mut self, key: &str) -> Result<Vec<u8>, NativeFailure>;
    /// Silks bitmap by key, saved by the native layer; returns the file path.
    fn silks_bitmap_file(&mut self, key: &str) -> Result<String, NativeFailure>;

    fn movie_check(&mut self, movie_type: MovieType, key: &str) -> Result<bool, NativeFailure>;
    fn movie_play(&mut self, movie_type: MovieType, key: &str) -> Result<(), NativeFailure>;
    /// Open the movie listing for a search key; read lines with `movie_read`.
    fn movie_open(
        &mut self,
        movie_type: MovieType,
        search_key: &str,
    ) -> Result<OpenSummary, NativeFailure>;
    /// One listing line, or `None` at the end of the listing.
    fn movie_read(&mut self) -> Result<Option<String>, NativeFailure>;
}
