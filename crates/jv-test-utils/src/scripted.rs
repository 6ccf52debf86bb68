//! Scripted stub backend.
//!
//! [`ScriptedClient`] implements the full client contract from in-memory
//! queues. Tests hold the paired [`StubHandle`] (same shared state) to
//! script outcomes before the call and to assert call counts afterwards --
//! the client itself moves onto the dispatcher worker and is never seen
//! again.
//!
//! Unscripted defaults are benign: `open` reports data whenever reads are
//! queued, `read` past the script is end-of-stream, `skip` succeeds.

use chrono::{DateTime, Utc};
use jvlink_core::contract::{
    EventSink, JvLinkClient, MovieType, OpenRequest, OpenSummary, Payload, Property,
    PropertyAccess, PropertyValue, ReadOutcome,
};
use jvlink_core::error::NativeFailure;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted step of the read queue.
#[derive(Debug, Clone)]
pub enum ReadStep {
    Outcome(ReadOutcome),
    Fail(i32),
}

#[derive(Default)]
struct StubState {
    read_queue: Mutex<VecDeque<ReadStep>>,
    skip_queue: Mutex<VecDeque<Result<(), i32>>>,
    open_results: Mutex<VecDeque<Result<Option<OpenSummary>, i32>>>,
    open_delay: Mutex<Option<Duration>>,
    movie_lines: Mutex<VecDeque<String>>,
    properties: Mutex<HashMap<&'static str, PropertyValue>>,
    sink: Mutex<Option<EventSink>>,
    status: Mutex<i32>,
    init_sids: Mutex<Vec<String>>,
    open_requests: Mutex<Vec<(String, String, i32)>>,
    realtime_opens: Mutex<Vec<(String, String)>>,
    deleted_files: Mutex<Vec<String>>,
    init_calls: AtomicU32,
    open_calls: AtomicU32,
    read_calls: AtomicU32,
    gets_calls: AtomicU32,
    skip_calls: AtomicU32,
    cancel_calls: AtomicU32,
    close_calls: AtomicU32,
}

/// The backend half: moves onto the dispatcher worker.
pub struct ScriptedClient {
    state: Arc<StubState>,
}

/// The test half: scripts outcomes and reads counters.
#[derive(Clone)]
pub struct StubHandle {
    state: Arc<StubState>,
}

impl ScriptedClient {
    pub fn new() -> (ScriptedClient, StubHandle) {
        let state = Arc::new(StubState::default());
        (
            ScriptedClient {
                state: Arc::clone(&state),
            },
            StubHandle { state },
        )
    }
}

// ---------------------------------------------------------------------------
// Scripting surface
// ---------------------------------------------------------------------------

impl StubHandle {
    pub fn queue_payload(&self, data: &[u8]) {
        self.queue_read(ReadStep::Outcome(ReadOutcome::Payload(Payload::new(data))));
    }

    pub fn queue_payload_at(&self, data: &[u8], timestamp: DateTime<Utc>) {
        let mut payload = Payload::new(data);
        payload.timestamp = Some(timestamp);
        self.queue_read(ReadStep::Outcome(ReadOutcome::Payload(payload)));
    }

    pub fn queue_file_boundary(&self) {
        self.queue_read(ReadStep::Outcome(ReadOutcome::FileBoundary));
    }

    pub fn queue_download_pending(&self, n: usize) {
        for _ in 0..n {
            self.queue_read(ReadStep::Outcome(ReadOutcome::DownloadPending));
        }
    }

    pub fn queue_end_of_stream(&self) {
        self.queue_read(ReadStep::Outcome(ReadOutcome::EndOfStream));
    }

    pub fn queue_read_failure(&self, code: i32) {
        self.queue_read(ReadStep::Fail(code));
    }

    pub fn queue_read(&self, step: ReadStep) {
        self.state.read_queue.lock().unwrap().push_back(step);
    }

    pub fn queue_skip_failure(&self, code: i32) {
        self.state.skip_queue.lock().unwrap().push_back(Err(code));
    }

    /// Script the next open outcome. `None` keeps the default summary
    /// (data present iff reads are queued).
    pub fn queue_open_summary(&self, summary: OpenSummary) {
        self.state
            .open_results
            .lock()
            .unwrap()
            .push_back(Ok(Some(summary)));
    }

    pub fn queue_open_failure(&self, code: i32) {
        self.state.open_results.lock().unwrap().push_back(Err(code));
    }

    /// Make every open block for this long before returning (drives the
    /// dispatcher-timeout path).
    pub fn set_open_delay(&self, delay: Duration) {
        *self.state.open_delay.lock().unwrap() = Some(delay);
    }

    pub fn queue_movie_line(&self, line: &str) {
        self.state
            .movie_lines
            .lock()
            .unwrap()
            .push_back(line.to_owned());
    }

    pub fn set_status(&self, status: i32) {
        *self.state.status.lock().unwrap() = status;
    }

    /// Push a raw key at the registered watch sink, as the native layer
    /// would. Returns false when no sink is registered.
    pub fn emit_watch_key(&self, key: &str) -> bool {
        match self.state.sink.lock().unwrap().as_ref() {
            Some(sink) => {
                sink(key);
                true
            }
            None => false,
        }
    }

    pub fn watch_registered(&self) -> bool {
        self.state.sink.lock().unwrap().is_some()
    }

    // Counters.

    pub fn init_calls(&self) -> u32 {
        self.state.init_calls.load(Ordering::SeqCst)
    }

    pub fn open_calls(&self) -> u32 {
        self.state.open_calls.load(Ordering::SeqCst)
    }

    pub fn read_calls(&self) -> u32 {
        self.state.read_calls.load(Ordering::SeqCst)
    }

    pub fn gets_calls(&self) -> u32 {
        self.state.gets_calls.load(Ordering::SeqCst)
    }

    pub fn skip_calls(&self) -> u32 {
        self.state.skip_calls.load(Ordering::SeqCst)
    }

    pub fn cancel_calls(&self) -> u32 {
        self.state.cancel_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> u32 {
        self.state.close_calls.load(Ordering::SeqCst)
    }

    pub fn init_sids(&self) -> Vec<String> {
        self.state.init_sids.lock().unwrap().clone()
    }

    /// The `(spec, from_time, option)` triples `open` received.
    pub fn open_requests(&self) -> Vec<(String, String, i32)> {
        self.state.open_requests.lock().unwrap().clone()
    }

    pub fn realtime_opens(&self) -> Vec<(String, String)> {
        self.state.realtime_opens.lock().unwrap().clone()
    }

    pub fn deleted_files(&self) -> Vec<String> {
        self.state.deleted_files.lock().unwrap().clone()
    }
}

// ---------------------------------------------------------------------------
// Contract implementation
// ---------------------------------------------------------------------------

impl ScriptedClient {
    fn next_read(&self, counter: &AtomicU32) -> Result<ReadOutcome, NativeFailure> {
        counter.fetch_add(1, Ordering::SeqCst);
        match self.state.read_queue.lock().unwrap().pop_front() {
            Some(ReadStep::Outcome(outcome)) => Ok(outcome),
            Some(ReadStep::Fail(code)) => Err(NativeFailure::from_code(code)),
            None => Ok(ReadOutcome::EndOfStream),
        }
    }

    fn do_open(&self) -> Result<OpenSummary, NativeFailure> {
        let delay = *self.state.open_delay.lock().unwrap();
        if let Some(delay) = delay {
            // Simulates a native call that blocks the apartment thread.
            std::thread::sleep(delay);
        }
        match self.state.open_results.lock().unwrap().pop_front() {
            Some(Ok(Some(summary))) => Ok(summary),
            Some(Err(code)) => Err(NativeFailure::from_code(code)),
            Some(Ok(None)) | None => {
                let queued = self.state.read_queue.lock().unwrap().len();
                Ok(OpenSummary {
                    has_data: queued > 0,
                    file_count: i32::try_from(queued).unwrap_or(i32::MAX),
                    pending_download_count: 0,
                    last_timestamp: None,
                })
            }
        }
    }
}

impl JvLinkClient for ScriptedClient {
    fn init(&mut self, sid: &str) -> Result<(), NativeFailure> {
        self.state.init_calls.fetch_add(1, Ordering::SeqCst);
        self.state.init_sids.lock().unwrap().push(sid.to_owned());
        Ok(())
    }

    fn open(&mut self, request: &OpenRequest) -> Result<OpenSummary, NativeFailure> {
        self.state.open_calls.fetch_add(1, Ordering::SeqCst);
        self.state.open_requests.lock().unwrap().push((
            request.spec.clone(),
            request.from_time(),
            request.option,
        ));
        self.do_open()
    }

    fn open_realtime(&mut self, spec: &str, key: &str) -> Result<OpenSummary, NativeFailure> {
        self.state.open_calls.fetch_add(1, Ordering::SeqCst);
        self.state
            .realtime_opens
            .lock()
            .unwrap()
            .push((spec.to_owned(), key.to_owned()));
        self.do_open()
    }

    fn read(&mut self) -> Result<ReadOutcome, NativeFailure> {
        self.next_read(&self.state.read_calls)
    }

    fn gets(&mut self) -> Result<ReadOutcome, NativeFailure> {
        self.next_read(&self.state.gets_calls)
    }

    fn skip(&mut self) -> Result<(), NativeFailure> {
        self.state.skip_calls.fetch_add(1, Ordering::SeqCst);
        match self.state.skip_queue.lock().unwrap().pop_front() {
            Some(Err(code)) => Err(NativeFailure::from_code(code)),
            _ => Ok(()),
        }
    }

    fn cancel(&mut self) -> Result<(), NativeFailure> {
        self.state.cancel_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) {
        self.state.close_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn status(&mut self) -> Result<i32, NativeFailure> {
        Ok(*self.state.status.lock().unwrap())
    }

    fn delete_file(&mut self, name: &str) -> Result<(), NativeFailure> {
        self.state.deleted_files.lock().unwrap().push(name.to_owned());
        Ok(())
    }

    fn watch_event(&mut self, sink: EventSink) -> Result<(), NativeFailure> {
        *self.state.sink.lock().unwrap() = Some(sink);
        Ok(())
    }

    fn watch_event_close(&mut self) -> Result<(), NativeFailure> {
        *self.state.sink.lock().unwrap() = None;
        Ok(())
    }

    fn get_property(&mut self, property: Property) -> Result<PropertyValue, NativeFailure> {
        if property.access() == PropertyAccess::WriteOnly {
            return Err(NativeFailure::invalid_state(format!(
                "property '{}' is write-only",
                property.name()
            )));
        }
        if let Some(value) = self.state.properties.lock().unwrap().get(property.name()) {
            return Ok(value.clone());
        }
        Ok(match property {
            Property::SaveFlag => PropertyValue::Flag(false),
            Property::SavePath => PropertyValue::Text(String::new()),
            Property::ServiceKey => PropertyValue::Text(String::new()),
            Property::PayoffDialogSuppressed => PropertyValue::Flag(false),
            Property::Version => PropertyValue::Text("stub/4.9.0".to_owned()),
            Property::TotalReadFileSizeKb | Property::CurrentReadFileSizeBytes => {
                PropertyValue::Size(0)
            }
            Property::CurrentFileTimestamp => PropertyValue::Timestamp(None),
            // Unreachable: write-only rejected above.
            Property::ParentWindowHandle => PropertyValue::Handle(0),
        })
    }

    fn set_property(
        &mut self,
        property: Property,
        value: PropertyValue,
    ) -> Result<(), NativeFailure> {
        if property.access() == PropertyAccess::ReadOnly {
            return Err(NativeFailure::invalid_state(format!(
                "property '{}' is read-only",
                property.name()
            )));
        }
        self.state
            .properties
            .lock()
            .unwrap()
            .insert(property.name(), value);
        Ok(())
    }

    fn course_diagram(&mut self, key: &str) -> Result<Vec<u8>, NativeFailure> {
        Ok(format!("diagram:{key}").into_bytes())
    }

    fn silks_bitmap(&mut self, key: &str) -> Result<Vec<u8>, NativeFailure> {
        Ok(format!("silks:{key}").into_bytes())
    }

    fn silks_bitmap_file(&mut self, key: &str) -> Result<String, NativeFailure> {
        Ok(format!("/tmp/silks-{key}.bmp"))
    }

    fn movie_check(&mut self, _movie_type: MovieType, _key: &str) -> Result<bool, NativeFailure> {
        Ok(!self.state.movie_lines.lock().unwrap().is_empty())
    }

    fn movie_play(&mut self, _movie_type: MovieType, _key: &str) -> Result<(), NativeFailure> {
        Ok(())
    }

    fn movie_open(
        &mut self,
        _movie_type: MovieType,
        _search_key: &str,
    ) -> Result<OpenSummary, NativeFailure> {
        self.state.open_calls.fetch_add(1, Ordering::SeqCst);
        let queued = self.state.movie_lines.lock().unwrap().len();
        Ok(OpenSummary {
            has_data: queued > 0,
            file_count: i32::try_from(queued).unwrap_or(i32::MAX),
            pending_download_count: 0,
            last_timestamp: None,
        })
    }

    fn movie_read(&mut self) -> Result<Option<String>, NativeFailure> {
        Ok(self.state.movie_lines.lock().unwrap().pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_queue_drains_in_order_then_ends() {
        let (mut client, handle) = ScriptedClient::new();
        handle.queue_payload(b"1");
        handle.queue_file_boundary();
        handle.queue_read_failure(-402);

        assert!(matches!(
            client.read().unwrap(),
            ReadOutcome::Payload(Payload { data, .. }) if data == b"1"
        ));
        assert_eq!(client.read().unwrap(), ReadOutcome::FileBoundary);
        assert_eq!(client.read().unwrap_err().code(), Some(-402));
        assert_eq!(client.read().unwrap(), ReadOutcome::EndOfStream);
        assert_eq!(handle.read_calls(), 4);
    }

    #[test]
    fn default_open_reports_data_iff_reads_are_queued() {
        let (mut client, handle) = ScriptedClient::new();
        let request = OpenRequest::new(
            "RACE",
            chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            1,
        );
        assert!(!client.open(&request).unwrap().has_data);
        handle.queue_payload(b"x");
        assert!(client.open(&request).unwrap().has_data);
        assert_eq!(handle.open_calls(), 2);
        assert_eq!(handle.open_requests()[0].1, "20240101000000");
    }

    #[test]
    fn watch_sink_round_trips() {
        let (mut client, handle) = ScriptedClient::new();
        assert!(!handle.emit_watch_key("0B11"));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&seen);
        client
            .watch_event(Box::new(move |key| {
                captured.lock().unwrap().push(key.to_owned());
            }))
            .unwrap();
        assert!(handle.watch_registered());
        assert!(handle.emit_watch_key("0B11202401010511"));
        client.watch_event_close().unwrap();
        assert!(!handle.watch_registered());
        assert_eq!(seen.lock().unwrap().as_slice(), ["0B11202401010511"]);
    }

    #[test]
    fn property_access_flags_are_honoured() {
        let (mut client, _handle) = ScriptedClient::new();
        assert!(client.get_property(Property::ParentWindowHandle).is_err());
        assert!(
            client
                .set_property(Property::Version, PropertyValue::Text("x".into()))
                .is_err()
        );
        client
            .set_property(Property::SaveFlag, PropertyValue::Flag(true))
            .unwrap();
        assert_eq!(
            client.get_property(Property::SaveFlag).unwrap(),
            PropertyValue::Flag(true)
        );
    }
}
