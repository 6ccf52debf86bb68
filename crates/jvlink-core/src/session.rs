//! The session orchestrator.
//!
//! [`JvLink`] owns the dispatcher (and through it the confined backend),
//! the cached configuration, the watch-event pump, and the session state
//! machine. It is cheap to clone; clones share one session.
//!
//! # Concurrency
//! Public operations are callable from any thread but run one at a time:
//! a binary semaphore is try-acquired around every long-running operation
//! and contention returns [`NativeFailure::InvalidState`] immediately --
//! the second caller never queues.
//!
//! # Poisoning
//! A dispatched call that exceeds the policy timeout cannot be interrupted,
//! so the session transitions to a terminal poisoned state: every later
//! call is rejected with the synthetic `-999` communication failure and
//! teardown abandons the worker instead of joining it. The only remedy is
//! to drop the session and construct a new one.

use crate::config::JvLinkConfig;
use crate::contract::{
    EventSink, JvLinkClient, MovieType, OpenRequest, OpenSummary, Payload, Property,
    PropertyAccess, PropertyValue, ReadOutcome,
};
use crate::dispatcher::Dispatcher;
use crate::error::{JvLinkError, NativeFailure};
use crate::events::{EventItem, EventPump, PumpState};
use crate::stream::{PayloadStream, StreamTarget};
use chrono::{DateTime, NaiveDate, Utc};
use jvdata_core::RecordError;
use jvdata_core::ids::RunnerId;
use jvdata_core::records::ParsedRecord;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, broadcast, watch};
use tokio::time::{sleep, timeout};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, error, info, warn};

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Timeouts, retry, and polling knobs.
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    /// Per-call timeout for every dispatched native call. Exceeding it
    /// poisons the session.
    pub call_timeout: Duration,
    /// Read retries for recoverable-by-skip failures before `skip()`.
    pub read_retries: u32,
    /// Base of the linear retry backoff (`backoff * attempt`).
    pub retry_backoff: Duration,
    /// Sleep while the native layer reports a pending download.
    pub download_pending_delay: Duration,
    /// Poll interval for realtime streams idling at end-of-stream.
    pub poll_interval: Duration,
    /// Bounded join for the dispatcher worker at teardown.
    pub join_timeout: Duration,
    /// Watch-event ingress queue capacity.
    pub event_queue_capacity: usize,
}

impl Default for SessionPolicy {
    fn default() -> SessionPolicy {
        SessionPolicy {
            call_timeout: Duration::from_secs(30),
            read_retries: 2,
            retry_backoff: Duration::from_millis(500),
            download_pending_delay: Duration::from_millis(500),
            poll_interval: Duration::from_secs(1),
            join_timeout: Duration::from_secs(5),
            event_queue_capacity: 10_000,
        }
    }
}

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// Where the session is in its lifecycle. Mutated only while the operation
/// gate is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Opening,
    OpenWithData,
    OpenEmpty,
    Draining,
    Closing,
    Closed,
}

// ---------------------------------------------------------------------------
// Workout listings
// ---------------------------------------------------------------------------

/// One line of the workout movie listing: meeting date plus the horse's
/// registration number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkoutListing {
    pub date: NaiveDate,
    pub horse: RunnerId,
}

impl WorkoutListing {
    pub fn parse(line: &str) -> Result<WorkoutListing, &'static str> {
        let line = line.trim();
        if line.len() < 18 {
            return Err("listing line too short");
        }
        let date = NaiveDate::parse_from_str(&line[..8], "%Y%m%d")
            .map_err(|_| "listing has an invalid date")?;
        let horse =
            RunnerId::try_from(&line[8..18]).map_err(|_| "listing has an invalid horse id")?;
        Ok(WorkoutListing { date, horse })
    }
}

// ---------------------------------------------------------------------------
// The orchestrator
// ---------------------------------------------------------------------------

pub(crate) struct SessionInner<C: JvLinkClient> {
    pub(crate) dispatcher: Dispatcher<C>,
    pub(crate) policy: SessionPolicy,
    config: Mutex<JvLinkConfig>,
    gate: Arc<Semaphore>,
    state: Mutex<SessionState>,
    poisoned_flag: AtomicBool,
    poison_reason: Mutex<Option<String>>,
    initialised: AtomicBool,
    events: EventPump,
}

/// A JV-Link session orchestrator over any [`JvLinkClient`] backend.
pub struct JvLink<C: JvLinkClient> {
    pub(crate) inner: Arc<SessionInner<C>>,
}

impl<C: JvLinkClient> Clone for JvLink<C> {
    fn clone(&self) -> Self {
        JvLink {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: JvLinkClient> JvLink<C> {
    /// Construct with the default policy. The factory runs on the dispatcher
    /// worker; platform apartment setup belongs inside it.
    pub fn new<F>(config: JvLinkConfig, factory: F) -> Result<JvLink<C>, JvLinkError>
    where
        F: FnOnce() -> Result<C, NativeFailure> + Send + 'static,
    {
        JvLink::with_policy(config, SessionPolicy::default(), factory)
    }

    pub fn with_policy<F>(
        config: JvLinkConfig,
        policy: SessionPolicy,
        factory: F,
    ) -> Result<JvLink<C>, JvLinkError>
    where
        F: FnOnce() -> Result<C, NativeFailure> + Send + 'static,
    {
        let dispatcher = Dispatcher::spawn("jvlink-apartment", policy.join_timeout, factory)?;
        let events = EventPump::new(policy.event_queue_capacity);
        Ok(JvLink {
            inner: Arc::new(SessionInner {
                dispatcher,
                policy,
                config: Mutex::new(config),
                gate: Arc::new(Semaphore::new(1)),
                state: Mutex::new(SessionState::Idle),
                poisoned_flag: AtomicBool::new(false),
                poison_reason: Mutex::new(None),
                initialised: AtomicBool::new(false),
                events,
            }),
        })
    }

    /// Current lifecycle state, for diagnostics.
    pub fn session_state(&self) -> SessionState {
        *self.inner.state.lock().unwrap()
    }

    pub fn is_poisoned(&self) -> bool {
        self.inner.poisoned_flag.load(Ordering::Acquire)
    }

    pub fn poison_reason(&self) -> Option<String> {
        self.inner.poison_reason.lock().unwrap().clone()
    }

    /// A copy of the cached configuration.
    pub fn config(&self) -> JvLinkConfig {
        self.inner.config.lock().unwrap().clone()
    }

    // -----------------------------------------------------------------------
    // Internal plumbing
    // -----------------------------------------------------------------------

    pub(crate) fn set_state(&self, state: SessionState) {
        *self.inner.state.lock().unwrap() = state;
    }

    fn check_poisoned(&self) -> Result<(), JvLinkError> {
        if self.is_poisoned() {
            let reason = self
                .poison_reason()
                .unwrap_or_else(|| "session is poisoned".to_owned());
            return Err(NativeFailure::Communication {
                code: crate::error::TIMEOUT_CODE,
                message: reason,
            }
            .into());
        }
        Ok(())
    }

    fn poison(&self, operation: &'static str) {
        self.inner.poisoned_flag.store(true, Ordering::Release);
        *self.inner.poison_reason.lock().unwrap() =
            Some(format!("native call '{operation}' timed out"));
        self.inner.dispatcher.mark_abandoned();
        error!(
            operation,
            "session poisoned: the in-flight native call cannot be interrupted"
        );
    }

    /// Dispatch one closure to the worker under the policy timeout.
    pub(crate) async fn call<T, F>(&self, operation: &'static str, f: F) -> Result<T, JvLinkError>
    where
        T: Send + 'static,
        F: FnOnce(&mut C) -> T + Send + 'static,
    {
        self.check_poisoned()?;
        let submitted = self.inner.dispatcher.submit(operation, f);
        match timeout(self.inner.policy.call_timeout, submitted.wait()).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => {
                Err(NativeFailure::unexpected("dispatcher worker terminated").into())
            }
            Err(_) => {
                self.poison(operation);
                Err(NativeFailure::timeout(operation).into())
            }
        }
    }

    /// Try to take the operation gate without queueing.
    pub(crate) fn try_acquire(&self) -> Result<OwnedSemaphorePermit, JvLinkError> {
        Arc::clone(&self.inner.gate).try_acquire_owned().map_err(|_| {
            NativeFailure::invalid_state("another operation is in flight on this session").into()
        })
    }

    /// Run `init` (and apply configured properties) once per session.
    pub(crate) async fn ensure_init(&self) -> Result<(), JvLinkError> {
        if self.inner.initialised.load(Ordering::Acquire) {
            return Ok(());
        }
        let config = self.config();
        let sid = config.sid.clone();
        self.call("init", move |c| c.init(&sid)).await??;
        if let Some(key) = config.service_key {
            self.call("set_service_key", move |c| {
                c.set_property(Property::ServiceKey, PropertyValue::Text(key))
            })
            .await??;
        }
        if let Some(path) = config.save_path {
            self.call("set_save_path", move |c| {
                c.set_property(Property::SavePath, PropertyValue::Text(path))
            })
            .await??;
        }
        if config.save_flag {
            self.call("set_save_flag", move |c| {
                c.set_property(Property::SaveFlag, PropertyValue::Flag(true))
            })
            .await??;
        }
        self.inner.initialised.store(true, Ordering::Release);
        debug!(sid = %self.config().sid, "native client initialised");
        Ok(())
    }

    pub(crate) async fn open_stored(
        &self,
        request: OpenRequest,
    ) -> Result<OpenSummary, JvLinkError> {
        self.set_state(SessionState::Opening);
        let spec = request.spec.clone();
        let result = self.call("open", move |c| c.open(&request)).await;
        self.finish_open(&spec, result)
    }

    pub(crate) async fn open_realtime_session(
        &self,
        spec: String,
        key: String,
    ) -> Result<OpenSummary, JvLinkError> {
        self.set_state(SessionState::Opening);
        let spec_for_log = spec.clone();
        let result = self
            .call("open_realtime", move |c| c.open_realtime(&spec, &key))
            .await;
        self.finish_open(&spec_for_log, result)
    }

    fn finish_open(
        &self,
        spec: &str,
        result: Result<Result<OpenSummary, NativeFailure>, JvLinkError>,
    ) -> Result<OpenSummary, JvLinkError> {
        match result {
            Ok(Ok(summary)) => {
                self.set_state(if summary.has_data {
                    SessionState::OpenWithData
                } else {
                    SessionState::OpenEmpty
                });
                info!(
                    spec,
                    has_data = summary.has_data,
                    file_count = summary.file_count,
                    pending = summary.pending_download_count,
                    "session opened"
                );
                Ok(summary)
            }
            Ok(Err(failure)) => {
                self.set_state(SessionState::Idle);
                Err(failure.into())
            }
            Err(err) => Err(err),
        }
    }

    pub(crate) async fn close_session(&self) -> Result<(), JvLinkError> {
        self.set_state(SessionState::Closing);
        self.call("close", |c| c.close()).await?;
        self.set_state(SessionState::Closed);
        debug!("session closed");
        Ok(())
    }

    /// Best-effort close for drop paths: fire the close on the worker and
    /// do not wait for it.
    pub(crate) fn close_detached(&self) {
        if self.is_poisoned() {
            return;
        }
        self.set_state(SessionState::Closing);
        drop(self.inner.dispatcher.submit("close", |c| c.close()));
        self.set_state(SessionState::Closed);
    }

    fn cancelled(cancel: &Option<watch::Receiver<bool>>) -> bool {
        cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Cancellable sleep; observes the token while waiting.
    pub(crate) async fn pause(
        &self,
        duration: Duration,
        cancel: &mut Option<watch::Receiver<bool>>,
    ) -> Result<(), JvLinkError> {
        let Some(rx) = cancel else {
            sleep(duration).await;
            return Ok(());
        };
        if *rx.borrow() {
            return Err(JvLinkError::Cancelled);
        }
        let outcome = timeout(duration, async {
            while rx.changed().await.is_ok() {
                if *rx.borrow() {
                    return true;
                }
            }
            false
        })
        .await;
        match outcome {
            Ok(true) => Err(JvLinkError::Cancelled),
            // The cancel source went away; nothing can cancel us any more,
            // so just finish the wait.
            Ok(false) => {
                sleep(duration).await;
                Ok(())
            }
            Err(_elapsed) => Ok(()),
        }
    }

    /// One step of the read loop: the next non-empty payload, or `None` at
    /// end-of-stream. Handles file boundaries, pending downloads, retries,
    /// and skip resolution.
    pub(crate) async fn pull_next(
        &self,
        cancel: &mut Option<watch::Receiver<bool>>,
        pending_delay: Duration,
    ) -> Result<Option<Payload>, JvLinkError> {
        self.set_state(SessionState::Draining);
        let mut attempt: u32 = 0;
        loop {
            if Self::cancelled(cancel) {
                return Err(JvLinkError::Cancelled);
            }
            let use_gets = self.config().use_gets_fast_path;
            let outcome = self
                .call("read", move |c| if use_gets { c.gets() } else { c.read() })
                .await?;
            match outcome {
                Ok(ReadOutcome::EndOfStream) => return Ok(None),
                Ok(ReadOutcome::FileBoundary) => continue,
                Ok(ReadOutcome::DownloadPending) => {
                    self.pause(pending_delay, cancel).await?;
                }
                Ok(ReadOutcome::Payload(payload)) => {
                    // Empty payloads are discarded silently.
                    if payload.data.is_empty() {
                        continue;
                    }
                    return Ok(Some(payload));
                }
                Err(failure) if failure.is_recoverable_by_skip() => {
                    if attempt < self.inner.policy.read_retries {
                        attempt += 1;
                        // Linear backoff before re-reading the artefact.
                        self.pause(self.inner.policy.retry_backoff * attempt, cancel)
                            .await?;
                    } else {
                        warn!(
                            code = failure.code().unwrap_or_default(),
                            "artefact still unusable after retries, skipping it"
                        );
                        match self.call("skip", |c| c.skip()).await? {
                            Ok(()) => attempt = 0,
                            Err(skip_failure) => {
                                error!(
                                    %skip_failure,
                                    "skip failed; surfacing the original read error"
                                );
                                return Err(failure.into());
                            }
                        }
                    }
                }
                Err(failure) => return Err(failure.into()),
            }
        }
    }

    async fn fetch_inner(
        &self,
        request: OpenRequest,
        mut cancel: Option<watch::Receiver<bool>>,
    ) -> Result<(Vec<Payload>, u64), JvLinkError> {
        request.validate().map_err(JvLinkError::validation)?;
        let _permit = self.try_acquire()?;
        self.ensure_init().await?;
        let summary = self.open_stored(request).await?;
        if !summary.has_data {
            self.close_session().await?;
            return Ok((Vec::new(), 0));
        }
        let mut payloads = Vec::new();
        let mut bytes: u64 = 0;
        let pending_delay = self.inner.policy.download_pending_delay;
        loop {
            match self.pull_next(&mut cancel, pending_delay).await {
                Ok(Some(payload)) => {
                    bytes += payload.data.len() as u64;
                    payloads.push(payload);
                }
                Ok(None) => {
                    self.close_session().await?;
                    info!(payloads = payloads.len(), bytes, "fetch complete");
                    return Ok((payloads, bytes));
                }
                Err(err) => {
                    // A session that opened must close, unless poisoned.
                    if !self.is_poisoned() {
                        let _ = self.close_session().await;
                    }
                    return Err(err);
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Eager fetch surface
    // -----------------------------------------------------------------------

    /// Open a session, read every payload into memory, close.
    pub async fn fetch_all(&self, request: OpenRequest) -> Result<Vec<Payload>, JvLinkError> {
        self.fetch_inner(request, None).await.map(|(p, _)| p)
    }

    /// [`JvLink::fetch_all`] with cooperative cancellation, observed between
    /// reads and during sleeps.
    pub async fn fetch_all_cancellable(
        &self,
        request: OpenRequest,
        cancel: watch::Receiver<bool>,
    ) -> Result<Vec<Payload>, JvLinkError> {
        self.fetch_inner(request, Some(cancel)).await.map(|(p, _)| p)
    }

    /// [`JvLink::fetch_all`] plus the total payload byte count.
    pub async fn fetch_all_with_read_size(
        &self,
        request: OpenRequest,
    ) -> Result<(Vec<Payload>, u64), JvLinkError> {
        self.fetch_inner(request, None).await
    }

    pub async fn fetch_all_with_read_size_cancellable(
        &self,
        request: OpenRequest,
        cancel: watch::Receiver<bool>,
    ) -> Result<(Vec<Payload>, u64), JvLinkError> {
        self.fetch_inner(request, Some(cancel)).await
    }

    // -----------------------------------------------------------------------
    // Streaming surface
    // -----------------------------------------------------------------------

    /// Lazy pull stream. Initialises and opens on the first pull; closes on
    /// exhaustion or drop.
    pub fn stream(&self, request: OpenRequest) -> PayloadStream<C> {
        PayloadStream::new(
            self.clone(),
            StreamTarget::Stored(request),
            None,
            self.inner.policy.download_pending_delay,
            false,
        )
    }

    /// [`JvLink::stream`] with a poll interval for pending downloads and a
    /// cancellation token. Cancellation terminates the stream gracefully.
    pub fn stream_cancellable(
        &self,
        request: OpenRequest,
        poll_interval: Duration,
        cancel: watch::Receiver<bool>,
    ) -> PayloadStream<C> {
        PayloadStream::new(
            self.clone(),
            StreamTarget::Stored(request),
            Some(cancel),
            poll_interval,
            false,
        )
    }

    /// Realtime snapshot stream: drains one `open_realtime` session.
    pub fn stream_realtime(&self, spec: impl Into<String>, key: impl Into<String>) -> PayloadStream<C> {
        PayloadStream::new(
            self.clone(),
            StreamTarget::Realtime {
                spec: spec.into(),
                key: key.into(),
            },
            None,
            self.inner.policy.download_pending_delay,
            false,
        )
    }

    /// Realtime stream that keeps polling at end-of-stream until the token
    /// cancels it.
    pub fn stream_realtime_cancellable(
        &self,
        spec: impl Into<String>,
        key: impl Into<String>,
        poll_interval: Duration,
        cancel: watch::Receiver<bool>,
    ) -> PayloadStream<C> {
        PayloadStream::new(
            self.clone(),
            StreamTarget::Realtime {
                spec: spec.into(),
                key: key.into(),
            },
            Some(cancel),
            poll_interval,
            true,
        )
    }

    // -----------------------------------------------------------------------
    // Typed fetch surface
    // -----------------------------------------------------------------------

    /// Fetch and parse into typed records; the first malformed record fails
    /// the batch.
    pub async fn fetch_typed_records(
        &self,
        request: OpenRequest,
    ) -> Result<Vec<ParsedRecord>, JvLinkError> {
        let payloads = self.fetch_all(request).await?;
        let raw: Vec<Vec<u8>> = payloads.into_iter().map(|p| p.data).collect();
        jvdata_core::parse_all(&raw).map_err(|e| JvLinkError::validation(e.to_string()))
    }

    /// Fetch and parse, collecting malformed records instead of failing.
    pub async fn fetch_typed_records_collecting(
        &self,
        request: OpenRequest,
    ) -> Result<(Vec<ParsedRecord>, Vec<(usize, RecordError)>), JvLinkError> {
        let payloads = self.fetch_all(request).await?;
        let raw: Vec<Vec<u8>> = payloads.into_iter().map(|p| p.data).collect();
        Ok(jvdata_core::parse_collecting(&raw))
    }

    // -----------------------------------------------------------------------
    // Pass-through wrappers
    // -----------------------------------------------------------------------

    async fn single_call<T, F>(&self, operation: &'static str, f: F) -> Result<T, JvLinkError>
    where
        T: Send + 'static,
        F: FnOnce(&mut C) -> Result<T, NativeFailure> + Send + 'static,
    {
        let _permit = self.try_acquire()?;
        self.ensure_init().await?;
        self.call(operation, f).await?.map_err(Into::into)
    }

    pub async fn get_status(&self) -> Result<i32, JvLinkError> {
        self.single_call("status", |c| c.status()).await
    }

    pub async fn skip_current(&self) -> Result<(), JvLinkError> {
        self.single_call("skip", |c| c.skip()).await
    }

    pub async fn cancel_download(&self) -> Result<(), JvLinkError> {
        self.single_call("cancel", |c| c.cancel()).await
    }

    pub async fn delete_file(&self, name: &str) -> Result<(), JvLinkError> {
        let name = name.to_owned();
        self.single_call("delete_file", move |c| c.delete_file(&name))
            .await
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    pub async fn get_property(&self, property: Property) -> Result<PropertyValue, JvLinkError> {
        if property.access() == PropertyAccess::WriteOnly {
            return Err(JvLinkError::validation(format!(
                "property '{}' is write-only",
                property.name()
            )));
        }
        self.single_call("get_property", move |c| c.get_property(property))
            .await
    }

    /// Like [`JvLink::get_property`], but folds "the backend cannot answer"
    /// (unsupported, wrong state, write-only) into `None`.
    pub async fn try_get_property(
        &self,
        property: Property,
    ) -> Result<Option<PropertyValue>, JvLinkError> {
        if property.access() == PropertyAccess::WriteOnly {
            return Ok(None);
        }
        match self
            .single_call("get_property", move |c| c.get_property(property))
            .await
        {
            Ok(value) => Ok(Some(value)),
            Err(JvLinkError::Native(NativeFailure::Unsupported))
            | Err(JvLinkError::Native(NativeFailure::InvalidState { .. })) => Ok(None),
            Err(other) => Err(other),
        }
    }

    pub async fn set_property(
        &self,
        property: Property,
        value: PropertyValue,
    ) -> Result<(), JvLinkError> {
        if property.access() == PropertyAccess::ReadOnly {
            return Err(JvLinkError::validation(format!(
                "property '{}' is read-only",
                property.name()
            )));
        }
        let for_backend = value.clone();
        self.single_call("set_property", move |c| {
            c.set_property(property, for_backend)
        })
        .await?;
        // Keep the cached config in sync with what the backend accepted.
        let mut config = self.inner.config.lock().unwrap();
        match (property, value) {
            (Property::SaveFlag, PropertyValue::Flag(flag)) => config.save_flag = flag,
            (Property::SavePath, PropertyValue::Text(path)) => config.save_path = Some(path),
            (Property::ServiceKey, PropertyValue::Text(key)) => config.service_key = Some(key),
            _ => {}
        }
        Ok(())
    }

    pub async fn save_flag(&self) -> Result<bool, JvLinkError> {
        expect_flag(self.get_property(Property::SaveFlag).await?)
    }

    pub async fn set_save_flag(&self, save: bool) -> Result<(), JvLinkError> {
        self.set_property(Property::SaveFlag, PropertyValue::Flag(save))
            .await
    }

    pub async fn save_path(&self) -> Result<String, JvLinkError> {
        expect_text(self.get_property(Property::SavePath).await?)
    }

    pub async fn set_save_path(&self, path: impl Into<String>) -> Result<(), JvLinkError> {
        self.set_property(Property::SavePath, PropertyValue::Text(path.into()))
            .await
    }

    pub async fn service_key(&self) -> Result<String, JvLinkError> {
        expect_text(self.get_property(Property::ServiceKey).await?)
    }

    pub async fn set_service_key(&self, key: impl Into<String>) -> Result<(), JvLinkError> {
        self.set_property(Property::ServiceKey, PropertyValue::Text(key.into()))
            .await
    }

    pub async fn set_parent_window_handle(&self, handle: isize) -> Result<(), JvLinkError> {
        self.set_property(Property::ParentWindowHandle, PropertyValue::Handle(handle))
            .await
    }

    pub async fn payoff_dialog_suppressed(&self) -> Result<bool, JvLinkError> {
        expect_flag(self.get_property(Property::PayoffDialogSuppressed).await?)
    }

    pub async fn version(&self) -> Result<String, JvLinkError> {
        expect_text(self.get_property(Property::Version).await?)
    }

    pub async fn total_read_file_size_kb(&self) -> Result<u64, JvLinkError> {
        expect_size(self.get_property(Property::TotalReadFileSizeKb).await?)
    }

    pub async fn current_read_file_size_bytes(&self) -> Result<u64, JvLinkError> {
        expect_size(self.get_property(Property::CurrentReadFileSizeBytes).await?)
    }

    pub async fn current_file_timestamp(&self) -> Result<Option<DateTime<Utc>>, JvLinkError> {
        match self.get_property(Property::CurrentFileTimestamp).await? {
            PropertyValue::Timestamp(ts) => Ok(ts),
            other => Err(unexpected_shape(other)),
        }
    }

    // -----------------------------------------------------------------------
    // Media helpers
    // -----------------------------------------------------------------------

    pub async fn course_diagram(&self, key: &str) -> Result<Vec<u8>, JvLinkError> {
        let key = key.to_owned();
        self.single_call("course_diagram", move |c| c.course_diagram(&key))
            .await
    }

    pub async fn silks_bitmap(&self, key: &str) -> Result<Vec<u8>, JvLinkError> {
        let key = key.to_owned();
        self.single_call("silks_bitmap", move |c| c.silks_bitmap(&key))
            .await
    }

    pub async fn silks_bitmap_file(&self, key: &str) -> Result<String, JvLinkError> {
        let key = key.to_owned();
        self.single_call("silks_bitmap_file", move |c| c.silks_bitmap_file(&key))
            .await
    }

    pub async fn movie_check(&self, movie_type: MovieType, key: &str) -> Result<bool, JvLinkError> {
        let key = key.to_owned();
        self.single_call("movie_check", move |c| c.movie_check(movie_type, &key))
            .await
    }

    pub async fn movie_play(&self, movie_type: MovieType, key: &str) -> Result<(), JvLinkError> {
        let key = key.to_owned();
        self.single_call("movie_play", move |c| c.movie_play(movie_type, &key))
            .await
    }

    /// Open the movie listing, read every workout listing line, close.
    pub async fn fetch_workout_videos(
        &self,
        movie_type: MovieType,
        search_key: &str,
    ) -> Result<Vec<WorkoutListing>, JvLinkError> {
        let _permit = self.try_acquire()?;
        self.ensure_init().await?;
        self.set_state(SessionState::Opening);
        let key = search_key.to_owned();
        match self
            .call("movie_open", move |c| c.movie_open(movie_type, &key))
            .await?
        {
            Ok(summary) => self.set_state(if summary.has_data {
                SessionState::OpenWithData
            } else {
                SessionState::OpenEmpty
            }),
            Err(failure) => {
                self.set_state(SessionState::Idle);
                return Err(failure.into());
            }
        }
        let mut listings = Vec::new();
        loop {
            match self.call("movie_read", |c| c.movie_read()).await? {
                Ok(Some(line)) => match WorkoutListing::parse(&line) {
                    Ok(listing) => listings.push(listing),
                    Err(reason) => warn!(%line, reason, "skipping unparsable workout listing"),
                },
                Ok(None) => break,
                Err(failure) => {
                    if !self.is_poisoned() {
                        let _ = self.close_session().await;
                    }
                    return Err(failure.into());
                }
            }
        }
        self.close_session().await?;
        Ok(listings)
    }

    // -----------------------------------------------------------------------
    // Watch events
    // -----------------------------------------------------------------------

    /// Subscribe to watch events. Safe before `start_watch_events`; items
    /// only flow while the pump is running.
    pub fn watch_events(&self) -> broadcast::Receiver<EventItem> {
        self.inner.events.subscribe()
    }

    /// Watch events as a `futures` stream.
    pub fn watch_event_stream(&self) -> BroadcastStream<EventItem> {
        BroadcastStream::new(self.inner.events.subscribe())
    }

    /// Begin delivering watch events. Idempotent: a second call while
    /// running (or starting) is a no-op and returns `Ok(false)`.
    pub async fn start_watch_events(&self) -> Result<bool, JvLinkError> {
        self.check_poisoned()?;
        if !self.inner.events.begin_start() {
            return Ok(false);
        }
        let registered: Result<(), JvLinkError> = async {
            self.ensure_init().await?;
            let sink: EventSink = self.inner.events.open_queue();
            self.call("watch_event", move |c| c.watch_event(sink))
                .await??;
            Ok(())
        }
        .await;
        match registered {
            Err(err) => {
                // Failed start: back out fully.
                self.inner.events.mark_stopped();
                self.inner.events.teardown_queue();
                Err(err)
            }
            Ok(()) => {
                if self.inner.events.finish_start() {
                    info!("watch events running");
                    Ok(true)
                } else {
                    // A concurrent stop won the race while we were starting:
                    // undo the native registration and dispose the queue.
                    let _ = self
                        .call("watch_event_close", |c| c.watch_event_close())
                        .await;
                    self.inner.events.teardown_queue();
                    Ok(false)
                }
            }
        }
    }

    /// Stop delivering watch events. The native subscription is closed
    /// before the queue completes, so no callback races the teardown.
    pub async fn stop_watch_events(&self) -> Result<(), JvLinkError> {
        match self.inner.events.mark_stopped() {
            PumpState::Running => {
                let _ = self
                    .call("watch_event_close", |c| c.watch_event_close())
                    .await;
                self.inner.events.teardown_queue();
                info!("watch events stopped");
                Ok(())
            }
            // The starter observes the flag flip and cleans up itself; the
            // native subscription was not established yet.
            PumpState::Starting => Ok(()),
            PumpState::Stopped => Ok(()),
        }
    }
}

impl<C: JvLinkClient> Drop for SessionInner<C> {
    fn drop(&mut self) {
        // Shutdown sequence: stop events first, complete the FIFO, then the
        // dispatcher field's Drop tears the worker down (bounded join, or
        // abandoned when poisoned).
        let prior = self.events.mark_stopped();
        if prior == PumpState::Running && !self.poisoned_flag.load(Ordering::Acquire) {
            drop(
                self.dispatcher
                    .submit("watch_event_close", |c| {
                        let _ = c.watch_event_close();
                    }),
            );
        }
        self.events.teardown_queue();
    }
}

// ---------------------------------------------------------------------------
// Property value shapes
// ---------------------------------------------------------------------------

fn unexpected_shape(value: PropertyValue) -> JvLinkError {
    NativeFailure::unexpected(format!("property returned an unexpected shape: {value:?}")).into()
}

fn expect_flag(value: PropertyValue) -> Result<bool, JvLinkError> {
    match value {
        PropertyValue::Flag(flag) => Ok(flag),
        other => Err(unexpected_shape(other)),
    }
}

fn expect_text(value: PropertyValue) -> Result<String, JvLinkError> {
    match value {
        PropertyValue::Text(text) => Ok(text),
        other => Err(unexpected_shape(other)),
    }
}

fn expect_size(value: PropertyValue) -> Result<u64, JvLinkError> {
    match value {
        PropertyValue::Size(size) => Ok(size),
        other => Err(unexpected_shape(other)),
    }
}
