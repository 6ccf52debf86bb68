//! Blocking facade.
//!
//! Wraps the async orchestrator with an owned current-thread runtime so the
//! synchronous and asynchronous surfaces run the exact same state machine
//! and produce identical sequences. The sync stream has no cancellation
//! token by design: callers stop by dropping the iterator, which closes the
//! session.

use crate::config::JvLinkConfig;
use crate::contract::{JvLinkClient, MovieType, OpenRequest, Payload, Property, PropertyValue};
use crate::error::{JvLinkError, NativeFailure};
use crate::events::EventItem;
use crate::session::{self, SessionPolicy, SessionState, WorkoutListing};
use crate::stream::PayloadStream;
use jvdata_core::RecordError;
use jvdata_core::records::ParsedRecord;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio::sync::broadcast;

/// Synchronous session orchestrator.
pub struct JvLink<C: JvLinkClient> {
    inner: session::JvLink<C>,
    rt: Arc<Runtime>,
}

impl<C: JvLinkClient> JvLink<C> {
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
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| NativeFailure::unexpected(format!("failed to build runtime: {e}")))?;
        Ok(JvLink {
            inner: session::JvLink::with_policy(config, policy, factory)?,
            rt: Arc::new(rt),
        })
    }

    /// The async orchestrator behind this facade.
    pub fn as_async(&self) -> &session::JvLink<C> {
        &self.inner
    }

    pub fn session_state(&self) -> SessionState {
        self.inner.session_state()
    }

    pub fn is_poisoned(&self) -> bool {
        self.inner.is_poisoned()
    }

    pub fn fetch_all(&self, request: OpenRequest) -> Result<Vec<Payload>, JvLinkError> {
        self.rt.block_on(self.inner.fetch_all(request))
    }

    pub fn fetch_all_with_read_size(
        &self,
        request: OpenRequest,
    ) -> Result<(Vec<Payload>, u64), JvLinkError> {
        self.rt.block_on(self.inner.fetch_all_with_read_size(request))
    }

    pub fn fetch_typed_records(
        &self,
        request: OpenRequest,
    ) -> Result<Vec<ParsedRecord>, JvLinkError> {
        self.rt.block_on(self.inner.fetch_typed_records(request))
    }

    pub fn fetch_typed_records_collecting(
        &self,
        request: OpenRequest,
    ) -> Result<(Vec<ParsedRecord>, Vec<(usize, RecordError)>), JvLinkError> {
        self.rt
            .block_on(self.inner.fetch_typed_records_collecting(request))
    }

    /// Lazy pull iterator; opens on the first `next()`, closes on
    /// exhaustion or drop.
    pub fn stream(&self, request: OpenRequest) -> PayloadIter<C> {
        PayloadIter {
            rt: Arc::clone(&self.rt),
            stream: self.inner.stream(request),
        }
    }

    pub fn stream_realtime(
        &self,
        spec: impl Into<String>,
        key: impl Into<String>,
    ) -> PayloadIter<C> {
        PayloadIter {
            rt: Arc::clone(&self.rt),
            stream: self.inner.stream_realtime(spec, key),
        }
    }

    pub fn get_status(&self) -> Result<i32, JvLinkError> {
        self.rt.block_on(self.inner.get_status())
    }

    pub fn skip_current(&self) -> Result<(), JvLinkError> {
        self.rt.block_on(self.inner.skip_current())
    }

    pub fn cancel_download(&self) -> Result<(), JvLinkError> {
        self.rt.block_on(self.inner.cancel_download())
    }

    pub fn delete_file(&self, name: &str) -> Result<(), JvLinkError> {
        self.rt.block_on(self.inner.delete_file(name))
    }

    pub fn get_property(&self, property: Property) -> Result<PropertyValue, JvLinkError> {
        self.rt.block_on(self.inner.get_property(property))
    }

    pub fn try_get_property(
        &self,
        property: Property,
    ) -> Result<Option<PropertyValue>, JvLinkError> {
        self.rt.block_on(self.inner.try_get_property(property))
    }

    pub fn set_property(
        &self,
        property: Property,
        value: PropertyValue,
    ) -> Result<(), JvLinkError> {
        self.rt.block_on(self.inner.set_property(property, value))
    }

    pub fn version(&self) -> Result<String, JvLinkError> {
        self.rt.block_on(self.inner.version())
    }

    pub fn fetch_workout_videos(
        &self,
        movie_type: MovieType,
        search_key: &str,
    ) -> Result<Vec<WorkoutListing>, JvLinkError> {
        self.rt
            .block_on(self.inner.fetch_workout_videos(movie_type, search_key))
    }

    pub fn start_watch_events(&self) -> Result<bool, JvLinkError> {
        self.rt.block_on(self.inner.start_watch_events())
    }

    pub fn stop_watch_events(&self) -> Result<(), JvLinkError> {
        self.rt.block_on(self.inner.stop_watch_events())
    }

    /// Subscribe to watch events; use `blocking_recv` on the receiver.
    pub fn watch_events(&self) -> broadcast::Receiver<EventItem> {
        self.inner.watch_events()
    }
}

/// Synchronous pull iterator over one session's payloads.
pub struct PayloadIter<C: JvLinkClient> {
    rt: Arc<Runtime>,
    stream: PayloadStream<C>,
}

impl<C: JvLinkClient> Iterator for PayloadIter<C> {
    type Item = Result<Payload, JvLinkError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rt.block_on(self.stream.next())
    }
}
