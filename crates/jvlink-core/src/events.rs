//! The watch-event pump.
//!
//! The native callback fires on the dispatcher worker and must never block
//! the pump, so the sink does a non-blocking enqueue into a bounded FIFO.
//! A dedicated consumer thread drains the FIFO, parses keys into
//! [`WatchEvent`]s, and fans the items out over a broadcast channel; a slow
//! subscriber lags on its own receiver and cannot stall the pump or the
//! other subscribers.
//!
//! When the FIFO is full the sink drops the key and counts it. The consumer
//! converts the pending count into an [`JvLinkError::EventQueueOverflow`]
//! item before the next event, so subscribers observe the backpressure
//! in-stream.
//!
//! Start/stop is driven by the session orchestrator (the native
//! registration has to go through the dispatcher); this type owns the state
//! flag, the queue lifecycle, and the consumer. A completed queue is never
//! reused: every fresh start builds a new one.

use crate::contract::EventSink;
use crate::error::{JvLinkError, NativeFailure};
use chrono::Utc;
use jvdata_core::watch::WatchEvent;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::mpsc::{self, TrySendError};
use std::sync::Mutex;
use std::thread;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Items delivered to subscribers.
pub type EventItem = Result<WatchEvent, JvLinkError>;

const STOPPED: u8 = 0;
const STARTING: u8 = 1;
const RUNNING: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    Stopped,
    Starting,
    Running,
}

fn state_from(raw: u8) -> PumpState {
    match raw {
        STARTING => PumpState::Starting,
        RUNNING => PumpState::Running,
        _ => PumpState::Stopped,
    }
}

struct ActiveQueue {
    ingress_tx: mpsc::SyncSender<String>,
    consumer: thread::JoinHandle<()>,
}

pub struct EventPump {
    state: AtomicU8,
    capacity: usize,
    overflow: Arc<AtomicU64>,
    subscribers: broadcast::Sender<EventItem>,
    active: Mutex<Option<ActiveQueue>>,
}

impl EventPump {
    pub fn new(capacity: usize) -> EventPump {
        let (subscribers, _) = broadcast::channel(1024);
        EventPump {
            state: AtomicU8::new(STOPPED),
            capacity,
            overflow: Arc::new(AtomicU64::new(0)),
            subscribers,
            active: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventItem> {
        self.subscribers.subscribe()
    }

    pub fn state(&self) -> PumpState {
        state_from(self.state.load(Ordering::Acquire))
    }

    /// Try to claim the start: `Stopped -> Starting`. Returns false when a
    /// start already happened (idempotent no-op for the caller).
    pub fn begin_start(&self) -> bool {
        self.state
            .compare_exchange(STOPPED, STARTING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Commit the start: `Starting -> Running`. Returns false when a
    /// concurrent stop already reset the flag; the caller must then undo its
    /// native registration and tear the queue down.
    pub fn finish_start(&self) -> bool {
        self.state
            .compare_exchange(STARTING, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Flip to `Stopped`, reporting what the pump was doing before.
    pub fn mark_stopped(&self) -> PumpState {
        state_from(self.state.swap(STOPPED, Ordering::AcqRel))
    }

    /// Build a fresh bounded queue plus consumer thread and hand back the
    /// sink to register with the native layer.
    ///
    /// The sink only enqueues; every blocking step lives on the consumer.
    pub fn open_queue(&self) -> EventSink {
        let (ingress_tx, ingress_rx) = mpsc::sync_channel::<String>(self.capacity);
        let overflow = Arc::clone(&self.overflow);
        let fanout = self.subscribers.clone();
        let consumer_overflow = Arc::clone(&self.overflow);
        let consumer = thread::Builder::new()
            .name("jvlink-events".to_owned())
            .spawn(move || {
                consume(&ingress_rx, &consumer_overflow, &fanout);
            })
            .expect("failed to spawn event consumer thread");

        let mut active = self.active.lock().unwrap();
        if let Some(stale) = active.replace(ActiveQueue {
            ingress_tx: ingress_tx.clone(),
            consumer,
        }) {
            // Should not happen under the state protocol; drain it anyway.
            drop(stale.ingress_tx);
            let _ = stale.consumer.join();
        }
        drop(active);

        Box::new(move |key: &str| match ingress_tx.try_send(key.to_owned()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                overflow.fetch_add(1, Ordering::AcqRel);
            }
            // Stopped mid-flight; nothing to deliver to any more.
            Err(TrySendError::Disconnected(_)) => {}
        })
    }

    /// Complete and dispose the active queue. The consumer drains what was
    /// already enqueued, then exits.
    pub fn teardown_queue(&self) {
        let taken = self.active.lock().unwrap().take();
        if let Some(queue) = taken {
            drop(queue.ingress_tx);
            if queue.consumer.join().is_err() {
                warn!("event consumer thread panicked during teardown");
            }
        }
    }
}

impl Drop for EventPump {
    fn drop(&mut self) {
        self.teardown_queue();
    }
}

fn consume(
    ingress_rx: &mpsc::Receiver<String>,
    overflow: &AtomicU64,
    fanout: &broadcast::Sender<EventItem>,
) {
    while let Ok(key) = ingress_rx.recv() {
        emit_pending_overflow(overflow, fanout);
        let item = match WatchEvent::try_parse(&key) {
            Ok(mut event) => {
                event.timestamp = Some(Utc::now());
                Ok(event)
            }
            Err(reason) => Err(JvLinkError::Native(NativeFailure::unexpected(format!(
                "watch key '{key}': {reason}"
            )))),
        };
        if fanout.send(item).is_err() {
            debug!("watch event dropped: no active subscribers");
        }
    }
    // Channel completed: report any overflow that happened after the last
    // delivered key, then exit.
    emit_pending_overflow(overflow, fanout);
}

fn emit_pending_overflow(overflow: &AtomicU64, fanout: &broadcast::Sender<EventItem>) {
    let dropped = overflow.swap(0, Ordering::AcqRel);
    if dropped > 0 {
        warn!(dropped, "watch event queue overflowed");
        let _ = fanout.send(Err(JvLinkError::EventQueueOverflow { dropped }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jvdata_core::watch::WatchEventKind;
    use std::time::Duration;

    async fn recv_item(
        rx: &mut broadcast::Receiver<EventItem>,
    ) -> Result<WatchEvent, JvLinkError> {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("pump closed")
    }

    #[tokio::test]
    async fn keys_flow_through_in_fifo_order() {
        let pump = EventPump::new(16);
        assert!(pump.begin_start());
        let sink = pump.open_queue();
        assert!(pump.finish_start());
        let mut rx = pump.subscribe();

        sink("0B11202401010511");
        sink("0B12202401010511");
        sink("0B16202401010511TC");

        let kinds = [
            recv_item(&mut rx).await.unwrap().kind,
            recv_item(&mut rx).await.unwrap().kind,
            recv_item(&mut rx).await.unwrap().kind,
        ];
        assert_eq!(
            kinds,
            [
                WatchEventKind::HorseWeight,
                WatchEventKind::PayoffConfirmed,
                WatchEventKind::StartTimeChange,
            ]
        );
        assert_eq!(pump.mark_stopped(), PumpState::Running);
        pump.teardown_queue();
    }

    #[tokio::test]
    async fn malformed_keys_become_error_items_not_panics() {
        let pump = EventPump::new(16);
        pump.begin_start();
        let sink = pump.open_queue();
        pump.finish_start();
        let mut rx = pump.subscribe();

        sink("bad");
        sink("0B11202401010511");

        let first = recv_item(&mut rx).await;
        assert!(matches!(first, Err(JvLinkError::Native(_))));
        let second = recv_item(&mut rx).await.unwrap();
        assert_eq!(second.kind, WatchEventKind::HorseWeight);
        pump.mark_stopped();
        pump.teardown_queue();
    }

    #[tokio::test]
    async fn events_are_stamped_on_arrival() {
        let pump = EventPump::new(4);
        pump.begin_start();
        let sink = pump.open_queue();
        pump.finish_start();
        let mut rx = pump.subscribe();
        sink("0B11202401010511");
        let event = recv_item(&mut rx).await.unwrap();
        assert!(event.timestamp.is_some());
        pump.mark_stopped();
        pump.teardown_queue();
    }

    #[test]
    fn start_protocol_is_idempotent() {
        let pump = EventPump::new(4);
        assert!(pump.begin_start());
        assert!(!pump.begin_start());
        assert!(pump.finish_start());
        assert!(!pump.begin_start());
        assert_eq!(pump.mark_stopped(), PumpState::Running);
        assert_eq!(pump.mark_stopped(), PumpState::Stopped);
    }

    #[test]
    fn concurrent_stop_during_starting_wins() {
        let pump = EventPump::new(4);
        assert!(pump.begin_start());
        assert_eq!(pump.mark_stopped(), PumpState::Starting);
        // The starter now observes the lost commit and cleans up.
        assert!(!pump.finish_start());
    }

    #[tokio::test]
    async fn overflow_is_counted_and_reported_in_stream() {
        let pump = EventPump::new(2);
        pump.begin_start();

        // Fill the queue before the consumer exists by pre-loading overflow:
        // use a tiny capacity and burst more keys than it holds. The
        // consumer may drain some; at least the surplus beyond capacity+1
        // is dropped and must be reported.
        let sink = pump.open_queue();
        pump.finish_start();
        let mut rx = pump.subscribe();

        for _ in 0..50 {
            sink("0B11202401010511");
        }
        pump.mark_stopped();
        pump.teardown_queue();

        let mut ok_items = 0u32;
        let mut dropped_total = 0u64;
        while let Ok(item) = rx.try_recv() {
            match item {
                Ok(_) => ok_items += 1,
                Err(JvLinkError::EventQueueOverflow { dropped }) => dropped_total += dropped,
                Err(other) => panic!("unexpected error item: {other}"),
            }
        }
        assert!(ok_items >= 2, "at least the queue capacity must deliver");
        assert!(
            u64::from(ok_items) + dropped_total == 50,
            "every key is either delivered or counted as dropped: {ok_items} + {dropped_total}"
        );
    }
}
