//! Lazy payload streams.
//!
//! [`PayloadStream`] is a pull-style async iterator: nothing touches the
//! native layer until the first `next().await`, which acquires the session
//! gate, initialises, and opens. Exhaustion closes the session; so does
//! dropping the stream mid-drain (detached close on the worker, since drop
//! cannot await). Cancellation terminates the stream gracefully -- the
//! session closes and the stream ends without an error item.

use crate::contract::{JvLinkClient, OpenRequest, Payload};
use crate::error::JvLinkError;
use crate::session::JvLink;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, watch};

pub(crate) enum StreamTarget {
    Stored(OpenRequest),
    Realtime { spec: String, key: String },
}

enum Phase {
    NotStarted,
    Draining,
    Finished,
}

/// A lazy stream of payloads from one session.
pub struct PayloadStream<C: JvLinkClient> {
    session: JvLink<C>,
    target: Option<StreamTarget>,
    permit: Option<OwnedSemaphorePermit>,
    cancel: Option<watch::Receiver<bool>>,
    pending_delay: Duration,
    /// Realtime polling mode: at end-of-stream, sleep and read again until
    /// cancelled instead of closing.
    poll_at_end: bool,
    phase: Phase,
}

impl<C: JvLinkClient> PayloadStream<C> {
    pub(crate) fn new(
        session: JvLink<C>,
        target: StreamTarget,
        cancel: Option<watch::Receiver<bool>>,
        pending_delay: Duration,
        poll_at_end: bool,
    ) -> PayloadStream<C> {
        PayloadStream {
            session,
            target: Some(target),
            permit: None,
            cancel,
            pending_delay,
            poll_at_end,
            phase: Phase::NotStarted,
        }
    }

    /// Pull the next payload. `None` means the stream ended and the session
    /// is closed; after an `Err` item the stream is also finished.
    pub async fn next(&mut self) -> Option<Result<Payload, JvLinkError>> {
        loop {
            match self.phase {
                Phase::Finished => return None,
                Phase::NotStarted => match self.start().await {
                    Ok(true) => self.phase = Phase::Draining,
                    Ok(false) => {
                        self.phase = Phase::Finished;
                        self.permit = None;
                        return None;
                    }
                    Err(err) => {
                        self.phase = Phase::Finished;
                        self.permit = None;
                        return Some(Err(err));
                    }
                },
                Phase::Draining => {
                    match self
                        .session
                        .pull_next(&mut self.cancel, self.pending_delay)
                        .await
                    {
                        Ok(Some(payload)) => return Some(Ok(payload)),
                        Ok(None) => {
                            if self.poll_at_end {
                                // Realtime: idle at end-of-stream until the
                                // token cancels us.
                                match self
                                    .session
                                    .pause(self.pending_delay, &mut self.cancel)
                                    .await
                                {
                                    Ok(()) => continue,
                                    Err(_) => return self.finish(true).await,
                                }
                            }
                            return self.finish(false).await;
                        }
                        // Graceful termination on cancellation: close, end,
                        // no error item.
                        Err(JvLinkError::Cancelled) => return self.finish(true).await,
                        Err(err) => {
                            self.close_quietly().await;
                            self.phase = Phase::Finished;
                            self.permit = None;
                            return Some(Err(err));
                        }
                    }
                }
            }
        }
    }

    /// Adapt into a `futures` [`futures_util::Stream`].
    pub fn into_stream(self) -> impl futures_util::Stream<Item = Result<Payload, JvLinkError>> {
        futures_util::stream::unfold(self, |mut stream| async move {
            stream.next().await.map(|item| (item, stream))
        })
    }

    /// First-pull setup: gate, init, open. `Ok(false)` means the server
    /// reported no data (session already closed) or we were cancelled
    /// before opening.
    async fn start(&mut self) -> Result<bool, JvLinkError> {
        if self
            .cancel
            .as_ref()
            .is_some_and(|rx| *rx.borrow())
        {
            return Ok(false);
        }
        let target = match self.target.take() {
            Some(target) => target,
            None => return Ok(false),
        };
        if let StreamTarget::Stored(request) = &target {
            request.validate().map_err(JvLinkError::validation)?;
        }
        self.permit = Some(self.session.try_acquire()?);
        self.session.ensure_init().await?;
        let summary = match target {
            StreamTarget::Stored(request) => self.session.open_stored(request).await?,
            StreamTarget::Realtime { spec, key } => {
                self.session.open_realtime_session(spec, key).await?
            }
        };
        if !summary.has_data {
            self.session.close_session().await?;
            return Ok(false);
        }
        Ok(true)
    }

    /// Close and end the stream. `quiet` swallows close errors (cancelled
    /// paths); otherwise a close failure surfaces as the final item.
    async fn finish(&mut self, quiet: bool) -> Option<Result<Payload, JvLinkError>> {
        self.phase = Phase::Finished;
        let closed = if self.session.is_poisoned() {
            Ok(())
        } else {
            self.session.close_session().await
        };
        self.permit = None;
        match closed {
            Err(err) if !quiet => Some(Err(err)),
            _ => None,
        }
    }

    async fn close_quietly(&mut self) {
        if !self.session.is_poisoned() {
            let _ = self.session.close_session().await;
        }
    }
}

impl<C: JvLinkClient> Drop for PayloadStream<C> {
    fn drop(&mut self) {
        // Abandoned mid-drain: the session still has to close. Drop cannot
        // await, so fire a detached close on the worker.
        if matches!(self.phase, Phase::Draining) {
            self.session.close_detached();
        }
        // Release the gate only after the close is queued, so the next
        // operation's calls land behind it in the worker's FIFO.
        drop(self.permit.take());
    }
}
