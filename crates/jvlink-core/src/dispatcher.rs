//! The apartment-confined dispatcher.
//!
//! The native component must be driven from one thread for its whole life.
//! The dispatcher owns that thread: the backend is *constructed on the
//! worker* by the factory passed to [`Dispatcher::spawn`] (platform
//! apartment setup belongs in that factory) and never leaves it. Submitted
//! closures run one at a time, in submission order, against `&mut C`.
//!
//! There is no way to interrupt a closure once it is running. Callers that
//! time out a submission must treat the worker as lost: mark the dispatcher
//! abandoned so teardown does not join a thread that may never return.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::NativeFailure;

enum Job<C> {
    Run(Box<dyn FnOnce(&mut C) + Send>),
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("dispatcher worker is gone")]
    WorkerGone,
}

/// A submitted closure's pending result.
pub struct Submitted<T> {
    operation: &'static str,
    rx: oneshot::Receiver<T>,
}

impl<T> Submitted<T> {
    /// Wait for the worker to run the closure. Fails only if the worker
    /// terminated before delivering a result.
    pub async fn wait(self) -> Result<T, DispatchError> {
        self.rx.await.map_err(|_| {
            debug!(operation = self.operation, "dispatcher worker gone before completion");
            DispatchError::WorkerGone
        })
    }
}

/// Single-worker dispatcher owning a confined backend instance.
pub struct Dispatcher<C> {
    tx: mpsc::Sender<Job<C>>,
    worker: Option<thread::JoinHandle<()>>,
    join_timeout: Duration,
    abandoned: AtomicBool,
}

impl<C: 'static> Dispatcher<C> {
    /// Spawn the worker and construct the backend on it.
    ///
    /// Construction failures are reported synchronously; the worker exits
    /// and the dispatcher is never returned.
    pub fn spawn<F>(
        thread_name: &str,
        join_timeout: Duration,
        factory: F,
    ) -> Result<Dispatcher<C>, NativeFailure>
    where
        F: FnOnce() -> Result<C, NativeFailure> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<Job<C>>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), NativeFailure>>();
        let worker = thread::Builder::new()
            .name(thread_name.to_owned())
            .spawn(move || {
                // The backend lives and dies on this thread.
                let mut client = match factory() {
                    Ok(client) => {
                        let _ = ready_tx.send(Ok(()));
                        client
                    }
                    Err(failure) => {
                        let _ = ready_tx.send(Err(failure));
                        return;
                    }
                };
                while let Ok(job) = rx.recv() {
                    match job {
                        Job::Run(f) => f(&mut client),
                        Job::Shutdown => break,
                    }
                }
                // client drops here; its Drop releases the native handle.
            })
            .map_err(|e| NativeFailure::unexpected(format!("failed to spawn worker: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Dispatcher {
                tx,
                worker: Some(worker),
                join_timeout,
                abandoned: AtomicBool::new(false),
            }),
            Ok(Err(failure)) => {
                let _ = worker.join();
                Err(failure)
            }
            Err(_) => {
                let _ = worker.join();
                Err(NativeFailure::unexpected(
                    "worker terminated during backend construction",
                ))
            }
        }
    }

    /// Queue a closure for the worker. The result arrives through the
    /// returned [`Submitted`]; dropping it detaches the closure, which still
    /// runs.
    pub fn submit<T, F>(&self, operation: &'static str, f: F) -> Submitted<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut C) -> T + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job = Job::Run(Box::new(move |client: &mut C| {
            // The submitter may have timed out and gone away; that is fine.
            let _ = tx.send(f(client));
        }));
        if self.tx.send(job).is_err() {
            debug!(operation, "submission to a terminated worker");
        }
        Submitted { operation, rx }
    }

    /// Mark the worker as lost after a timed-out call. Teardown will no
    /// longer wait for it; the thread is left to the OS.
    pub fn mark_abandoned(&self) {
        self.abandoned.store(true, Ordering::Release);
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned.load(Ordering::Acquire)
    }
}

impl<C> Drop for Dispatcher<C> {
    fn drop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        if self.abandoned.load(Ordering::Acquire) {
            warn!("dispatcher abandoned; worker left running, resources may leak until exit");
            return;
        }
        let _ = self.tx.send(Job::Shutdown);
        // Bounded join: a healthy worker drains its queue and exits quickly.
        let deadline = Instant::now() + self.join_timeout;
        while !worker.is_finished() {
            if Instant::now() >= deadline {
                warn!("dispatcher worker did not stop within the join timeout; detaching");
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        let _ = worker.join();
    }
}
