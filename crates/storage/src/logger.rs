// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transaction logger contract and shared run-loop plumbing
//!
//! The write path is asynchronous: `write_put`/`write_delete` place an event
//! on a bounded queue and return. A background run loop dequeues events and
//! dispatches each append as its own task; failures surface on a separate
//! error stream, never to the enqueuing caller. Shutdown stops dequeuing,
//! drains in-flight appends, and closes the backing medium.

use async_trait::async_trait;
use okv_core::{Event, EventKind};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::warn;

/// Depth of the internal event queue. Producers block when it is full.
pub const EVENT_QUEUE_DEPTH: usize = 16;

/// Depth of the replay event channel.
pub(crate) const REPLAY_QUEUE_DEPTH: usize = 16;

/// Errors produced by the transaction log.
#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    #[error("transaction log I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transaction log database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord { line: u64, reason: String },

    #[error("transaction numbers are out of sequence (last seen {last}, found {found})")]
    OutOfSequence { last: u64, found: u64 },

    #[error("transaction logger is stopped")]
    Stopped,
}

/// Contract implemented by every log backend.
///
/// `run()` must be started exactly once before any enqueued event is
/// guaranteed to reach durable storage, and replay (`read_events`) must be
/// consumed before `run()` starts.
#[async_trait]
pub trait TransactionLogger: Send + Sync {
    /// Enqueue a Put event. Returns once the event is accepted onto the
    /// internal queue; blocks only when the queue is full. Fails only after
    /// the logger has been stopped.
    async fn write_put(&self, key: &str, value: &str) -> Result<(), LoggerError>;

    /// Enqueue a Delete event, same semantics as [`write_put`].
    ///
    /// [`write_put`]: TransactionLogger::write_put
    async fn write_delete(&self, key: &str) -> Result<(), LoggerError>;

    /// Take the asynchronous write-failure stream.
    ///
    /// Persistence failures that occur after an enqueue already returned
    /// success are only ever reported here. The stream can be taken once;
    /// later calls return `None`.
    fn errors(&self) -> Option<mpsc::UnboundedReceiver<LoggerError>>;

    /// One-shot ordered replay of everything persisted so far.
    ///
    /// Events arrive in ascending sequence order, oldest first. Both channels
    /// close when the medium is exhausted. A record whose sequence is not
    /// strictly greater than the last one emitted produces a single
    /// sequencing error and terminates the replay early.
    fn read_events(&self) -> (mpsc::Receiver<Event>, mpsc::Receiver<LoggerError>);

    /// Start the background persistence loop on its own task and return a
    /// handle to it. The loop runs until shutdown is requested.
    fn run(&self) -> tokio::task::JoinHandle<()>;

    /// Graceful shutdown: stop accepting enqueues, wait for in-flight
    /// appends, close the medium. The logger is unusable afterwards.
    async fn stop(&self);
}

/// An event accepted onto the queue but not yet sequence-stamped.
#[derive(Debug)]
pub(crate) struct PendingEvent {
    pub kind: EventKind,
    pub key: String,
    pub value: String,
}

/// Persistence primitive implemented per backend.
#[async_trait]
pub(crate) trait Backend: Send + Sync + 'static {
    /// Durably append one event, assigning its sequence number.
    async fn append(&self, event: PendingEvent) -> Result<(), LoggerError>;

    /// Close the backing medium. Called once, after all appends drained.
    async fn close(&self) -> Result<(), LoggerError>;
}

/// Channel plumbing shared by both backends.
///
/// Mirrors the queue/shutdown handshake of the contract: a bounded event
/// queue, an unbounded error stream (append tasks must never block on
/// reporting), a shutdown request slot, and a completion flag `stop()`
/// waits on.
pub(crate) struct Channels {
    event_tx: mpsc::Sender<PendingEvent>,
    event_rx: StdMutex<Option<mpsc::Receiver<PendingEvent>>>,
    error_tx: mpsc::UnboundedSender<LoggerError>,
    error_rx: StdMutex<Option<mpsc::UnboundedReceiver<LoggerError>>>,
    shutdown_tx: mpsc::Sender<()>,
    shutdown_rx: StdMutex<Option<mpsc::Receiver<()>>>,
    done_tx: watch::Sender<bool>,
    done_rx: watch::Receiver<bool>,
}

impl Channels {
    pub(crate) fn new() -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let (error_tx, error_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let (done_tx, done_rx) = watch::channel(false);

        Self {
            event_tx,
            event_rx: StdMutex::new(Some(event_rx)),
            error_tx,
            error_rx: StdMutex::new(Some(error_rx)),
            shutdown_tx,
            shutdown_rx: StdMutex::new(Some(shutdown_rx)),
            done_tx,
            done_rx,
        }
    }

    pub(crate) async fn enqueue(&self, event: PendingEvent) -> Result<(), LoggerError> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| LoggerError::Stopped)
    }

    pub(crate) fn take_errors(&self) -> Option<mpsc::UnboundedReceiver<LoggerError>> {
        self.error_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    pub(crate) fn report(&self, error: LoggerError) {
        // Receiver may already be gone during teardown
        let _ = self.error_tx.send(error);
    }

    /// Request shutdown and wait for the run loop to finish draining.
    pub(crate) async fn stop(&self) {
        // A second stop() finds the slot full or the flag already set;
        // either way it only waits.
        let _ = self.shutdown_tx.try_send(());

        let mut done = self.done_rx.clone();
        while !*done.borrow() {
            if done.changed().await.is_err() {
                return;
            }
        }
    }

    fn take_run_handles(&self) -> Option<(mpsc::Receiver<PendingEvent>, mpsc::Receiver<()>)> {
        let event_rx = self
            .event_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()?;
        let shutdown_rx = self
            .shutdown_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()?;
        Some((event_rx, shutdown_rx))
    }
}

/// The persistence loop shared by both backends.
///
/// Waits on whichever is ready first: a newly enqueued event, which is
/// dispatched as an independent append task, or a shutdown request, which
/// stops dequeuing, drains the in-flight appends, and closes the medium.
/// Invoking it a second time (including after `stop()`) is a logged no-op.
pub(crate) async fn run_loop(channels: &Channels, backend: Arc<dyn Backend>) {
    let Some((mut event_rx, mut shutdown_rx)) = channels.take_run_handles() else {
        warn!("transaction logger run loop already started; ignoring");
        return;
    };

    let mut appends: JoinSet<()> = JoinSet::new();

    loop {
        // Biased toward the queue: events accepted before a shutdown request
        // are still dispatched; shutdown is honored once the queue is idle.
        tokio::select! {
            biased;
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                let backend = Arc::clone(&backend);
                let error_tx = channels.error_tx.clone();
                appends.spawn(async move {
                    if let Err(err) = backend.append(event).await {
                        let _ = error_tx.send(err);
                    }
                });
            }
            _ = shutdown_rx.recv() => {
                // Stop accepting new enqueues, then drain in-flight appends.
                event_rx.close();
                while appends.join_next().await.is_some() {}
                if let Err(err) = backend.close().await {
                    channels.report(err);
                }
                let _ = channels.done_tx.send(true);
                break;
            }
        }
    }
}

pub(crate) fn pending_put(key: &str, value: &str) -> PendingEvent {
    PendingEvent {
        kind: EventKind::Put,
        key: key.to_string(),
        value: value.to_string(),
    }
}

pub(crate) fn pending_delete(key: &str) -> PendingEvent {
    PendingEvent {
        kind: EventKind::Delete,
        key: key.to_string(),
        value: String::new(),
    }
}

#[cfg(test)]
#[path = "logger_tests.rs"]
mod tests;
