// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Backend that records appends in memory and can be told to fail.
struct FakeBackend {
    appended: StdMutex<Vec<(u8, String, String)>>,
    fail: AtomicBool,
    closed: AtomicBool,
}

impl FakeBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            appended: StdMutex::new(Vec::new()),
            fail: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn append(&self, event: PendingEvent) -> Result<(), LoggerError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(LoggerError::Stopped);
        }
        self.appended
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((event.kind.code(), event.key, event.value));
        Ok(())
    }

    async fn close(&self) -> Result<(), LoggerError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn run_loop_dispatches_events_and_closes_on_shutdown() {
    let channels = Arc::new(Channels::new());
    let backend = FakeBackend::new();

    let handle = {
        let channels = Arc::clone(&channels);
        let backend: Arc<dyn Backend> = backend.clone();
        tokio::spawn(async move { run_loop(&channels, backend).await })
    };

    channels.enqueue(pending_put("a", "1")).await.unwrap();
    channels.enqueue(pending_delete("a")).await.unwrap();
    channels.stop().await;
    handle.await.unwrap();

    let appended = backend.appended.lock().unwrap();
    assert_eq!(appended.len(), 2);
    assert_eq!(appended[0], (1, "a".to_string(), "1".to_string()));
    assert_eq!(appended[1], (0, "a".to_string(), String::new()));
    assert!(backend.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn enqueue_after_shutdown_fails() {
    let channels = Arc::new(Channels::new());
    let backend = FakeBackend::new();

    let handle = {
        let channels = Arc::clone(&channels);
        let backend: Arc<dyn Backend> = backend;
        tokio::spawn(async move { run_loop(&channels, backend).await })
    };

    channels.stop().await;
    handle.await.unwrap();

    let result = channels.enqueue(pending_put("a", "1")).await;
    assert!(matches!(result, Err(LoggerError::Stopped)));
}

#[tokio::test]
async fn append_failures_reach_the_error_stream_not_the_enqueuer() {
    let channels = Arc::new(Channels::new());
    let backend = FakeBackend::new();
    backend.fail.store(true, Ordering::SeqCst);
    let mut errors = channels.take_errors().unwrap();

    let handle = {
        let channels = Arc::clone(&channels);
        let backend: Arc<dyn Backend> = backend;
        tokio::spawn(async move { run_loop(&channels, backend).await })
    };

    // The enqueue itself succeeds; the failure is asynchronous
    channels.enqueue(pending_put("a", "1")).await.unwrap();
    channels.stop().await;
    handle.await.unwrap();

    assert!(errors.recv().await.is_some());
}

#[tokio::test]
async fn second_run_loop_is_a_no_op() {
    let channels = Arc::new(Channels::new());
    let backend = FakeBackend::new();

    let first = {
        let channels = Arc::clone(&channels);
        let backend: Arc<dyn Backend> = backend.clone();
        tokio::spawn(async move { run_loop(&channels, backend).await })
    };
    channels.stop().await;
    first.await.unwrap();

    // Handles are gone; a second loop must return immediately
    let backend: Arc<dyn Backend> = backend;
    run_loop(&channels, backend).await;
}

#[tokio::test]
async fn full_queue_applies_back_pressure() {
    let channels = Channels::new();

    // No run loop draining: fill the queue to its bound
    for i in 0..EVENT_QUEUE_DEPTH {
        channels
            .enqueue(pending_put(&format!("k{i}"), "v"))
            .await
            .unwrap();
    }

    // The next enqueue blocks rather than erroring or dropping
    let blocked = tokio::time::timeout(
        Duration::from_millis(50),
        channels.enqueue(pending_put("overflow", "v")),
    )
    .await;
    assert!(blocked.is_err());
}

#[tokio::test]
async fn error_stream_is_taken_once() {
    let channels = Channels::new();

    assert!(channels.take_errors().is_some());
    assert!(channels.take_errors().is_none());
}
