// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-backed transaction logger
//!
//! Each event is appended as one delimited record line and fsync'd before the
//! append task finishes. The sequence counter and the file handle live under
//! a single lock, so the order of records on disk always equals sequence
//! order and replay can scan the file front to back.
//!
//! Opening an existing log scans it to resume the counter; the counter does
//! not depend on replay having run.

use crate::logger::{
    pending_delete, pending_put, run_loop, Backend, Channels, LoggerError, PendingEvent,
    REPLAY_QUEUE_DEPTH,
};
use crate::record;
use crate::TransactionLogger;
use async_trait::async_trait;
use okv_core::Event;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// Transaction logger appending to a flat file.
pub struct FileTransactionLogger {
    path: PathBuf,
    channels: Arc<Channels>,
    inner: Arc<FileBackend>,
}

struct FileBackend {
    // Sequence assignment and the append happen under this one lock;
    // `None` after the medium has been closed.
    state: Mutex<Option<FileState>>,
}

struct FileState {
    file: tokio::fs::File,
    sequence: u64,
}

impl FileTransactionLogger {
    /// Open or create a transaction log at the given path.
    ///
    /// Scans any existing records to resume the sequence counter. Fails
    /// synchronously if the file cannot be opened; this is the only
    /// synchronous failure the file backend produces.
    pub fn open(path: &Path) -> Result<Self, LoggerError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let sequence = if path.exists() {
            scan_last_sequence(path)?
        } else {
            0
        };

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            channels: Arc::new(Channels::new()),
            inner: Arc::new(FileBackend {
                state: Mutex::new(Some(FileState {
                    file: tokio::fs::File::from_std(file),
                    sequence,
                })),
            }),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Find the last valid sequence number in an existing log.
///
/// Stops at the first unparsable line (a truncated write); replay reports
/// that corruption properly, the scan only needs the resume point.
fn scan_last_sequence(path: &Path) -> Result<u64, LoggerError> {
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut last = 0;
    for line in reader.lines() {
        let Ok(line) = line else { break };
        if line.is_empty() {
            continue;
        }
        match record::decode(&line) {
            Ok(event) => last = event.sequence,
            Err(_) => break,
        }
    }
    Ok(last)
}

#[async_trait]
impl Backend for FileBackend {
    async fn append(&self, event: PendingEvent) -> Result<(), LoggerError> {
        let mut guard = self.state.lock().await;
        let state = guard.as_mut().ok_or(LoggerError::Stopped)?;

        state.sequence += 1;
        let line = record::encode(&Event {
            sequence: state.sequence,
            kind: event.kind,
            key: event.key,
            value: event.value,
        });

        state.file.write_all(line.as_bytes()).await?;
        // Durability: sync before the append task reports success
        state.file.sync_all().await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), LoggerError> {
        let mut guard = self.state.lock().await;
        if let Some(state) = guard.take() {
            state.file.sync_all().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl TransactionLogger for FileTransactionLogger {
    async fn write_put(&self, key: &str, value: &str) -> Result<(), LoggerError> {
        self.channels.enqueue(pending_put(key, value)).await
    }

    async fn write_delete(&self, key: &str) -> Result<(), LoggerError> {
        self.channels.enqueue(pending_delete(key)).await
    }

    fn errors(&self) -> Option<mpsc::UnboundedReceiver<LoggerError>> {
        self.channels.take_errors()
    }

    fn read_events(&self) -> (mpsc::Receiver<Event>, mpsc::Receiver<LoggerError>) {
        let (event_tx, event_rx) = mpsc::channel(REPLAY_QUEUE_DEPTH);
        let (error_tx, error_rx) = mpsc::channel(1);
        let path = self.path.clone();

        tokio::spawn(async move {
            let file = match tokio::fs::File::open(&path).await {
                Ok(file) => file,
                Err(err) => {
                    let _ = error_tx.send(LoggerError::Io(err)).await;
                    return;
                }
            };

            let mut lines = tokio::io::BufReader::new(file).lines();
            let mut last_sequence = 0u64;
            let mut line_number = 0u64;

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        line_number += 1;
                        if line.is_empty() {
                            continue;
                        }

                        let event = match record::decode(&line) {
                            Ok(event) => event,
                            Err(err) => {
                                let _ = error_tx
                                    .send(LoggerError::MalformedRecord {
                                        line: line_number,
                                        reason: err.to_string(),
                                    })
                                    .await;
                                return;
                            }
                        };

                        if event.sequence <= last_sequence {
                            let _ = error_tx
                                .send(LoggerError::OutOfSequence {
                                    last: last_sequence,
                                    found: event.sequence,
                                })
                                .await;
                            return;
                        }
                        last_sequence = event.sequence;

                        if event_tx.send(event).await.is_err() {
                            // Consumer hung up; nothing left to replay into.
                            return;
                        }
                    }
                    Ok(None) => return, // EOF; channels close on drop
                    Err(err) => {
                        let _ = error_tx.send(LoggerError::Io(err)).await;
                        return;
                    }
                }
            }
        });

        (event_rx, error_rx)
    }

    fn run(&self) -> JoinHandle<()> {
        let channels = Arc::clone(&self.channels);
        let backend: Arc<dyn Backend> = self.inner.clone();
        tokio::spawn(async move { run_loop(&channels, backend).await })
    }

    async fn stop(&self) {
        self.channels.stop().await;
    }
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
