// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bootstrap replay driver
//!
//! Drains the logger's replay stream into the store, strictly sequentially —
//! later events may overwrite earlier ones, so ordering must be preserved.
//! Any replay error is fatal: the process must not serve requests over a
//! store that may disagree with the durable log.

use crate::logger::{LoggerError, TransactionLogger};
use okv_core::{Event, EventKind, Store, StoreError};
use thiserror::Error;

/// Why startup replay failed.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("transaction log replay failed: {0}")]
    Logger(#[from] LoggerError),

    #[error("replayed event rejected by store: {0}")]
    Store(#[from] StoreError),
}

/// Summary of a completed replay, for startup logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Number of events applied.
    pub events: u64,
    /// Sequence of the newest applied event; 0 when the log was empty.
    pub last_sequence: u64,
}

/// Replay everything the logger has persisted into the store.
///
/// Must run to completion before the logger's run loop is started and before
/// any traffic is accepted. Returns on the first error from the error stream,
/// including sequencing corruption.
pub async fn restore(
    logger: &dyn TransactionLogger,
    store: &Store,
) -> Result<ReplayStats, ReplayError> {
    let (mut events, mut errors) = logger.read_events();
    let mut stats = ReplayStats::default();

    loop {
        tokio::select! {
            maybe_err = errors.recv() => {
                match maybe_err {
                    Some(err) => return Err(err.into()),
                    // Error stream closed with nothing reported; finish
                    // draining the events that remain.
                    None => {
                        while let Some(event) = events.recv().await {
                            apply(store, &event)?;
                            stats.events += 1;
                            stats.last_sequence = event.sequence;
                        }
                        return Ok(stats);
                    }
                }
            }
            maybe_event = events.recv() => {
                match maybe_event {
                    Some(event) => {
                        apply(store, &event)?;
                        stats.events += 1;
                        stats.last_sequence = event.sequence;
                    }
                    // Event stream closed; a terminal error may still be
                    // buffered, so check before declaring success.
                    None => {
                        if let Some(err) = errors.recv().await {
                            return Err(err.into());
                        }
                        return Ok(stats);
                    }
                }
            }
        }
    }
}

fn apply(store: &Store, event: &Event) -> Result<(), StoreError> {
    match event.kind {
        EventKind::Put => store.put(&event.key, &event.value),
        EventKind::Delete => store.delete(&event.key),
    }
}

#[cfg(test)]
#[path = "replay_tests.rs"]
mod tests;
