// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: startup, replay, shutdown.
//!
//! Startup order matters: the logger is constructed first (fatal on error),
//! the log is replayed into a fresh store (fatal on error), and only then is
//! the run loop started. Requests must never be served over a store that
//! disagrees with the durable log.

use crate::config::{Config, LogBackend};
use crate::server::AppState;
use okv_core::{SizeLimits, Store};
use okv_storage::{
    restore, FileTransactionLogger, LoggerError, PostgresConfig, PostgresTransactionLogger,
    ReplayError, TransactionLogger,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Startup errors; all of them are fatal.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to create transaction logger: {0}")]
    Logger(#[from] LoggerError),

    #[error("failed to replay transaction log: {0}")]
    Replay(#[from] ReplayError),
}

/// A fully started service: replayed store, running logger, error monitor.
pub struct Daemon {
    pub store: Arc<Store>,
    pub logger: Arc<dyn TransactionLogger>,
    run_handle: JoinHandle<()>,
    monitor_handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Daemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Daemon")
            .field("keys", &self.store.len())
            .field("run_handle", &self.run_handle)
            .field("monitor_handle", &self.monitor_handle)
            .finish_non_exhaustive()
    }
}

/// Construct the configured logger, replay it into a fresh store, and start
/// the background loops.
pub async fn startup(config: &Config) -> Result<Daemon, StartupError> {
    let limits = SizeLimits::default();

    let logger: Arc<dyn TransactionLogger> = match config.log.backend {
        LogBackend::File => Arc::new(FileTransactionLogger::open(&config.log.path)?),
        LogBackend::Postgres => {
            let pg_config = PostgresConfig::from(&config.database);
            Arc::new(PostgresTransactionLogger::connect(&pg_config, limits).await?)
        }
    };

    let store = Arc::new(Store::new(limits));
    let stats = restore(logger.as_ref(), &store).await?;
    info!(
        events = stats.events,
        last_sequence = stats.last_sequence,
        keys = store.len(),
        "transaction log replayed"
    );

    // Async write failures are only visible on this stream; keep a task
    // draining it so they reach the service log.
    let monitor_handle = logger.errors().map(|mut errors| {
        tokio::spawn(async move {
            while let Some(err) = errors.recv().await {
                error!("transaction log write failed: {err}");
            }
        })
    });

    let run_handle = logger.run();

    Ok(Daemon {
        store,
        logger,
        run_handle,
        monitor_handle,
    })
}

impl Daemon {
    /// State shared with the HTTP handlers.
    pub fn app_state(&self) -> AppState {
        AppState {
            store: Arc::clone(&self.store),
            logger: Arc::clone(&self.logger),
        }
    }

    /// Drain in-flight writes, close the log, and tear down the loops.
    pub async fn shutdown(self) {
        info!("stopping transaction logger");
        self.logger.stop().await;

        if let Err(err) = self.run_handle.await {
            error!("transaction logger run loop failed: {err}");
        }
        if let Some(handle) = self.monitor_handle {
            // No more errors can be produced once the logger is stopped
            handle.abort();
        }
        info!("shutdown complete");
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
