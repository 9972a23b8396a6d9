// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Otter KV Daemon (okvd)
//!
//! Key-value service over HTTP, durable via an async transaction log.

use okv_daemon::{build_router, config::Config, lifecycle};
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_logging();

    let config = Config::load()?;
    info!(backend = ?config.log.backend, "starting okvd");

    // Replay before serving; a store inconsistent with the log is fatal
    let daemon = lifecycle::startup(&config).await?;

    let router = build_router(daemon.app_state());
    let listener = tokio::net::TcpListener::bind(&config.server.address).await?;
    info!("listening on {}", config.server.address);

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let shutdown = async move {
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
            _ = sigint.recv() => info!("received SIGINT, shutting down"),
        }
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    // HTTP has drained; flush the log last
    daemon.shutdown().await;
    Ok(())
}

fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
