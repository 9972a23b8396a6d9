// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Postgres-backed transaction logger
//!
//! Each event becomes one row in the `transactions` table; the database
//! assigns the sequence via `id BIGSERIAL`, so rows ordered by `id` are the
//! replay order. Key and value column widths are bounded by the same limits
//! the store enforces.
//!
//! Construction verifies the table exists (creating it if not) and is the
//! one place this backend fails synchronously; everything after that is
//! reported on the error stream.

use crate::logger::{
    pending_delete, pending_put, run_loop, Backend, Channels, LoggerError, PendingEvent,
    REPLAY_QUEUE_DEPTH,
};
use crate::TransactionLogger;
use async_trait::async_trait;
use okv_core::{Event, EventKind, SizeLimits};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Table where transaction rows are stored.
const TRANSACTION_TABLE: &str = "transactions";

/// Connection parameters for the Postgres backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    pub host: String,
    pub dbname: String,
    pub user: String,
    pub password: String,
    /// Postgres `sslmode` value, e.g. `disable` or `require`.
    pub sslmode: String,
}

impl PostgresConfig {
    /// Render as a Postgres connection URL.
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}/{}?sslmode={}",
            self.user, self.password, self.host, self.dbname, self.sslmode
        )
    }
}

/// Transaction logger writing rows to a Postgres table.
pub struct PostgresTransactionLogger {
    channels: Arc<Channels>,
    inner: Arc<PgBackend>,
}

struct PgBackend {
    pool: PgPool,
}

impl PostgresTransactionLogger {
    /// Connect to Postgres and verify the transaction table, creating it if
    /// it does not exist. Fails synchronously on connection or verification
    /// errors; the process must not start without its log.
    pub async fn connect(
        config: &PostgresConfig,
        limits: SizeLimits,
    ) -> Result<Self, LoggerError> {
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(&config.connection_url())
            .await?;

        if !table_exists(&pool).await? {
            create_table(&pool, limits).await?;
        }

        Ok(Self {
            channels: Arc::new(Channels::new()),
            inner: Arc::new(PgBackend { pool }),
        })
    }
}

async fn table_exists(pool: &PgPool) -> Result<bool, LoggerError> {
    let regclass: Option<String> =
        sqlx::query_scalar("SELECT to_regclass($1)::text")
            .bind(TRANSACTION_TABLE)
            .fetch_one(pool)
            .await?;
    Ok(regclass.is_some())
}

async fn create_table(pool: &PgPool, limits: SizeLimits) -> Result<(), LoggerError> {
    let ddl = create_table_sql(limits);
    sqlx::query(&ddl).execute(pool).await?;
    Ok(())
}

fn create_table_sql(limits: SizeLimits) -> String {
    format!(
        "CREATE TABLE {table} (
            id BIGSERIAL PRIMARY KEY,
            event_type SMALLINT NOT NULL,
            key VARCHAR({key_width}) NOT NULL,
            value VARCHAR({value_width})
        )",
        table = TRANSACTION_TABLE,
        key_width = limits.max_key_size,
        value_width = limits.max_value_size,
    )
}

#[async_trait]
impl Backend for PgBackend {
    async fn append(&self, event: PendingEvent) -> Result<(), LoggerError> {
        sqlx::query("INSERT INTO transactions (event_type, key, value) VALUES ($1, $2, $3)")
            .bind(i16::from(event.kind.code()))
            .bind(&event.key)
            .bind(&event.value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), LoggerError> {
        self.pool.close().await;
        Ok(())
    }
}

#[async_trait]
impl TransactionLogger for PostgresTransactionLogger {
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
        let pool = self.inner.pool.clone();

        tokio::spawn(async move {
            let rows = match sqlx::query(
                "SELECT id, event_type, key, value FROM transactions ORDER BY id",
            )
            .fetch_all(&pool)
            .await
            {
                Ok(rows) => rows,
                Err(err) => {
                    let _ = error_tx.send(LoggerError::Database(err)).await;
                    return;
                }
            };

            let mut last_sequence = 0u64;
            for row in rows {
                let event = match decode_row(&row) {
                    Ok(event) => event,
                    Err(err) => {
                        let _ = error_tx.send(err).await;
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
                    return;
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

fn decode_row(row: &sqlx::postgres::PgRow) -> Result<Event, LoggerError> {
    let id: i64 = row.try_get("id")?;
    let event_type: i16 = row.try_get("event_type")?;
    let key: String = row.try_get("key")?;
    let value: Option<String> = row.try_get("value")?;

    let code = u8::try_from(event_type).ok();
    let kind = code
        .and_then(EventKind::from_code)
        .ok_or_else(|| LoggerError::MalformedRecord {
            line: id as u64,
            reason: format!("unknown event kind code: {event_type}"),
        })?;

    Ok(Event {
        sequence: id as u64,
        kind,
        key,
        value: value.unwrap_or_default(),
    })
}

#[cfg(test)]
#[path = "postgres_tests.rs"]
mod tests;
