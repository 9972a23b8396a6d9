// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP surface: PUT/GET/DELETE over `/api/v1/key/{key}`.
//!
//! Handlers validate through the store first; only mutations the store
//! accepted are forwarded to the transaction logger. Persistence failures are
//! therefore never visible here — they surface on the logger's error stream.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::put;
use axum::{Json, Router};
use okv_core::{Store, StoreError};
use okv_storage::{LoggerError, TransactionLogger};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub logger: Arc<dyn TransactionLogger>,
}

/// Build the service router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/v1/key/{key}",
            put(put_key).get(get_key).delete(delete_key),
        )
        .with_state(state)
}

/// Errors a handler can answer with.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("value missing in the request body")]
    MissingValue,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Logger(#[from] LoggerError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::MissingValue => StatusCode::BAD_REQUEST,
            ApiError::Store(StoreError::KeyNotFound) => StatusCode::NOT_FOUND,
            ApiError::Store(StoreError::KeyTooLarge { .. })
            | ApiError::Store(StoreError::ValueTooLarge { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Logger(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// PUT /api/v1/key/{key} — body is the value. 201 on success.
async fn put_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
    body: String,
) -> Result<StatusCode, ApiError> {
    if body.is_empty() {
        return Err(ApiError::MissingValue);
    }

    state.store.put(&key, &body)?;
    state.logger.write_put(&key, &body).await?;
    Ok(StatusCode::CREATED)
}

/// GET /api/v1/key/{key} — 200 with the value as the body.
async fn get_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<String, ApiError> {
    Ok(state.store.get(&key)?)
}

/// DELETE /api/v1/key/{key} — 200 even when the key was absent.
async fn delete_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.store.delete(&key)?;
    state.logger.write_delete(&key).await?;
    Ok(StatusCode::OK)
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
