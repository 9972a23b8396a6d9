//! Lifecycle specs: shutdown semantics.

use crate::prelude::*;
use axum::http::StatusCode;

#[tokio::test]
async fn writes_are_durable_before_shutdown_returns() {
    let service = start().await;

    for i in 0..10 {
        service.put(&format!("key-{i}"), &format!("value-{i}")).await;
    }

    let path = service.dir.path().join("transactions.log");
    service.daemon.shutdown().await;

    // Every accepted write reached the log before shutdown completed
    let content = std::fs::read_to_string(path).unwrap();
    assert_eq!(content.lines().count(), 10);
}

#[tokio::test]
async fn mutations_after_shutdown_are_rejected() {
    let service = start().await;
    let router = service.router.clone();

    service.daemon.shutdown().await;

    // The store still answers, but mutations can no longer be logged
    let request = axum::http::Request::builder()
        .method("PUT")
        .uri("/api/v1/key/late")
        .body(axum::body::Body::from("value"))
        .unwrap();
    let response = tower::ServiceExt::oneshot(router, request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn empty_log_serves_an_empty_store() {
    let service = start().await;

    let (status, _) = service.get("anything").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    service.daemon.shutdown().await;
}
