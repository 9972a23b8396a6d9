//! HTTP surface specs: status codes and bodies.

use crate::prelude::*;
use axum::http::StatusCode;

#[tokio::test]
async fn put_get_delete_happy_path() {
    let service = start().await;

    assert_eq!(service.put("city", "copenhagen").await, StatusCode::CREATED);

    let (status, body) = service.get("city").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "copenhagen");

    assert_eq!(service.delete("city").await, StatusCode::OK);

    let (status, _) = service.get("city").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    service.daemon.shutdown().await;
}

#[tokio::test]
async fn put_requires_a_body() {
    let service = start().await;

    let (status, body) = service.request("PUT", "a", "").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("value missing"));

    service.daemon.shutdown().await;
}

#[tokio::test]
async fn oversized_key_rejected_on_every_verb() {
    let service = start().await;
    let key = "k".repeat(1025);

    assert_eq!(service.put(&key, "v").await, StatusCode::BAD_REQUEST);
    assert_eq!(service.get(&key).await.0, StatusCode::BAD_REQUEST);
    assert_eq!(service.delete(&key).await, StatusCode::BAD_REQUEST);

    service.daemon.shutdown().await;
}

#[tokio::test]
async fn delete_of_absent_key_is_200() {
    let service = start().await;

    assert_eq!(service.delete("never-existed").await, StatusCode::OK);

    service.daemon.shutdown().await;
}
