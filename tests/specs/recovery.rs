//! Recovery specs: replay rebuilds the store across restarts.

use crate::prelude::*;
use axum::http::StatusCode;
use okv_daemon::{lifecycle, StartupError};

#[tokio::test]
async fn state_is_rebuilt_after_restart() {
    let service = start().await;

    service.put("a", "1").await;
    service.put("b", "2").await;
    service.put("a", "updated").await;
    service.delete("b").await;

    let service = restart(service).await;

    let (status, body) = service.get("a").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "updated");

    let (status, _) = service.get("b").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    service.daemon.shutdown().await;
}

#[tokio::test]
async fn deleted_key_stays_deleted_after_replay() {
    let service = start().await;

    service.put("a", "1").await;
    service.put("a", "2").await;
    service.delete("a").await;

    let service = restart(service).await;

    let (status, _) = service.get("a").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    service.daemon.shutdown().await;
}

#[tokio::test]
async fn sequences_keep_increasing_across_restarts() {
    let service = start().await;
    service.put("a", "1").await;

    let service = restart(service).await;
    service.put("b", "2").await;

    let path = service.dir.path().join("transactions.log");
    service.daemon.shutdown().await;

    let content = std::fs::read_to_string(path).unwrap();
    let sequences: Vec<u64> = content
        .lines()
        .map(|line| line.split('\t').next().unwrap().parse().unwrap())
        .collect();
    assert_eq!(sequences, vec![1, 2]);
}

#[tokio::test]
async fn tampered_log_prevents_startup() {
    let service = start().await;
    service.put("a", "1").await;
    service.put("b", "2").await;

    let path = service.dir.path().join("transactions.log");
    let dir = service.dir;
    service.daemon.shutdown().await;

    // Duplicate the first record at the tail: sequence goes backwards
    let mut content = std::fs::read_to_string(&path).unwrap();
    let first_line = content.lines().next().unwrap().to_string();
    content.push_str(&first_line);
    content.push('\n');
    std::fs::write(&path, content).unwrap();

    let err = lifecycle::startup(&config_in(&dir)).await.unwrap_err();
    assert!(matches!(err, StartupError::Replay(_)));
}

#[tokio::test]
async fn values_with_tabs_and_newlines_survive_restart() {
    let service = start().await;

    service.put("snippet", "line one\n\tindented line two").await;

    let service = restart(service).await;

    let (_, body) = service.get("snippet").await;
    assert_eq!(body, "line one\n\tindented line two");

    service.daemon.shutdown().await;
}
