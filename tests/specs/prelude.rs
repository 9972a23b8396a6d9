//! Shared helpers for the okv specs.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use okv_daemon::config::{Config, LogBackend, LogConfig};
use okv_daemon::{build_router, lifecycle, Daemon};
use tempfile::TempDir;
use tower::ServiceExt;

/// A started service with its router, backed by a temp-dir file log.
pub struct Service {
    pub dir: TempDir,
    pub daemon: Daemon,
    pub router: Router,
}

pub fn config_in(dir: &TempDir) -> Config {
    Config {
        log: LogConfig {
            backend: LogBackend::File,
            path: dir.path().join("transactions.log"),
        },
        ..Config::default()
    }
}

/// Start a fresh service in its own temp dir.
pub async fn start() -> Service {
    let dir = TempDir::new().unwrap();
    let daemon = lifecycle::startup(&config_in(&dir)).await.unwrap();
    let router = build_router(daemon.app_state());
    Service {
        dir,
        daemon,
        router,
    }
}

/// Restart the service over the same log directory.
pub async fn restart(service: Service) -> Service {
    let Service { dir, daemon, .. } = service;
    daemon.shutdown().await;

    let daemon = lifecycle::startup(&config_in(&dir)).await.unwrap();
    let router = build_router(daemon.app_state());
    Service {
        dir,
        daemon,
        router,
    }
}

impl Service {
    pub async fn request(&self, method: &str, key: &str, body: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method(method)
            .uri(format!("/api/v1/key/{key}"))
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    pub async fn put(&self, key: &str, value: &str) -> StatusCode {
        self.request("PUT", key, value).await.0
    }

    pub async fn get(&self, key: &str) -> (StatusCode, String) {
        self.request("GET", key, "").await
    }

    pub async fn delete(&self, key: &str) -> StatusCode {
        self.request("DELETE", key, "").await.0
    }
}
