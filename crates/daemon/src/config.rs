// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration
//!
//! Loaded from a toml file (`okv.toml` by default, `OKV_CONFIG` overrides the
//! path). Every key has a default, so a missing file yields a fully usable
//! configuration: file-backed log next to the working directory, listening on
//! localhost.

use okv_storage::PostgresConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming an alternate config file path.
pub const CONFIG_PATH_ENV: &str = "OKV_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "okv.toml";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Which backing medium the transaction logger uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogBackend {
    #[default]
    File,
    Postgres,
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub log: LogConfig,
    pub database: DatabaseConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8000".to_string(),
        }
    }
}

/// Transaction log settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    pub backend: LogBackend,
    /// Log file path; only used by the file backend.
    pub path: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            backend: LogBackend::File,
            path: PathBuf::from("transactions.log"),
        }
    }
}

/// Postgres connection settings; only used by the postgres backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub host: String,
    pub dbname: String,
    pub user: String,
    pub password: String,
    pub sslmode: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "postgres".to_string(),
            dbname: "postgres".to_string(),
            user: "postgres".to_string(),
            password: "password".to_string(),
            sslmode: "disable".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, honoring `OKV_CONFIG`.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from(&path)
    }

    /// Load configuration from a specific file. A missing file is not an
    /// error; it yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl From<&DatabaseConfig> for PostgresConfig {
    fn from(config: &DatabaseConfig) -> Self {
        PostgresConfig {
            host: config.host.clone(),
            dbname: config.dbname.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
            sslmode: config.sslmode.clone(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
