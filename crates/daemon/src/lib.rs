// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! okv-daemon: the Otter KV service (okvd)
//!
//! Wires the pieces together: configuration, logger construction, startup
//! replay, the background persistence loop, and the HTTP surface.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod lifecycle;
pub mod server;

pub use config::{Config, ConfigError, LogBackend};
pub use lifecycle::{startup, Daemon, StartupError};
pub use server::{build_router, AppState};
