// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the waengine authors

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! waengine-daemon: the Lifecycle/Root component (§4.12) — process
//! configuration, legacy cleanup, and wiring the Connection Manager,
//! Disconnect Watcher, Verification Worker and Socket Supervisor pool
//! together into one running process, plus its graceful shutdown.

pub mod config;
pub mod lifecycle;

pub use config::Config;
pub use lifecycle::{cleanup_legacy_artifacts, startup, Running};
