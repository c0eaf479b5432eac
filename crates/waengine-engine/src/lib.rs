// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the waengine authors

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! waengine-engine: the tasks that make up the Worker Engine (§2) —
//! the Socket Supervisor's pure reducer and its async driver ([`engine`]),
//! the Connection Manager, the Disconnect Watcher, the Broadcast
//! Processor, and the Verification Worker.
//!
//! Each component is structured the way the teacher splits synchronous
//! decision-making from async execution: a pure function or reducer
//! (`close_classifier`, `supervisor::reduce`, `anti_ban`) that tests can
//! drive without a runtime, and a thin `run`/`tick` loop around it that a
//! real binary drives with real adapters.

pub mod anti_ban;
pub mod close_classifier;
pub mod connection_manager;
pub mod disconnect_watcher;
pub mod engine;
pub mod processor;
pub mod supervisor;
pub mod verification_worker;

pub use close_classifier::{classify_close, is_connection_lost, CloseAction, ReconnectDelay};
pub use connection_manager::{ConnectionManager, Connector};
pub use disconnect_watcher::{DisconnectWatcher, Supervision};
pub use engine::{Engine, FixedWireVersion, WireVersionSource};
pub use processor::{BroadcastProcessor, TickOutcome};
pub use supervisor::{reduce, SupervisorEffect, SupervisorEvent, SupervisorState};
pub use verification_worker::{VerificationWorker, VerifyOutcome};
