// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the waengine authors

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! waengine-adapters: the engine's boundary with the outside world (§6) —
//! the abstract protocol [`socket`], the [`memory_guard`] that samples this
//! process's own footprint, and the [`media`] fetcher.

pub mod media;
pub mod memory_guard;
pub mod sleeper;
pub mod socket;

pub use media::{MediaError, MediaFetcher};
pub use memory_guard::{AdmissionGate, GuardSignal, MemoryGuard, DEFAULT_CEILING_MB};
pub use sleeper::{RealSleeper, Sleeper};
pub use socket::{
    BrowserFingerprint, CloseEvent, ConnectConfig, ConnectionUpdate, ExistsResult, InboundMessage,
    NullSocketFactory, OutboundContent, PresenceState, Socket, SocketError, SocketEvent,
    SocketFactory, FINGERPRINT_POOL,
};

#[cfg(any(test, feature = "test-support"))]
pub use memory_guard::FakeAdmissionGate;
#[cfg(any(test, feature = "test-support"))]
pub use sleeper::FakeSleeper;
#[cfg(any(test, feature = "test-support"))]
pub use socket::{FakeSocket, FakeSocketFactory, SocketCall};
