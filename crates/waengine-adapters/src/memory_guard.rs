// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the waengine authors

//! Memory Guard (§4.6): samples resident memory and exposes the soft/hard
//! thresholds the Broadcast Processor, Connection Manager, and Lifecycle
//! consult.

use std::sync::atomic::{AtomicU64, Ordering};
use sysinfo::{Pid, System};

/// Default ceiling if `WAE_MEMORY_CEILING_MB` is unset (§6 "a runtime-memory
/// ceiling (default 2048 MB)").
pub const DEFAULT_CEILING_MB: u64 = 2048;

const SOFT_THRESHOLD_RATIO: f64 = 0.73;
const HARD_THRESHOLD_RATIO: f64 = 0.93;
const ADMISSION_THRESHOLD_RATIO: f64 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardSignal {
    Normal,
    Soft,
    Hard,
}

/// Tracks one process's resident memory against a configured ceiling.
pub struct MemoryGuard {
    ceiling_mb: u64,
    pid: Pid,
    system: parking_lot::Mutex<System>,
    last_sample_mb: AtomicU64,
}

impl MemoryGuard {
    pub fn new(ceiling_mb: u64) -> Self {
        Self {
            ceiling_mb,
            pid: Pid::from_u32(std::process::id()),
            system: parking_lot::Mutex::new(System::new()),
            last_sample_mb: AtomicU64::new(0),
        }
    }

    pub fn ceiling_mb(&self) -> u64 {
        self.ceiling_mb
    }

    /// Refresh this process's memory usage and cache it.
    pub fn sample(&self) -> u64 {
        let mut system = self.system.lock();
        system.refresh_all();
        let mb = system.process(self.pid).map(|p| p.memory() / 1024 / 1024).unwrap_or(0);
        self.last_sample_mb.store(mb, Ordering::Relaxed);
        mb
    }

    /// Last sampled value without touching the OS again.
    pub fn last_sample_mb(&self) -> u64 {
        self.last_sample_mb.load(Ordering::Relaxed)
    }

    fn ratio(&self, mb: u64) -> f64 {
        if self.ceiling_mb == 0 {
            0.0
        } else {
            mb as f64 / self.ceiling_mb as f64
        }
    }

    /// Soft/hard signal for a freshly taken sample (§4.10 step a, §4.12).
    pub fn signal(&self) -> GuardSignal {
        let ratio = self.ratio(self.sample());
        if ratio >= HARD_THRESHOLD_RATIO {
            GuardSignal::Hard
        } else if ratio >= SOFT_THRESHOLD_RATIO {
            GuardSignal::Soft
        } else {
            GuardSignal::Normal
        }
    }

    /// Whether the Connection Manager may admit one more supervisor
    /// (§4.6, §4.8 step 2: "skip if above 85%").
    pub fn admits_new_supervisor(&self) -> bool {
        self.ratio(self.sample()) < ADMISSION_THRESHOLD_RATIO
    }
}

/// Seam the Connection Manager depends on instead of naming [`MemoryGuard`]
/// directly, so tests can force admission decisions deterministically.
pub trait AdmissionGate: Send + Sync + 'static {
    fn admits(&self) -> bool;
}

impl AdmissionGate for MemoryGuard {
    fn admits(&self) -> bool {
        self.admits_new_supervisor()
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake_gate {
    use super::AdmissionGate;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Scriptable [`AdmissionGate`] for tests.
    pub struct FakeAdmissionGate {
        admits: AtomicBool,
    }

    impl FakeAdmissionGate {
        pub fn new(admits: bool) -> Self {
            Self { admits: AtomicBool::new(admits) }
        }

        pub fn set_admits(&self, admits: bool) {
            self.admits.store(admits, Ordering::Relaxed);
        }
    }

    impl AdmissionGate for FakeAdmissionGate {
        fn admits(&self) -> bool {
            self.admits.load(Ordering::Relaxed)
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake_gate::FakeAdmissionGate;

#[cfg(test)]
#[path = "memory_guard_tests.rs"]
mod tests;
