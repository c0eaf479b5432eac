// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the waengine authors

//! Time source abstraction.
//!
//! Every pacing decision in the anti-ban pipeline (§9 "randomness is
//! load-bearing") is derived from wall-clock time, so the clock is a trait
//! rather than a direct call to `chrono::Local::now()`. Production code uses
//! [`SystemClock`]; tests use [`FakeClock`] to replay specific hours/dates
//! deterministically (§8 scenarios 2 and 3 both pin the clock to a fixed
//! instant before asserting on gate behaviour).

use chrono::{DateTime, Local, Utc};
use parking_lot::Mutex;
use std::sync::Arc;

/// A source of the current time.
pub trait Clock: Send + Sync + 'static {
    /// Current instant in UTC.
    fn now_utc(&self) -> DateTime<Utc>;

    /// Current instant in the local timezone (used by the Human Clock, §4.4).
    fn now_local(&self) -> DateTime<Local>;
}

/// Real wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn now_local(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock whose value is set explicitly, for deterministic tests.
#[derive(Clone)]
pub struct FakeClock {
    inner: Arc<Mutex<DateTime<Utc>>>,
}

impl FakeClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(at)),
        }
    }

    /// Move the clock forward by `duration`.
    pub fn advance(&self, duration: chrono::Duration) {
        let mut guard = self.inner.lock();
        *guard += duration;
    }

    /// Pin the clock to an absolute instant.
    pub fn set(&self, at: DateTime<Utc>) {
        *self.inner.lock() = at;
    }
}

impl Clock for FakeClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.inner.lock()
    }

    fn now_local(&self) -> DateTime<Local> {
        self.now_utc().with_timezone(&Local)
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
