// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the waengine authors

//! Suspension points (§5 "suspension points are exactly the explicit
//! sleeps and the awaited I/O calls"). Every pause loop in the engine sleeps
//! through this trait rather than calling `tokio::time::sleep` directly, so
//! tests can run the real timing logic without waiting in real time.

use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait Sleeper: Send + Sync + 'static {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps for real, backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealSleeper;

#[async_trait]
impl Sleeper for RealSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Records every requested duration and returns immediately, so tests
    /// exercise pacing *decisions* without real wall-clock delay.
    #[derive(Clone, Default)]
    pub struct FakeSleeper {
        requested: Arc<Mutex<Vec<Duration>>>,
    }

    impl FakeSleeper {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn requested(&self) -> Vec<Duration> {
            self.requested.lock().clone()
        }

        pub fn total_requested(&self) -> Duration {
            self.requested.lock().iter().sum()
        }
    }

    #[async_trait]
    impl Sleeper for FakeSleeper {
        async fn sleep(&self, duration: Duration) {
            self.requested.lock().push(duration);
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeSleeper;

#[cfg(test)]
#[path = "sleeper_tests.rs"]
mod tests;
