// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the waengine authors

//! Disconnect Watcher (§4.9): reconciles instances the dashboard marked
//! `DISCONNECTING` by logging the socket out gracefully, wiping the
//! on-disk session, and persisting `DISCONNECTED` — after which the
//! Connection Manager is free to re-admit the instance if the dashboard
//! bumps it back to `INITIALIZING`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use waengine_adapters::Sleeper;
use waengine_core::{InstanceId, InstanceStatus};
use waengine_store::{SessionDirs, Store, StoreError};

const TICK_INTERVAL: Duration = Duration::from_secs(3);

/// The watcher's view of a live Socket Supervisor, kept separate from
/// [`crate::connection_manager::Connector`] because teardown here is
/// conditioned on a graceful logout rather than a status transition
/// (teacher's boundary split: `AgentAdapter` vs `SessionAdapter`).
#[async_trait]
pub trait Supervision: Send + Sync + 'static {
    /// Whether a supervisor (and therefore an open socket) exists for `id`.
    fn has_supervisor(&self, id: &InstanceId) -> bool;

    /// Ask the socket to log out gracefully. Any error means the caller
    /// should fall back to an unconditional teardown.
    async fn logout(&self, id: &InstanceId) -> Result<(), String>;

    /// Tear down the supervisor unconditionally.
    async fn tear_down(&self, id: &InstanceId);
}

pub struct DisconnectWatcher<S, L, V> {
    store: Arc<S>,
    sleeper: Arc<L>,
    sessions: Arc<SessionDirs>,
    supervision: Arc<V>,
}

impl<S, L, V> DisconnectWatcher<S, L, V>
where
    S: Store,
    L: Sleeper,
    V: Supervision,
{
    pub fn new(store: Arc<S>, sleeper: Arc<L>, sessions: Arc<SessionDirs>, supervision: Arc<V>) -> Self {
        Self { store, sleeper, sessions, supervision }
    }

    pub async fn run(&self) {
        loop {
            if let Err(err) = self.tick().await {
                tracing::warn!(error = %err, "disconnect watcher tick failed");
            }
            self.sleeper.sleep(TICK_INTERVAL).await;
        }
    }

    pub async fn tick(&self) -> Result<(), StoreError> {
        for instance in self.store.list_disconnecting().await? {
            self.drain(&instance.id).await?;
        }
        Ok(())
    }

    async fn drain(&self, id: &InstanceId) -> Result<(), StoreError> {
        if self.supervision.has_supervisor(id) {
            if let Err(err) = self.supervision.logout(id).await {
                tracing::warn!(instance_id = %id, error = %err, "graceful logout failed, tearing down");
                self.supervision.tear_down(id).await;
            }
        }

        if let Err(err) = self.sessions.delete(id.as_str()).await {
            tracing::warn!(instance_id = %id, error = %err, "failed to wipe session directory");
        }

        self.store.set_instance_status(id, InstanceStatus::Disconnected, None).await
    }
}

#[cfg(test)]
#[path = "disconnect_watcher_tests.rs"]
mod tests;
