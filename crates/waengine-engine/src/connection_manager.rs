// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the waengine authors

//! Connection Manager (§4.8): the single background loop that admits
//! instances into supervision and reconciles the pool against the store
//! when the dashboard disconnects an instance out from under it.
//!
//! Grounded in the teacher's `Runtime`/`Executor` split
//! (`crates/engine/src/runtime/mod.rs`): the manager owns the pool and the
//! adapters, `tick` is the synchronous-per-call unit of work, and `run`
//! is the thin loop around it that a real binary drives with a real
//! [`Sleeper`].

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use waengine_adapters::{AdmissionGate, Sleeper};
use waengine_core::{Instance, InstanceId, InstanceStatus};
use waengine_store::{Store, StoreError};

const TICK_INTERVAL: Duration = Duration::from_secs(10);
const ADMISSION_WAIT: Duration = Duration::from_secs(2);
const STUCK_START_THRESHOLD: Duration = Duration::from_secs(120);
const LIST_LIMIT: usize = 5;

/// What the manager does with an instance it has decided to admit.
/// Separated from `Store`/`AdmissionGate` so tests can record admissions
/// without standing up a real Socket Supervisor (teacher's
/// `AgentAdapter::spawn` boundary, `crates/adapters/src/agent/mod.rs`).
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, id: &InstanceId, resume: bool);

    /// Tear down the supervisor for an instance the store now reports
    /// `DISCONNECTED` (§4.8 step 1).
    async fn tear_down(&self, id: &InstanceId);
}

/// Single background loop admitting and reconciling Socket Supervisors.
pub struct ConnectionManager<S, G, L, C> {
    store: Arc<S>,
    gate: Arc<G>,
    sleeper: Arc<L>,
    connector: Arc<C>,
    pool: parking_lot::Mutex<HashSet<InstanceId>>,
}

impl<S, G, L, C> ConnectionManager<S, G, L, C>
where
    S: Store,
    G: AdmissionGate,
    L: Sleeper,
    C: Connector,
{
    pub fn new(store: Arc<S>, gate: Arc<G>, sleeper: Arc<L>, connector: Arc<C>) -> Self {
        Self { store, gate, sleeper, connector, pool: parking_lot::Mutex::new(HashSet::new()) }
    }

    /// Ids currently believed to own a Socket Supervisor.
    pub fn pooled_ids(&self) -> HashSet<InstanceId> {
        self.pool.lock().clone()
    }

    /// Record that an id has entered supervision, e.g. because a fresh
    /// instance was connected outside the manager's own admission path.
    pub fn mark_pooled(&self, id: InstanceId) {
        self.pool.lock().insert(id);
    }

    /// Run forever, sleeping `TICK_INTERVAL` between iterations.
    pub async fn run(&self) {
        loop {
            if let Err(err) = self.tick().await {
                tracing::warn!(error = %err, "connection manager tick failed");
            }
            self.sleeper.sleep(TICK_INTERVAL).await;
        }
    }

    /// One iteration of §4.8: reconcile the pool, then admit new candidates.
    pub async fn tick(&self) -> Result<(), StoreError> {
        self.reconcile_pool().await?;
        self.admit_candidates().await
    }

    async fn reconcile_pool(&self) -> Result<(), StoreError> {
        let ids: Vec<InstanceId> = self.pool.lock().iter().cloned().collect();
        for id in ids {
            match self.store.get_instance(&id).await? {
                Some(instance) if instance.status == InstanceStatus::Disconnected => {
                    self.connector.tear_down(&id).await;
                    self.pool.lock().remove(&id);
                }
                None => {
                    self.connector.tear_down(&id).await;
                    self.pool.lock().remove(&id);
                }
                _ => {}
            }
        }
        Ok(())
    }

    async fn admit_candidates(&self) -> Result<(), StoreError> {
        let candidates = self.store.list_initializing(LIST_LIMIT).await?;
        let now = Utc::now();

        for instance in candidates {
            if self.pool.lock().contains(&instance.id) {
                continue;
            }
            if is_stuck(&instance, now) {
                self.store.set_instance_status(&instance.id, InstanceStatus::Disconnected, None).await?;
                continue;
            }
            if !self.gate.admits() {
                continue;
            }

            self.pool.lock().insert(instance.id.clone());
            self.connector.connect(&instance.id, false).await;
            self.sleeper.sleep(ADMISSION_WAIT).await;
        }

        Ok(())
    }
}

fn is_stuck(instance: &Instance, now: chrono::DateTime<Utc>) -> bool {
    (now - instance.updated_at).to_std().map(|age| age > STUCK_START_THRESHOLD).unwrap_or(false)
}

#[cfg(test)]
#[path = "connection_manager_tests.rs"]
mod tests;
