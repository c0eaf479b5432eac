// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the waengine authors

//! Lifecycle/Root (§4.12): startup cleanup, wiring every background task
//! together, and graceful shutdown.
//!
//! Grounded in the teacher's `crates/daemon/src/lifecycle.rs` split between
//! a `startup()` that returns a running handle and a `shutdown()` method on
//! it — simplified because this engine has no WAL/snapshot durability
//! layer to recover (§3: the dashboard's rows are the only durable state;
//! §9 "the persisted row is the source of truth").

use std::path::Path;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use waengine_adapters::{MediaFetcher, MemoryGuard, Sleeper, SocketFactory};
use waengine_core::{Clock, InstanceId};
use waengine_engine::{Connector, ConnectionManager, DisconnectWatcher, Engine, VerificationWorker, WireVersionSource};
use waengine_store::{SessionDirs, Store};

use crate::config::Config;

const LEGACY_AUTH_PREFIX: &str = "auth_info";

/// Removes on-disk artefacts from a previous, pre-session-directory layout
/// that lived directly under the process's working directory (§4.12 "remove
/// legacy session artefacts"). Best-effort: a failure to remove one entry is
/// logged and does not block startup. The `WAE_SESSIONS_DIR` half of the
/// same cleanup is `SessionDirs::remove_legacy_entries`, run once that
/// directory root exists.
pub fn cleanup_legacy_artifacts(cwd: &Path) {
    remove_matching(cwd, |name| name.starts_with(LEGACY_AUTH_PREFIX));
}

fn remove_matching(dir: &Path, should_remove: impl Fn(&str) -> bool) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };

    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !should_remove(name) {
            continue;
        }

        let path = entry.path();
        let result = if path.is_dir() { std::fs::remove_dir_all(&path) } else { std::fs::remove_file(&path) };
        match result {
            Ok(()) => info!(path = %path.display(), "removed legacy session artefact"),
            Err(err) => warn!(path = %path.display(), error = %err, "failed to remove legacy session artefact"),
        }
    }
}

/// Everything the daemon needs to launch the Worker Engine's cooperating
/// tasks (§5): the Connection Manager, Disconnect Watcher, Verification
/// Worker and the `Engine` that owns the Socket Supervisor pool. One
/// instance per process.
pub struct Running<S, L, C, F>
where
    S: Store,
    L: Sleeper,
    C: Clock,
    F: SocketFactory,
{
    engine: Arc<Engine<S, MemoryGuard, L, C, F>>,
    store: Arc<S>,
    background: Vec<JoinHandle<()>>,
}

/// Start every component named in §4.12 ("launch Connection Manager,
/// Broadcast Processor (now per-supervisor), Verification Worker,
/// Disconnect Watcher"). The Broadcast Processor itself is launched
/// per-instance by the `Engine` the moment a supervisor reaches
/// `CONNECTED` (§4.7), not here.
#[allow(clippy::too_many_arguments)]
pub async fn startup<S, L, C, F>(
    config: &Config,
    store: Arc<S>,
    sleeper: Arc<L>,
    clock: Arc<C>,
    factory: F,
    wire_version: Arc<dyn WireVersionSource>,
) -> Running<S, L, C, F>
where
    S: Store,
    L: Sleeper,
    C: Clock,
    F: SocketFactory,
{
    cleanup_legacy_artifacts(&config.cwd);

    let sessions = Arc::new(SessionDirs::new(config.sessions_dir.clone()));
    match sessions.remove_legacy_entries().await {
        Ok(removed) if removed > 0 => info!(removed, "removed legacy session artefacts under sessions dir"),
        Ok(_) => {}
        Err(err) => warn!(error = %err, "failed to remove legacy session artefacts under sessions dir"),
    }
    let media = Arc::new(MediaFetcher::new(config.public_dir.clone()));
    let memory = Arc::new(MemoryGuard::new(config.memory_ceiling_mb));

    let engine = Engine::new(
        store.clone(),
        sessions.clone(),
        memory.clone(),
        sleeper.clone(),
        clock.clone(),
        factory,
        media,
        memory.clone(),
        wire_version,
    );

    let manager = Arc::new(ConnectionManager::new(
        store.clone(),
        engine.admission_gate(),
        sleeper.clone(),
        engine.clone(),
    ));
    let watcher = Arc::new(DisconnectWatcher::new(store.clone(), sleeper.clone(), sessions, engine.clone()));
    let verifier = Arc::new(VerificationWorker::new(store.clone(), sleeper.clone(), engine.clone()));

    let mut background = Vec::with_capacity(3);
    background.push(tokio::spawn({
        let manager = manager.clone();
        async move { manager.run().await }
    }));
    background.push(tokio::spawn({
        let watcher = watcher.clone();
        async move { watcher.run().await }
    }));
    background.push(tokio::spawn({
        let verifier = verifier.clone();
        async move { verifier.run().await }
    }));

    info!("worker engine started: connection manager, disconnect watcher, verification worker running");

    Running { engine, store, background }
}

impl<S, L, C, F> Running<S, L, C, F>
where
    S: Store,
    L: Sleeper,
    C: Clock,
    F: SocketFactory,
{
    /// Ids currently holding a live Socket Supervisor, for tests/operators.
    pub fn pool_snapshot(&self) -> Vec<InstanceId> {
        self.engine.pool_snapshot()
    }

    /// Graceful shutdown (§4.12, §8 invariant 7): every supervised instance
    /// row becomes `DISCONNECTED` with an empty `qrCode`, every supervisor
    /// is torn down (sockets closed, timers cancelled), and the background
    /// loops stop. Session directories are left untouched — only a
    /// dashboard-initiated logout (§4.9) wipes credentials.
    pub async fn shutdown(self) {
        info!("worker engine shutting down");

        for task in &self.background {
            task.abort();
        }

        let ids = self.engine.pool_snapshot();

        if let Err(err) = self.store.disconnect_all(&ids).await {
            warn!(error = %err, "failed to persist DISCONNECTED on shutdown for one or more instances");
        }

        for id in &ids {
            Connector::tear_down(self.engine.as_ref(), id).await;
        }

        info!(instance_count = ids.len(), "worker engine shutdown complete");
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
