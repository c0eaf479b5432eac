// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the waengine authors

//! The async driver around the Socket Supervisor reducer (§4.7): owns the
//! per-instance supervisor pool, interprets [`SupervisorEffect`]s against
//! real adapters, and is the concrete [`Connector`]/[`Supervision`] the
//! Connection Manager and Disconnect Watcher drive.
//!
//! Grounded in the teacher's split between a pure reducer and the owning
//! process that feeds it real events (`crates/engine/src/runtime/mod.rs`
//! vs `crates/daemon/src/lifecycle.rs`): [`supervisor::reduce`] is the pure
//! half, `Engine` is the impure half that actually opens sockets, sleeps,
//! and persists rows.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

use waengine_adapters::{
    AdmissionGate, BrowserFingerprint, ConnectConfig, ConnectionUpdate, InboundMessage,
    MediaFetcher, MemoryGuard, PresenceState, Sleeper, Socket, SocketEvent, SocketFactory,
    FINGERPRINT_POOL,
};
use waengine_core::{BroadcastStatus, Clock, InstanceId, InstanceStatus};
use waengine_store::{SessionDirs, Store};

use crate::close_classifier::ReconnectDelay;
use crate::connection_manager::Connector;
use crate::disconnect_watcher::Supervision;
use crate::processor::BroadcastProcessor;
use crate::supervisor::{reduce, SupervisorEffect, SupervisorEvent, SupervisorState};
use crate::verification_worker::SocketSource;

const STUCK_TIMER: Duration = Duration::from_secs(90);
const QR_TIMER: Duration = Duration::from_secs(60);
const HANDSHAKE_DELAY_MIN_MS: u64 = 2_000;
const HANDSHAKE_DELAY_MAX_MS: u64 = 5_000;
const KEEP_ALIVE_MIN_MS: u64 = 25_000;
const KEEP_ALIVE_MAX_MS: u64 = 45_000;
const NORMAL_RECONNECT_MIN_SECS: u64 = 3;
const NORMAL_RECONNECT_MAX_SECS: u64 = 10;
const RATE_LIMIT_RECONNECT_MIN_SECS: u64 = 25;
const RATE_LIMIT_RECONNECT_MAX_SECS: u64 = 45;
const STREAM_RESTART_DELAY: Duration = Duration::from_secs(2);
const HEARTBEAT_MIN_SECS: u64 = 30;
const HEARTBEAT_MAX_SECS: u64 = 90;
const HEARTBEAT_CHANCE: f64 = 0.4;
const AUTO_READ_MIN_SECS: u64 = 2;
const AUTO_READ_MAX_SECS: u64 = 8;

/// Reports the latest wire version for handshakes (§4.7: "the library's
/// 'fetch latest' helper"). A thin seam over the protocol library, which
/// this workspace otherwise never names directly (§1 "opaque socket
/// capability").
#[async_trait]
pub trait WireVersionSource: Send + Sync + 'static {
    async fn latest(&self) -> [u32; 3];
}

/// A wire version pinned at construction time, for offline operation and tests.
pub struct FixedWireVersion(pub [u32; 3]);

#[async_trait]
impl WireVersionSource for FixedWireVersion {
    async fn latest(&self) -> [u32; 3] {
        self.0
    }
}

struct SupervisorHandle {
    reducer: parking_lot::Mutex<SupervisorState>,
    is_paused: Arc<AtomicBool>,
    /// Set on `ConnectionOpen`, cleared on `TearDownSocket` (§4.11's "any
    /// healthy socket" borrow needs a status cheaper to check than walking
    /// the persisted `Instance.status` for every candidate).
    is_connected: Arc<AtomicBool>,
    socket: parking_lot::Mutex<Option<Arc<dyn Socket>>>,
    /// The event-loop task translating this socket's events through the
    /// reducer. Only aborted by a full teardown (a new `connect()` call or
    /// the Connection Manager/Disconnect Watcher removing the instance) —
    /// never by an effect it is itself in the middle of applying.
    event_loop: parking_lot::Mutex<Option<JoinHandle<()>>>,
    /// Heartbeat/auto-read/broadcast-processor tasks, tied to one socket
    /// generation: stopped by `TearDownSocket` and by full teardown.
    conn_tasks: parking_lot::Mutex<Vec<JoinHandle<()>>>,
    /// Stuck-connection/QR-expiry timers: stopped by `CancelTimers`,
    /// `TearDownSocket`, and full teardown.
    timers: parking_lot::Mutex<Vec<JoinHandle<()>>>,
    instance_created_at: chrono::DateTime<chrono::Utc>,
}

impl SupervisorHandle {
    fn new(instance_created_at: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            reducer: parking_lot::Mutex::new(SupervisorState::default()),
            is_paused: Arc::new(AtomicBool::new(false)),
            is_connected: Arc::new(AtomicBool::new(false)),
            socket: parking_lot::Mutex::new(None),
            event_loop: parking_lot::Mutex::new(None),
            conn_tasks: parking_lot::Mutex::new(Vec::new()),
            timers: parking_lot::Mutex::new(Vec::new()),
            instance_created_at,
        }
    }

    fn cancel_timers(&self) {
        for task in self.timers.lock().drain(..) {
            task.abort();
        }
    }

    /// Stop everything tied to the current socket generation, but leave the
    /// event loop itself running so it can keep applying effects (it is
    /// usually the caller of this very method).
    fn stop_connection_tasks(&self) {
        self.cancel_timers();
        for task in self.conn_tasks.lock().drain(..) {
            task.abort();
        }
    }

    fn abort_all(&self) {
        self.stop_connection_tasks();
        if let Some(task) = self.event_loop.lock().take() {
            task.abort();
        }
    }
}

/// Owns every live Socket Supervisor in the process (§3: "Supervisor
/// pool"). One [`Engine`] per daemon process.
pub struct Engine<S, G, L, C, F> {
    store: Arc<S>,
    sessions: Arc<SessionDirs>,
    gate: Arc<G>,
    sleeper: Arc<L>,
    clock: Arc<C>,
    factory: F,
    media: Arc<MediaFetcher>,
    memory: Arc<MemoryGuard>,
    wire_version: Arc<dyn WireVersionSource>,
    supervisors: parking_lot::Mutex<HashMap<InstanceId, Arc<SupervisorHandle>>>,
    connecting_locks: parking_lot::Mutex<HashMap<InstanceId, Arc<AsyncMutex<()>>>>,
    rng: parking_lot::Mutex<StdRng>,
    self_ref: Weak<Self>,
}

impl<S, G, L, C, F> Engine<S, G, L, C, F>
where
    S: Store,
    G: AdmissionGate,
    L: Sleeper,
    C: Clock,
    F: SocketFactory,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<S>,
        sessions: Arc<SessionDirs>,
        gate: Arc<G>,
        sleeper: Arc<L>,
        clock: Arc<C>,
        factory: F,
        media: Arc<MediaFetcher>,
        memory: Arc<MemoryGuard>,
        wire_version: Arc<dyn WireVersionSource>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            store,
            sessions,
            gate,
            sleeper,
            clock,
            factory,
            media,
            memory,
            wire_version,
            supervisors: parking_lot::Mutex::new(HashMap::new()),
            connecting_locks: parking_lot::Mutex::new(HashMap::new()),
            rng: parking_lot::Mutex::new(StdRng::from_rng(&mut rand::rng())),
            self_ref: weak.clone(),
        })
    }

    pub fn admission_gate(&self) -> Arc<G> {
        self.gate.clone()
    }

    /// Ids that currently own a live supervisor.
    pub fn pool_snapshot(&self) -> Vec<InstanceId> {
        self.supervisors.lock().keys().cloned().collect()
    }

    fn connecting_lock(&self, id: &InstanceId) -> Arc<AsyncMutex<()>> {
        self.connecting_locks
            .lock()
            .entry(id.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// `connect(id, isReconnect)` (§4.7 "Lifecycle operations"): coalesces
    /// concurrent callers behind a per-instance lock, tears down any prior
    /// supervisor, optionally wipes the session, then opens a fresh socket.
    pub async fn connect(self: &Arc<Self>, id: InstanceId, is_reconnect: bool) {
        let lock = self.connecting_lock(&id);
        let _guard = lock.lock().await;

        self.teardown_internal(&id).await;

        let persisted = self.store.get_instance(&id).await.ok().flatten();
        let was_initializing = persisted.as_ref().is_some_and(|i| i.status == InstanceStatus::Initializing);
        if !is_reconnect && was_initializing {
            if let Err(err) = self.sessions.delete(id.as_str()).await {
                tracing::warn!(instance_id = %id, error = %err, "failed to wipe session directory for fresh pairing");
            }
        }

        // §4.1: validate whatever is on disk before handing the directory
        // to the protocol library — an empty or malformed credential file
        // is deleted and treated as a non-fatal fresh start.
        if let Err(err) = self.sessions.prepare(id.as_str()).await {
            tracing::warn!(instance_id = %id, error = %err, "failed to prepare session directory");
        }

        let handshake_delay = self.rng.lock().random_range(HANDSHAKE_DELAY_MIN_MS..=HANDSHAKE_DELAY_MAX_MS);
        self.sleeper.sleep(Duration::from_millis(handshake_delay)).await;

        let fingerprint = self.pick_fingerprint();
        let keep_alive_interval_ms = self.rng.lock().random_range(KEEP_ALIVE_MIN_MS..=KEEP_ALIVE_MAX_MS);
        let wire_version = self.wire_version.latest().await;
        let config = ConnectConfig {
            session_dir: self.sessions.dir_for(id.as_str()),
            wire_version,
            browser_fingerprint: fingerprint,
            keep_alive_interval_ms,
        };

        let created_at = persisted.map(|i| i.created_at).unwrap_or_else(|| self.clock.now_utc());
        let handle = Arc::new(SupervisorHandle::new(created_at));
        self.supervisors.lock().insert(id.clone(), handle.clone());

        if let Err(err) = self.store.set_instance_status(&id, InstanceStatus::Initializing, None).await {
            tracing::warn!(instance_id = %id, error = %err, "failed to persist INITIALIZING");
        }

        let (events_tx, events_rx) = mpsc::channel(64);
        match self.factory.connect(config, events_tx).await {
            Ok(socket) => {
                *handle.socket.lock() = Some(socket);
            }
            Err(err) => {
                tracing::warn!(instance_id = %id, error = %err, "socket connect failed");
                self.supervisors.lock().remove(&id);
                let _ = self.store.set_instance_status(&id, InstanceStatus::Disconnected, None).await;
                return;
            }
        }

        let engine = Arc::clone(self);
        let loop_id = id.clone();
        let task = tokio::spawn(async move { engine.event_loop(loop_id, events_rx).await });
        *handle.event_loop.lock() = Some(task);
    }

    fn pick_fingerprint(&self) -> BrowserFingerprint {
        let idx = self.rng.lock().random_range(0..FINGERPRINT_POOL.len());
        FINGERPRINT_POOL[idx].clone()
    }

    async fn event_loop(self: Arc<Self>, id: InstanceId, mut events: mpsc::Receiver<SocketEvent>) {
        while let Some(event) = events.recv().await {
            let Some(handle) = self.supervisors.lock().get(&id).cloned() else { break };

            match event {
                SocketEvent::CredsUpdated => {
                    let user_present = handle.socket.lock().as_ref().and_then(|s| s.user()).is_some();
                    self.handle_event(&id, &handle, SupervisorEvent::CredsUpdated { user_present }).await;
                }
                SocketEvent::ConnectionUpdate(ConnectionUpdate::Connecting) => {
                    self.handle_event(&id, &handle, SupervisorEvent::ConnectionConnecting).await;
                }
                SocketEvent::ConnectionUpdate(ConnectionUpdate::QrCode(payload)) => {
                    self.handle_event(&id, &handle, SupervisorEvent::QrReceived(payload)).await;
                }
                SocketEvent::ConnectionUpdate(ConnectionUpdate::Open) => {
                    self.handle_event(&id, &handle, SupervisorEvent::ConnectionOpen).await;
                }
                SocketEvent::ConnectionUpdate(ConnectionUpdate::Close(close_event)) => {
                    self.handle_event(&id, &handle, SupervisorEvent::ConnectionClose(close_event)).await;
                }
                SocketEvent::MessagesUpsert(messages) => {
                    self.spawn_auto_read(&handle, messages);
                }
            }
        }
    }

    async fn handle_event(&self, id: &InstanceId, handle: &Arc<SupervisorHandle>, event: SupervisorEvent) {
        let effects = {
            let mut state = handle.reducer.lock();
            reduce(&mut state, event)
        };
        self.apply_effects(id, handle, effects).await;
    }

    async fn apply_effects(&self, id: &InstanceId, handle: &Arc<SupervisorHandle>, effects: Vec<SupervisorEffect>) {
        for effect in effects {
            match effect {
                SupervisorEffect::PersistStatus { status, qr_code } => {
                    if let Err(err) = self.store.set_instance_status(id, status, qr_code).await {
                        tracing::warn!(instance_id = %id, error = %err, "failed to persist status transition");
                    }
                }
                SupervisorEffect::TearDownSocket => {
                    *handle.socket.lock() = None;
                    handle.is_connected.store(false, Ordering::Release);
                    handle.stop_connection_tasks();
                }
                SupervisorEffect::ArmStuckTimer => {
                    self.arm_timer(id, handle, STUCK_TIMER, SupervisorEvent::StuckTimerFired)
                }
                SupervisorEffect::ArmQrTimer => {
                    self.arm_timer(id, handle, QR_TIMER, SupervisorEvent::QrTimerFired)
                }
                SupervisorEffect::CancelTimers => handle.cancel_timers(),
                SupervisorEffect::WipeSession => {
                    if let Err(err) = self.sessions.delete(id.as_str()).await {
                        tracing::warn!(instance_id = %id, error = %err, "failed to wipe session directory");
                    }
                }
                SupervisorEffect::Reconnect { delay, keep_session: _ } => self.spawn_reconnect(id, delay),
                SupervisorEffect::PauseRunningBroadcasts => {
                    handle.is_paused.store(true, Ordering::Release);
                    if let Err(err) = self.store.pause_running_broadcasts(id, BroadcastStatus::PausedRateLimit).await {
                        tracing::warn!(instance_id = %id, error = %err, "failed to pause running broadcasts");
                    }
                }
                SupervisorEffect::ResumeRunningBroadcasts => {
                    handle.is_paused.store(false, Ordering::Release);
                    if let Err(err) = self.store.resume_paused_broadcasts(id).await {
                        tracing::warn!(instance_id = %id, error = %err, "failed to resume paused broadcasts");
                    }
                }
                SupervisorEffect::StartPresenceHeartbeat => {
                    handle.is_connected.store(true, Ordering::Release);
                    self.spawn_presence_heartbeat(handle);
                }
                SupervisorEffect::StartAutoRead => {
                    // Auto-read is event-driven off `MessagesUpsert` in
                    // `event_loop`; nothing to start eagerly here.
                }
                SupervisorEffect::LaunchBroadcastProcessor => self.spawn_broadcast_processor(id, handle),
                SupervisorEffect::GiveUp => {}
            }
        }
    }

    fn arm_timer(&self, id: &InstanceId, handle: &Arc<SupervisorHandle>, duration: Duration, event: SupervisorEvent) {
        let Some(engine) = self.self_ref.upgrade() else { return };
        let sleeper = self.sleeper.clone();
        let handle2 = handle.clone();
        let id = id.clone();
        let task = tokio::spawn(async move {
            sleeper.sleep(duration).await;
            let effects = {
                let mut state = handle2.reducer.lock();
                reduce(&mut state, event)
            };
            engine.apply_effects(&id, &handle2, effects).await;
        });
        handle.timers.lock().push(task);
    }

    fn spawn_reconnect(&self, id: &InstanceId, delay: ReconnectDelay) {
        let Some(engine) = self.self_ref.upgrade() else { return };
        let sleeper = self.sleeper.clone();
        let id = id.clone();
        let rng_seed = self.rng.lock().random::<u64>();
        tokio::spawn(async move {
            let mut rng = StdRng::seed_from_u64(rng_seed);
            let wait = match delay {
                ReconnectDelay::StreamRestart => STREAM_RESTART_DELAY,
                ReconnectDelay::Normal => {
                    Duration::from_secs(rng.random_range(NORMAL_RECONNECT_MIN_SECS..=NORMAL_RECONNECT_MAX_SECS))
                }
                ReconnectDelay::RateLimited => {
                    Duration::from_secs(rng.random_range(RATE_LIMIT_RECONNECT_MIN_SECS..=RATE_LIMIT_RECONNECT_MAX_SECS))
                }
            };
            sleeper.sleep(wait).await;
            engine.connect(id, true).await;
        });
    }

    fn spawn_presence_heartbeat(&self, handle: &Arc<SupervisorHandle>) {
        let sleeper = self.sleeper.clone();
        let handle2 = handle.clone();
        let rng_seed = self.rng.lock().random::<u64>();
        let task = tokio::spawn(async move {
            let mut rng = StdRng::seed_from_u64(rng_seed);
            loop {
                let secs = rng.random_range(HEARTBEAT_MIN_SECS..=HEARTBEAT_MAX_SECS);
                sleeper.sleep(Duration::from_secs(secs)).await;
                if handle2.is_paused.load(Ordering::Acquire) {
                    continue;
                }
                let Some(socket) = handle2.socket.lock().clone() else { break };
                if rng.random::<f64>() < HEARTBEAT_CHANCE {
                    let _ = socket.send_presence_update(PresenceState::Available, None).await;
                }
            }
        });
        handle.conn_tasks.lock().push(task);
    }

    fn spawn_auto_read(&self, handle: &Arc<SupervisorHandle>, messages: Vec<InboundMessage>) {
        for message in messages {
            if message.from_self || message.is_status_broadcast {
                continue;
            }
            let sleeper = self.sleeper.clone();
            let handle2 = handle.clone();
            let rng_seed = self.rng.lock().random::<u64>();
            let key = message.key.clone();
            let task = tokio::spawn(async move {
                let mut rng = StdRng::seed_from_u64(rng_seed);
                let secs = rng.random_range(AUTO_READ_MIN_SECS..=AUTO_READ_MAX_SECS);
                sleeper.sleep(Duration::from_secs(secs)).await;
                if let Some(socket) = handle2.socket.lock().clone() {
                    let _ = socket.read_messages(&[key]).await;
                }
            });
            handle.conn_tasks.lock().push(task);
        }
    }

    fn spawn_broadcast_processor(&self, id: &InstanceId, handle: &Arc<SupervisorHandle>) {
        let Some(socket) = handle.socket.lock().clone() else { return };
        let processor = BroadcastProcessor::new(
            self.store.clone(),
            self.sleeper.clone(),
            self.clock.clone(),
            socket,
            self.media.clone(),
            self.memory.clone(),
            id.clone(),
            handle.instance_created_at,
            handle.is_paused.clone(),
        );
        let task = tokio::spawn(async move { processor.run().await });
        handle.conn_tasks.lock().push(task);
    }

    async fn teardown_internal(&self, id: &InstanceId) {
        if let Some(handle) = self.supervisors.lock().remove(id) {
            handle.abort_all();
            *handle.socket.lock() = None;
        }
    }
}

#[async_trait]
impl<S, G, L, C, F> Connector for Engine<S, G, L, C, F>
where
    S: Store,
    G: AdmissionGate,
    L: Sleeper,
    C: Clock,
    F: SocketFactory,
{
    async fn connect(&self, id: &InstanceId, resume: bool) {
        let Some(engine) = self.self_ref.upgrade() else { return };
        Engine::connect(&engine, id.clone(), resume).await;
    }

    async fn tear_down(&self, id: &InstanceId) {
        self.teardown_internal(id).await;
    }
}

#[async_trait]
impl<S, G, L, C, F> Supervision for Engine<S, G, L, C, F>
where
    S: Store,
    G: AdmissionGate,
    L: Sleeper,
    C: Clock,
    F: SocketFactory,
{
    fn has_supervisor(&self, id: &InstanceId) -> bool {
        self.supervisors.lock().contains_key(id)
    }

    async fn logout(&self, id: &InstanceId) -> Result<(), String> {
        let socket = self.supervisors.lock().get(id).and_then(|h| h.socket.lock().clone());
        match socket {
            Some(socket) => socket.logout().await.map_err(|e| e.to_string()),
            None => Ok(()),
        }
    }

    async fn tear_down(&self, id: &InstanceId) {
        self.teardown_internal(id).await;
    }
}

impl<S, G, L, C, F> SocketSource for Engine<S, G, L, C, F>
where
    S: Store,
    G: AdmissionGate,
    L: Sleeper,
    C: Clock,
    F: SocketFactory,
{
    /// Any one socket currently `CONNECTED` (§4.11 "borrowing any healthy
    /// socket"). Iteration order is the pool's hash order, which is fine —
    /// the Verification Worker has no preference between healthy sockets.
    fn any_connected(&self) -> Option<Arc<dyn Socket>> {
        self.supervisors
            .lock()
            .values()
            .find(|handle| handle.is_connected.load(Ordering::Acquire))
            .and_then(|handle| handle.socket.lock().clone())
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
