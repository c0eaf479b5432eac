// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the waengine authors

//! Broadcast Processor (§4.10): the per-instance loop a Socket Supervisor
//! launches the moment it reaches CONNECTED. Claims the oldest broadcast,
//! works its pending batch message by message with the anti-ban pacing
//! from [`crate::anti_ban`] and `waengine_core`, and keeps going until the
//! supervisor pauses or tears it down.
//!
//! Each gate (warm-up, working-hours, daily cap) is a `loop { ...; sleep
//! one chunk; recheck }` inside a single call, exactly as §4.10 describes
//! — the `Sleeper`/`Clock` seam is what makes that convergent loop
//! exercisable in a test without a real wall-clock wait (see
//! `processor_tests.rs`'s clock-advancing fake sleeper).

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Timelike, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use waengine_adapters::{MemoryGuard, MediaFetcher, OutboundContent, PresenceState, Sleeper, Socket};
use waengine_core::{
    human_clock, spintax, to_jid, trust_tier, trust_tier::TierParams, zerowidth, AntiBannedMeta,
    Broadcast, BroadcastId, BroadcastLog, BroadcastStatus, Clock, InstanceId, LogAction, Message,
};
use waengine_store::{SendSuccess, Store, StoreError};

use crate::anti_ban;

const CLAIM_EMPTY_SLEEP: Duration = Duration::from_secs(10);
const PAUSED_SLEEP: Duration = Duration::from_secs(10);
const SESSION_PROBE_RETRY_SLEEP: Duration = Duration::from_secs(10);
const RELOAD_SLEEP: Duration = Duration::from_secs(2);
const WARMUP_CHUNK: Duration = Duration::from_secs(5 * 60);
const WORKING_HOURS_CHUNK: Duration = Duration::from_secs(60);
const DAILY_CAP_CHUNK: Duration = Duration::from_secs(5 * 60);
const WARMUP_HOURS: i64 = 24;
const TEXT_SEND_TIMEOUT: Duration = Duration::from_secs(30);
const MEDIA_SEND_TIMEOUT: Duration = Duration::from_secs(60);

/// Outcome of one [`BroadcastProcessor::tick`], surfaced for tests and
/// logging — the real driver loop only cares that it returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Paused,
    NothingToClaim,
    NoCredit,
    SessionProbeFailed,
    BroadcastCompleted,
    BatchReloadNeeded,
    RateLimited,
    BatchProcessed,
}

struct DailyCounter {
    date: chrono::NaiveDate,
    count: u32,
}

/// One instance's Broadcast Processor. Lives exactly as long as the
/// Socket Supervisor that launched it (§4.10 "single-flight").
pub struct BroadcastProcessor<S, L, C> {
    store: Arc<S>,
    sleeper: Arc<L>,
    clock: Arc<C>,
    socket: Arc<dyn Socket>,
    media: Arc<MediaFetcher>,
    memory: Arc<MemoryGuard>,
    instance_id: InstanceId,
    instance_created_at: chrono::DateTime<Utc>,
    connected_since: chrono::DateTime<Utc>,
    rng: Mutex<StdRng>,
    is_paused: Arc<AtomicBool>,
    consecutive_fail_count: AtomicU32,
    batch_message_count: AtomicU32,
    total_sent_session: AtomicU64,
    daily: Mutex<DailyCounter>,
    session_validated: Mutex<HashSet<BroadcastId>>,
    announced: Mutex<HashSet<BroadcastId>>,
}

impl<S, L, C> BroadcastProcessor<S, L, C>
where
    S: Store,
    L: Sleeper,
    C: Clock,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<S>,
        sleeper: Arc<L>,
        clock: Arc<C>,
        socket: Arc<dyn Socket>,
        media: Arc<MediaFetcher>,
        memory: Arc<MemoryGuard>,
        instance_id: InstanceId,
        instance_created_at: chrono::DateTime<Utc>,
        is_paused: Arc<AtomicBool>,
    ) -> Self {
        let now = clock.now_utc();
        Self {
            instance_created_at,
            connected_since: now,
            rng: Mutex::new(StdRng::from_rng(&mut rand::rng())),
            store,
            sleeper,
            clock,
            socket,
            media,
            memory,
            instance_id,
            is_paused,
            consecutive_fail_count: AtomicU32::new(0),
            batch_message_count: AtomicU32::new(0),
            total_sent_session: AtomicU64::new(0),
            daily: Mutex::new(DailyCounter { date: chrono::NaiveDate::MIN, count: 0 }),
            session_validated: Mutex::new(HashSet::new()),
            announced: Mutex::new(HashSet::new()),
        }
    }

    /// Seed the RNG deterministically, for tests.
    #[cfg(any(test, feature = "test-support"))]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Run until the caller drops this processor (the Socket Supervisor
    /// tearing down the connection stops polling it).
    pub async fn run(&self) {
        loop {
            match self.tick().await {
                Ok(_) => {}
                Err(err) => tracing::warn!(error = %err, "broadcast processor tick failed"),
            }
        }
    }

    /// One iteration of §4.10: preconditions, claim, gates, batch.
    pub async fn tick(&self) -> Result<TickOutcome, StoreError> {
        // (a) Preconditions.
        if self.is_paused.load(Ordering::Acquire) {
            self.sleeper.sleep(PAUSED_SLEEP).await;
            return Ok(TickOutcome::Paused);
        }
        if self.memory.signal() == waengine_adapters::GuardSignal::Soft {
            tracing::info!(instance_id = %self.instance_id, "memory guard soft threshold, easing pace");
        }

        // (b) Claim a broadcast.
        let claim = match self.store.claim_broadcast(&self.instance_id).await? {
            Some(claim) => claim,
            None => {
                self.sleeper.sleep(CLAIM_EMPTY_SLEEP).await;
                return Ok(TickOutcome::NothingToClaim);
            }
        };
        let mut broadcast = claim.broadcast;

        // (c) Credit gate.
        if claim.user.credit == 0 {
            self.store.set_broadcast_status(&broadcast.id, BroadcastStatus::PausedNoCredit).await?;
            return Ok(TickOutcome::NoCredit);
        }

        // (d) Compute tier, (e) warm-up, (f) link detection — all gated on
        // the PENDING -> RUNNING transition happening exactly once.
        let instance = self
            .store
            .get_instance(&self.instance_id)
            .await?
            .unwrap_or_else(|| fallback_instance(&self.instance_id, self.instance_created_at));
        let session_age_hours = (self.clock.now_utc() - self.connected_since).num_seconds() as f64 / 3600.0;
        let mut tier = trust_tier::classify(Some(instance.age_days(self.clock.now_utc())), session_age_hours);

        let first_touch = broadcast.status == BroadcastStatus::Pending
            && self.announced.lock().insert(broadcast.id.clone());
        if first_touch {
            self.store
                .append_log(BroadcastLog::new(
                    broadcast.id.clone(),
                    LogAction::TrustTier,
                    format!("tier={} batchSize={}", tier.tier, tier.batch_size),
                    self.clock.now_utc(),
                ))
                .await?;

            if anti_ban::contains_link(&broadcast.message) {
                let loud = matches!(tier.tier, waengine_core::Tier::Newborn | waengine_core::Tier::Infant);
                let detail = if loud {
                    format!("campaign body contains a link on a {} instance", tier.tier)
                } else {
                    "campaign body contains a link".to_string()
                };
                self.store
                    .append_log(BroadcastLog::new(broadcast.id.clone(), LogAction::LinkDetected, detail, self.clock.now_utc()))
                    .await?;
            }

            self.warm_up_gate(&broadcast, instance.age_hours(self.clock.now_utc())).await?;
            self.store.set_broadcast_status(&broadcast.id, BroadcastStatus::Running).await?;
            broadcast.status = BroadcastStatus::Running;
        }

        // (g) Session validation, once per broadcast.
        if self.session_validated.lock().insert(broadcast.id.clone()) {
            if let Some(jid) = instance_self_jid(&self.socket) {
                if self.socket.presence_subscribe(&jid).await.is_err() {
                    self.session_validated.lock().remove(&broadcast.id);
                    self.sleeper.sleep(SESSION_PROBE_RETRY_SLEEP).await;
                    return Ok(TickOutcome::SessionProbeFailed);
                }
            }
        }

        // (h) Working-hours gate.
        if self.working_hours_gate(&broadcast).await? == GateExit::BailedPaused {
            return Ok(TickOutcome::Paused);
        }

        // (i) Daily gate. Refresh the tier's soft cap against a possibly
        // rolled-over daily counter.
        self.daily_gate(&broadcast, &tier).await?;
        tier = trust_tier::classify(Some(instance.age_days(self.clock.now_utc())), session_age_hours);

        // (j) Empty batch handling.
        if claim.batch.is_empty() {
            let pending = self.store.count_pending_messages(&broadcast.id).await?;
            if pending == 0 {
                self.store.set_broadcast_status(&broadcast.id, BroadcastStatus::Completed).await?;
                self.media.clear_broadcast(&broadcast.id);
                self.batch_message_count.store(0, Ordering::Relaxed);
                return Ok(TickOutcome::BroadcastCompleted);
            }
            self.sleeper.sleep(RELOAD_SLEEP).await;
            return Ok(TickOutcome::BatchReloadNeeded);
        }

        // (k) Per-message pipeline.
        for message in claim.batch {
            if self.is_paused.load(Ordering::Acquire) {
                break;
            }
            match self.process_message(&broadcast, message, &tier).await {
                Ok(MessageOutcome::RateLimited) => {
                    self.is_paused.store(true, Ordering::Release);
                    self.store.set_broadcast_status(&broadcast.id, BroadcastStatus::PausedRateLimit).await?;
                    self.store
                        .append_log(BroadcastLog::new(
                            broadcast.id.clone(),
                            LogAction::RateLimitPause,
                            "rate limited while sending",
                            self.clock.now_utc(),
                        ))
                        .await?;
                    return Ok(TickOutcome::RateLimited);
                }
                Ok(MessageOutcome::Continued) => {}
                Err(err) => return Err(err),
            }
        }

        Ok(TickOutcome::BatchProcessed)
    }

    async fn warm_up_gate(&self, broadcast: &Broadcast, mut age_hours: i64) -> Result<(), StoreError> {
        if broadcast.is_turbo_mode {
            return Ok(());
        }
        while age_hours < WARMUP_HOURS {
            self.store.set_broadcast_status(&broadcast.id, BroadcastStatus::PausedWorkingHours).await?;
            self.sleeper.sleep(WARMUP_CHUNK).await;
            age_hours = (self.clock.now_utc() - self.instance_created_at).num_hours();
        }
        Ok(())
    }

    async fn working_hours_gate(&self, broadcast: &Broadcast) -> Result<GateExit, StoreError> {
        if broadcast.is_turbo_mode {
            return Ok(GateExit::Proceeded);
        }
        while !human_clock::is_open_at(broadcast.working_hour_start, broadcast.working_hour_end, self.clock.now_local()) {
            if self.is_paused.load(Ordering::Acquire) {
                return Ok(GateExit::BailedPaused);
            }
            self.store.set_broadcast_status(&broadcast.id, BroadcastStatus::PausedWorkingHours).await?;
            let _ = self.socket.send_presence_update(PresenceState::Unavailable, None).await;
            let now = self.clock.now_local();
            let wait_ms = human_clock::millis_until_open(
                broadcast.working_hour_start,
                broadcast.working_hour_end,
                now.hour() as u8,
                now.minute() as u8,
                now.second() as u8,
            );
            // Never oversleep past a shorter re-check window: `is_paused` can
            // flip, or the broadcast's hours can be edited, between wakeups.
            self.sleeper.sleep(Duration::from_millis(wait_ms).min(WORKING_HOURS_CHUNK)).await;
        }
        let _ = self.socket.send_presence_update(PresenceState::Available, None).await;
        self.store.set_broadcast_status(&broadcast.id, BroadcastStatus::Running).await?;
        Ok(GateExit::Proceeded)
    }

    async fn daily_gate(&self, broadcast: &Broadcast, tier: &TierParams) -> Result<(), StoreError> {
        loop {
            let today = self.clock.now_local().date_naive();
            {
                let mut daily = self.daily.lock();
                if daily.date != today {
                    daily.date = today;
                    daily.count = 0;
                }
            }
            let effective_cap = tier.daily_soft_cap.apply(broadcast.daily_limit);
            let at_cap = effective_cap != 0 && self.daily.lock().count >= effective_cap;
            if !at_cap {
                return Ok(());
            }
            self.store.set_broadcast_status(&broadcast.id, BroadcastStatus::PausedWorkingHours).await?;
            self.sleeper.sleep(DAILY_CAP_CHUNK).await;
        }
    }

    async fn process_message(
        &self,
        broadcast: &Broadcast,
        mut message: Message,
        tier: &TierParams,
    ) -> Result<MessageOutcome, StoreError> {
        // 1. Circuit breaker.
        if anti_ban::circuit_tripped(self.consecutive_fail_count.load(Ordering::Acquire), tier.circuit_threshold) {
            self.store
                .append_log(BroadcastLog::new(
                    broadcast.id.clone(),
                    LogAction::CircuitBreaker,
                    "consecutive failures tripped the circuit breaker",
                    self.clock.now_utc(),
                ))
                .await?;
            let _ = self.socket.send_presence_update(PresenceState::Unavailable, None).await;
            let cooldown = self.rng.lock().random_range(60..=180u64);
            self.sleeper.sleep(Duration::from_secs(cooldown)).await;
            let _ = self.socket.send_presence_update(PresenceState::Available, None).await;
            self.consecutive_fail_count.store(0, Ordering::Release);
        }

        // 2. Normalise recipient.
        let jid = match to_jid(&message.recipient) {
            Some(jid) => jid,
            None => {
                return self.fail_message(broadcast, &mut message, "invalid phone number".to_string()).await;
            }
        };

        // 3. Pre-verify.
        if tier.requires_pre_verify && !broadcast.is_turbo_mode {
            match self.socket.on_whatsapp(&jid).await {
                Ok(result) if !result.exists => {
                    self.store
                        .record_send_failure(&message.id, "recipient not on WhatsApp".to_string())
                        .await?;
                    self.store
                        .append_log(BroadcastLog::new(
                            broadcast.id.clone(),
                            LogAction::SkipInvalid,
                            jid.clone(),
                            self.clock.now_utc(),
                        ))
                        .await?;
                    let backoff = self.rng.lock().random_range(1000..=3000u64);
                    self.sleeper.sleep(Duration::from_millis(backoff)).await;
                    return Ok(MessageOutcome::Continued);
                }
                Ok(_) => {}
                Err(_) => {
                    // Network errors during probe never block the send.
                }
            }
        }

        // 4. Random activity injection.
        if anti_ban::rolls_random_activity(broadcast.is_turbo_mode, tier.random_activity_chance, &mut self.rng.lock()) {
            let activity = anti_ban::StealthActivity::pick(&mut self.rng.lock());
            let duration = activity.sample_duration_secs(&mut self.rng.lock());
            let result: Result<(), waengine_adapters::SocketError> = async {
                match activity {
                    anti_ban::StealthActivity::Offline => {
                        self.socket.send_presence_update(PresenceState::Unavailable, None).await?;
                        self.sleeper.sleep(Duration::from_secs(duration)).await;
                        self.socket.send_presence_update(PresenceState::Available, None).await?;
                    }
                    anti_ban::StealthActivity::PretendRead => {
                        self.socket.read_messages(&[]).await?;
                        self.sleeper.sleep(Duration::from_secs(duration)).await;
                    }
                    anti_ban::StealthActivity::BrowsePause => {
                        self.sleeper.sleep(Duration::from_secs(duration)).await;
                    }
                    anti_ban::StealthActivity::Composing => {
                        self.socket.send_presence_update(PresenceState::Composing, Some(&jid)).await?;
                        self.sleeper.sleep(Duration::from_secs(duration)).await;
                        self.socket.send_presence_update(PresenceState::Paused, Some(&jid)).await?;
                    }
                }
                Ok(())
            }
            .await;
            if result.is_ok() {
                self.store
                    .append_log(BroadcastLog::new(broadcast.id.clone(), activity.log_action(), format!("{duration}s"), self.clock.now_utc()))
                    .await?;
            }
        }

        // 5. Resolve content.
        let content = spintax::expand_with_rng(&broadcast.message, &mut self.rng.lock());
        self.store
            .append_log(BroadcastLog::new(broadcast.id.clone(), LogAction::Spintax, preview(&content, 100), self.clock.now_utc()))
            .await?;

        // 6. Tag uniqueness.
        let tagged = zerowidth::tag_with_rng(&content, &mut self.rng.lock());
        self.store
            .append_log(BroadcastLog::new(broadcast.id.clone(), LogAction::UniqueSuffix, tagged.token.clone(), self.clock.now_utc()))
            .await?;

        // 7. Typing simulation.
        let has_image = broadcast.image_url.is_some();
        let typing_ms = anti_ban::typing_duration_ms(tagged.text.chars().count(), has_image, tier.typing_multiplier, &mut self.rng.lock());
        let _ = self.socket.presence_subscribe(&jid).await;
        let _ = self.socket.send_presence_update(PresenceState::Composing, Some(&jid)).await;
        self.sleeper.sleep(Duration::from_millis(typing_ms)).await;
        let _ = self.socket.send_presence_update(PresenceState::Paused, Some(&jid)).await;

        // 8. Send, each raced against its own per-operation timeout so a
        // hung socket call still yields a FAILED message rather than
        // stalling the whole processor loop.
        let send_result = if let Some(url) = &broadcast.image_url {
            match self.media.fetch(&broadcast.id, url).await {
                Ok(bytes) => {
                    let content = OutboundContent::Image { bytes, caption: Some(tagged.text.clone()) };
                    race_send(self.socket.send_message(&jid, content), MEDIA_SEND_TIMEOUT).await
                }
                Err(err) => Err(waengine_adapters::SocketError::Transport(err.to_string())),
            }
        } else {
            let content = OutboundContent::Text(tagged.text.clone());
            race_send(self.socket.send_message(&jid, content), TEXT_SEND_TIMEOUT).await
        };

        // Drawn once, ahead of step 9, so the persisted `antiBannedMeta`
        // (§4.10 "post-send delay ms") reports the exact delay step 14
        // then sleeps for — not a second, independent draw.
        let delay_ms = anti_ban::post_send_delay_ms(broadcast.delay_min, broadcast.delay_max, tier.delay_multiplier, &mut self.rng.lock());

        let outcome = match send_result {
            Ok(()) => {
                // 9. On success.
                let now = self.clock.now_utc();
                let daily_index = {
                    let mut daily = self.daily.lock();
                    daily.count += 1;
                    daily.count
                };
                let batch_index = self.batch_message_count.load(Ordering::Acquire) + 1;
                let total_sent = self.total_sent_session.fetch_add(1, Ordering::AcqRel) + 1;
                let consecutive_before = self.consecutive_fail_count.swap(0, Ordering::AcqRel);
                let meta = AntiBannedMeta {
                    spintax_variant: preview(&content, 200).to_string(),
                    zero_width_token: tagged.token.clone(),
                    typing_duration_ms: typing_ms,
                    post_send_delay_ms: delay_ms,
                    batch_index,
                    daily_index,
                    memory_mb: self.memory.last_sample_mb(),
                    timestamp: now,
                    has_media: has_image,
                    instance_id: self.instance_id.clone(),
                    is_turbo: broadcast.is_turbo_mode,
                    tier_name: tier.tier.to_string(),
                    account_age_days: (now - self.instance_created_at).num_days(),
                    delay_multiplier: tier.delay_multiplier,
                    consecutive_fails_before_send: consecutive_before,
                    total_sent_in_session: total_sent,
                };
                self.store
                    .record_send_success(SendSuccess { message_id: &message.id, sent_at: now, content: tagged.text.clone(), meta })
                    .await?;
                MessageOutcome::Continued
            }
            Err(err) if is_rate_limit_error(&err) => MessageOutcome::RateLimited,
            Err(err) => {
                // 11. On other error.
                self.consecutive_fail_count.fetch_add(1, Ordering::AcqRel);
                self.store.record_send_failure(&message.id, err.to_string()).await?;
                MessageOutcome::Continued
            }
        };

        // A rate-limit error breaks out of the batch immediately (§4.10
        // step 10) — no batch cooling or post-send delay for this message.
        // The message that triggered it is still the one in flight, so it
        // is marked FAILED like any other send error before the break (§8
        // rate-limit scenario: "Messages 1–3 SENT, 4 FAILED").
        if outcome == MessageOutcome::RateLimited {
            self.store.record_send_failure(&message.id, "rate limited by provider".to_string()).await?;
            return Ok(outcome);
        }

        // 13. Batch cooling.
        let batch_count = self.batch_message_count.fetch_add(1, Ordering::AcqRel) + 1;
        if batch_count >= tier.batch_size {
            let _ = self.socket.send_presence_update(PresenceState::Unavailable, None).await;
            let cooldown = self.rng.lock().random_range(tier.cooldown_min_secs..=tier.cooldown_max_secs);
            self.sleeper.sleep(Duration::from_secs(cooldown)).await;
            let _ = self.socket.send_presence_update(PresenceState::Available, None).await;
            self.batch_message_count.store(0, Ordering::Release);
        }

        // 14. Post-send delay.
        self.sleeper.sleep(Duration::from_millis(delay_ms)).await;

        Ok(outcome)
    }

    async fn fail_message(
        &self,
        broadcast: &Broadcast,
        message: &mut Message,
        reason: String,
    ) -> Result<MessageOutcome, StoreError> {
        self.store.record_send_failure(&message.id, reason.clone()).await?;
        self.store
            .append_log(BroadcastLog::new(broadcast.id.clone(), LogAction::SkipInvalid, reason, self.clock.now_utc()))
            .await?;
        Ok(MessageOutcome::Continued)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateExit {
    Proceeded,
    BailedPaused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessageOutcome {
    Continued,
    RateLimited,
}

/// Distinguishes a rate-limit response from an ordinary send failure
/// (§4.10 step 10 vs step 11). The protocol library surfaces this as a
/// transport error whose message names the limit; a bare timeout is a
/// transient failure, not a rate limit.
fn is_rate_limit_error(err: &waengine_adapters::SocketError) -> bool {
    matches!(err, waengine_adapters::SocketError::Transport(msg) if msg.to_lowercase().contains("rate limit"))
}

/// §4.10 step 8: races a send future against its per-operation timeout,
/// collapsing expiry into the same `SocketError::Timeout` a real send
/// failure would produce.
async fn race_send(
    send: impl std::future::Future<Output = Result<(), waengine_adapters::SocketError>>,
    budget: Duration,
) -> Result<(), waengine_adapters::SocketError> {
    match tokio::time::timeout(budget, send).await {
        Ok(result) => result,
        Err(_) => Err(waengine_adapters::SocketError::Timeout(budget)),
    }
}

fn preview(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn instance_self_jid(socket: &Arc<dyn Socket>) -> Option<String> {
    socket.user()
}

fn fallback_instance(id: &InstanceId, created_at: chrono::DateTime<Utc>) -> waengine_core::Instance {
    waengine_core::Instance {
        id: id.clone(),
        phone_number: String::new(),
        name: String::new(),
        status: waengine_core::InstanceStatus::Connected,
        qr_code: String::new(),
        created_at,
        updated_at: created_at,
        linked_user_ids: Vec::new(),
    }
}

#[cfg(test)]
#[path = "processor_tests.rs"]
mod tests;
