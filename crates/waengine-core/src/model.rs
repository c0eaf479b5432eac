// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the waengine authors

//! The relational data model (§3). These types mirror the dashboard-owned
//! schema; the engine never migrates it, only reads and writes rows through
//! [`crate`]-external `Store` implementations.

use crate::ids::{BroadcastId, ContactId, InstanceId, MessageId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// §4.7 Socket Supervisor states, persisted on [`Instance::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    Disconnected,
    Initializing,
    QrReady,
    Connected,
    Disconnecting,
}

impl InstanceStatus {
    /// Instances in these states own exactly one Socket Supervisor (§8 invariant 1).
    pub fn has_supervisor(self) -> bool {
        !matches!(self, InstanceStatus::Disconnected)
    }
}

/// One tenant's paired session (§3 Instance).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub id: InstanceId,
    pub phone_number: String,
    pub name: String,
    pub status: InstanceStatus,
    pub qr_code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// At least one linked user is required before the Connection Manager
    /// admits the instance (§4.8 step 2).
    pub linked_user_ids: Vec<UserId>,
}

impl Instance {
    /// Whole days since `created_at`, used by the Trust Tier Classifier (§4.5).
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days().max(0)
    }

    pub fn age_hours(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_hours().max(0)
    }
}

/// Campaign status (§3 Broadcast).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BroadcastStatus {
    Pending,
    Running,
    PausedRateLimit,
    PausedWorkingHours,
    PausedNoCredit,
    Completed,
    Failed,
}

impl BroadcastStatus {
    pub fn is_claimable(self) -> bool {
        matches!(self, BroadcastStatus::Pending | BroadcastStatus::Running)
    }
}

/// One authored campaign (§3 Broadcast).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Broadcast {
    pub id: BroadcastId,
    pub user_id: UserId,
    pub instance_id: InstanceId,
    pub name: String,
    pub message: String,
    pub image_url: Option<String>,
    pub status: BroadcastStatus,
    pub total: u32,
    pub sent: u32,
    pub failed: u32,
    pub delay_min: u32,
    pub delay_max: u32,
    pub daily_limit: u32,
    pub working_hour_start: u8,
    pub working_hour_end: u8,
    pub is_turbo_mode: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Broadcast {
    /// §8 invariant 3: `sent + failed <= total` always.
    pub fn accounted_for(&self) -> u32 {
        self.sent + self.failed
    }
}

/// §3 Message status: one-way PENDING -> {SENT, FAILED} (§8 invariant 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    Pending,
    Sent,
    Failed,
}

/// Structured record of the pacing decisions made for one send (§4.10,
/// "antiBannedMeta contents").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AntiBannedMeta {
    pub spintax_variant: String,
    pub zero_width_token: String,
    pub typing_duration_ms: u64,
    pub post_send_delay_ms: u64,
    pub batch_index: u32,
    pub daily_index: u32,
    pub memory_mb: u64,
    pub timestamp: DateTime<Utc>,
    pub has_media: bool,
    pub instance_id: InstanceId,
    pub is_turbo: bool,
    pub tier_name: String,
    pub account_age_days: i64,
    pub delay_multiplier: f64,
    pub consecutive_fails_before_send: u32,
    pub total_sent_in_session: u64,
}

impl AntiBannedMeta {
    /// First 200 chars of the spintax variant, per the spec's truncation rule.
    pub fn spintax_preview(&self) -> &str {
        truncate_chars(&self.spintax_variant, 200)
    }
}

fn truncate_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// One recipient slot within a broadcast (§3 Message).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub broadcast_id: BroadcastId,
    pub recipient: String,
    pub status: MessageStatus,
    pub sent_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub content: Option<String>,
    pub anti_banned_meta: Option<AntiBannedMeta>,
}

impl Message {
    pub fn new(id: MessageId, broadcast_id: BroadcastId, recipient: String) -> Self {
        Self {
            id,
            broadcast_id,
            recipient,
            status: MessageStatus::Pending,
            sent_at: None,
            error: None,
            content: None,
            anti_banned_meta: None,
        }
    }
}

/// The closed set of `BroadcastLog.action` tags named across §4.10 (a
/// supplement over the spec's "free-form" detail field — see SPEC_FULL.md
/// §2). `Display` produces the exact free-form string that gets persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogAction {
    TrustTier,
    Spintax,
    UniqueSuffix,
    StealthOffline,
    StealthPretendRead,
    StealthBrowsePause,
    StealthComposing,
    SkipInvalid,
    RateLimitPause,
    CircuitBreaker,
    LinkDetected,
}

impl std::fmt::Display for LogAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogAction::TrustTier => "TRUST_TIER",
            LogAction::Spintax => "SPINTAX",
            LogAction::UniqueSuffix => "UNIQUE_SUFFIX",
            LogAction::StealthOffline => "STEALTH_OFFLINE",
            LogAction::StealthPretendRead => "STEALTH_PRETEND_READ",
            LogAction::StealthBrowsePause => "STEALTH_BROWSE_PAUSE",
            LogAction::StealthComposing => "STEALTH_COMPOSING",
            LogAction::SkipInvalid => "SKIP_INVALID",
            LogAction::RateLimitPause => "RATE_LIMIT_PAUSE",
            LogAction::CircuitBreaker => "CIRCUIT_BREAKER",
            LogAction::LinkDetected => "LINK_DETECTED",
        };
        f.write_str(s)
    }
}

/// Append-only structured trace event (§3 BroadcastLog).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastLog {
    pub broadcast_id: BroadcastId,
    pub action: String,
    pub detail: String,
    pub created_at: DateTime<Utc>,
}

impl BroadcastLog {
    pub fn new(broadcast_id: BroadcastId, action: LogAction, detail: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            broadcast_id,
            action: action.to_string(),
            detail: detail.into(),
            created_at: now,
        }
    }
}

/// Fields of §3 User relevant to the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub credit: u64,
}

/// §3 Contact status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContactStatus {
    Pending,
    Verified,
    Invalid,
}

/// Fields of §3 Contact relevant to the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub user_id: UserId,
    pub phone: String,
    pub status: ContactStatus,
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
