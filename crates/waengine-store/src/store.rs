// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the waengine authors

//! The `Store` trait: the engine's only view of the dashboard-owned
//! relational schema (§3, §6). The dashboard tier owns migrations; this
//! trait only reads and writes the rows named in §6 "Writes of interest".

use async_trait::async_trait;
use thiserror::Error;
use waengine_core::{
    AntiBannedMeta, Broadcast, BroadcastId, BroadcastLog, BroadcastStatus, Contact, ContactId,
    ContactStatus, Instance, InstanceId, Message, MessageId, User, UserId,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("instance not found: {0}")]
    InstanceNotFound(InstanceId),
    #[error("broadcast not found: {0}")]
    BroadcastNotFound(BroadcastId),
    #[error("message not found: {0}")]
    MessageNotFound(MessageId),
    #[error("user not found: {0}")]
    UserNotFound(UserId),
    #[error("contact not found: {0}")]
    ContactNotFound(ContactId),
    #[error("backend error: {0}")]
    Backend(String),
}

/// The result of claiming a broadcast to process (§4.10 step b): the
/// broadcast row, its owning user, and the first 10 `PENDING` messages.
#[derive(Debug, Clone)]
pub struct BroadcastClaim {
    pub broadcast: Broadcast,
    pub user: User,
    pub batch: Vec<Message>,
}

/// Outcome persisted for a successful send (§4.10 step 9): the Message
/// update, the broadcast sent-counter bump and the user credit decrement
/// are one call so implementations can make them transactional.
pub struct SendSuccess<'a> {
    pub message_id: &'a MessageId,
    pub sent_at: chrono::DateTime<chrono::Utc>,
    pub content: String,
    pub meta: AntiBannedMeta,
}

#[async_trait]
pub trait Store: Send + Sync + 'static {
    // --- Instances (§4.7, §4.8, §4.9, §4.12) ---

    async fn get_instance(&self, id: &InstanceId) -> Result<Option<Instance>, StoreError>;

    /// Persist a status transition, optionally replacing `qrCode`.
    async fn set_instance_status(
        &self,
        id: &InstanceId,
        status: waengine_core::InstanceStatus,
        qr_code: Option<String>,
    ) -> Result<(), StoreError>;

    /// Up to `limit` instances with status `INITIALIZING`, at least one
    /// linked user, ordered oldest `updatedAt` first (§4.8 step 2).
    async fn list_initializing(&self, limit: usize) -> Result<Vec<Instance>, StoreError>;

    /// All instances with status `DISCONNECTING` (§4.9).
    async fn list_disconnecting(&self) -> Result<Vec<Instance>, StoreError>;

    /// Every instance row, for shutdown (§4.12) — persists
    /// `status=DISCONNECTED, qrCode=""` for each supervised id, so this is
    /// scoped to the ids the caller passes, not a full table scan.
    async fn disconnect_all(&self, ids: &[InstanceId]) -> Result<(), StoreError>;

    // --- Broadcasts (§4.10) ---

    /// Oldest `PENDING`/`RUNNING` broadcast for `instance_id`, with its
    /// owning user and first 10 `PENDING` messages (§4.10 step b).
    async fn claim_broadcast(
        &self,
        instance_id: &InstanceId,
    ) -> Result<Option<BroadcastClaim>, StoreError>;

    async fn set_broadcast_status(
        &self,
        id: &BroadcastId,
        status: BroadcastStatus,
    ) -> Result<(), StoreError>;

    /// Count of `PENDING` messages remaining for a broadcast (§4.10 step j).
    async fn count_pending_messages(&self, broadcast_id: &BroadcastId) -> Result<u32, StoreError>;

    /// All RUNNING broadcasts of an instance get `PAUSED_RATE_LIMIT`
    /// (§4.7 close classification case 5, §4.10 step 10).
    async fn pause_running_broadcasts(
        &self,
        instance_id: &InstanceId,
        status: BroadcastStatus,
    ) -> Result<(), StoreError>;

    /// On a fresh CONNECTED event, resume broadcasts paused for rate-limit
    /// or working-hours reasons back to RUNNING (§4.7 "connection = open").
    async fn resume_paused_broadcasts(&self, instance_id: &InstanceId) -> Result<(), StoreError>;

    // --- Messages + credit + logs (§4.10 steps 9-13) ---

    async fn record_send_success(&self, outcome: SendSuccess<'_>) -> Result<(), StoreError>;

    async fn record_send_failure(
        &self,
        message_id: &MessageId,
        error: String,
    ) -> Result<(), StoreError>;

    async fn append_log(&self, log: BroadcastLog) -> Result<(), StoreError>;

    async fn get_user(&self, id: &UserId) -> Result<Option<User>, StoreError>;

    // --- Contacts (§4.11) ---

    async fn list_pending_contacts(&self, limit: usize) -> Result<Vec<Contact>, StoreError>;

    async fn set_contact_status(
        &self,
        id: &ContactId,
        status: ContactStatus,
    ) -> Result<(), StoreError>;
}
