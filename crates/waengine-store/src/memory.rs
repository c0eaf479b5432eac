// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the waengine authors

//! An in-memory `Store` implementation.
//!
//! No dashboard database is reachable from this repository (§1: the store
//! is an external collaborator owned by the dashboard tier). This is the
//! stand-in used by the daemon binary's default configuration and by every
//! crate's tests — analogous in spirit to the teacher's
//! `MaterializedState`, but without its WAL/snapshot machinery, since here
//! the dashboard database (not this process) is the durable source of
//! truth across restarts.

use crate::store::{BroadcastClaim, SendSuccess, Store, StoreError};
use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use waengine_core::{
    Broadcast, BroadcastId, BroadcastLog, BroadcastStatus, Contact, ContactId, ContactStatus,
    Instance, InstanceId, InstanceStatus, Message, MessageId, MessageStatus, User, UserId,
};

#[derive(Default)]
struct Inner {
    instances: HashMap<InstanceId, Instance>,
    broadcasts: HashMap<BroadcastId, Broadcast>,
    // IndexMap preserves insertion order, used as a stand-in for "claimed
    // first, sent first" (§5 ordering guarantees) within one broadcast.
    messages: IndexMap<MessageId, Message>,
    users: HashMap<UserId, User>,
    contacts: IndexMap<ContactId, Contact>,
    logs: Vec<BroadcastLog>,
}

/// Cheaply cloneable, shared in-memory store.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_instance(&self, instance: Instance) {
        self.inner.lock().instances.insert(instance.id.clone(), instance);
    }

    pub fn put_broadcast(&self, broadcast: Broadcast) {
        self.inner.lock().broadcasts.insert(broadcast.id.clone(), broadcast);
    }

    pub fn put_message(&self, message: Message) {
        self.inner.lock().messages.insert(message.id.clone(), message);
    }

    pub fn put_user(&self, user: User) {
        self.inner.lock().users.insert(user.id.clone(), user);
    }

    pub fn put_contact(&self, contact: Contact) {
        self.inner.lock().contacts.insert(contact.id.clone(), contact);
    }

    pub fn logs(&self) -> Vec<BroadcastLog> {
        self.inner.lock().logs.clone()
    }

    pub fn broadcast(&self, id: &BroadcastId) -> Option<Broadcast> {
        self.inner.lock().broadcasts.get(id).cloned()
    }

    pub fn message(&self, id: &MessageId) -> Option<Message> {
        self.inner.lock().messages.get(id).cloned()
    }

    pub fn user(&self, id: &UserId) -> Option<User> {
        self.inner.lock().users.get(id).cloned()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_instance(&self, id: &InstanceId) -> Result<Option<Instance>, StoreError> {
        Ok(self.inner.lock().instances.get(id).cloned())
    }

    async fn set_instance_status(
        &self,
        id: &InstanceId,
        status: InstanceStatus,
        qr_code: Option<String>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let instance = inner
            .instances
            .get_mut(id)
            .ok_or_else(|| StoreError::InstanceNotFound(id.clone()))?;
        instance.status = status;
        if let Some(qr) = qr_code {
            instance.qr_code = qr;
        }
        instance.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn list_initializing(&self, limit: usize) -> Result<Vec<Instance>, StoreError> {
        let inner = self.inner.lock();
        let mut candidates: Vec<Instance> = inner
            .instances
            .values()
            .filter(|i| i.status == InstanceStatus::Initializing && !i.linked_user_ids.is_empty())
            .cloned()
            .collect();
        candidates.sort_by_key(|i| i.updated_at);
        candidates.truncate(limit);
        Ok(candidates)
    }

    async fn list_disconnecting(&self) -> Result<Vec<Instance>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .instances
            .values()
            .filter(|i| i.status == InstanceStatus::Disconnecting)
            .cloned()
            .collect())
    }

    async fn disconnect_all(&self, ids: &[InstanceId]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        for id in ids {
            if let Some(instance) = inner.instances.get_mut(id) {
                instance.status = InstanceStatus::Disconnected;
                instance.qr_code.clear();
                instance.updated_at = chrono::Utc::now();
            }
        }
        Ok(())
    }

    async fn claim_broadcast(
        &self,
        instance_id: &InstanceId,
    ) -> Result<Option<BroadcastClaim>, StoreError> {
        let inner = self.inner.lock();
        let mut candidates: Vec<&Broadcast> = inner
            .broadcasts
            .values()
            .filter(|b| &b.instance_id == instance_id && b.status.is_claimable())
            .collect();
        candidates.sort_by_key(|b| b.created_at);

        let Some(broadcast) = candidates.into_iter().next().cloned() else {
            return Ok(None);
        };

        let user = inner
            .users
            .get(&broadcast.user_id)
            .cloned()
            .ok_or_else(|| StoreError::UserNotFound(broadcast.user_id.clone()))?;

        let batch: Vec<Message> = inner
            .messages
            .values()
            .filter(|m| m.broadcast_id == broadcast.id && m.status == MessageStatus::Pending)
            .take(10)
            .cloned()
            .collect();

        Ok(Some(BroadcastClaim { broadcast, user, batch }))
    }

    async fn set_broadcast_status(
        &self,
        id: &BroadcastId,
        status: BroadcastStatus,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let broadcast = inner
            .broadcasts
            .get_mut(id)
            .ok_or_else(|| StoreError::BroadcastNotFound(id.clone()))?;
        broadcast.status = status;
        broadcast.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn count_pending_messages(&self, broadcast_id: &BroadcastId) -> Result<u32, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .messages
            .values()
            .filter(|m| m.broadcast_id == *broadcast_id && m.status == MessageStatus::Pending)
            .count() as u32)
    }

    async fn pause_running_broadcasts(
        &self,
        instance_id: &InstanceId,
        status: BroadcastStatus,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let now = chrono::Utc::now();
        for broadcast in inner.broadcasts.values_mut() {
            if &broadcast.instance_id == instance_id && broadcast.status == BroadcastStatus::Running {
                broadcast.status = status;
                broadcast.updated_at = now;
            }
        }
        Ok(())
    }

    async fn resume_paused_broadcasts(&self, instance_id: &InstanceId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let now = chrono::Utc::now();
        for broadcast in inner.broadcasts.values_mut() {
            if &broadcast.instance_id == instance_id
                && matches!(
                    broadcast.status,
                    BroadcastStatus::PausedRateLimit | BroadcastStatus::PausedWorkingHours
                )
            {
                broadcast.status = BroadcastStatus::Running;
                broadcast.updated_at = now;
            }
        }
        Ok(())
    }

    async fn record_send_success(&self, outcome: SendSuccess<'_>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let message = inner
            .messages
            .get_mut(outcome.message_id)
            .ok_or_else(|| StoreError::MessageNotFound(outcome.message_id.clone()))?;
        message.status = MessageStatus::Sent;
        message.sent_at = Some(outcome.sent_at);
        message.content = Some(outcome.content);
        let broadcast_id = message.broadcast_id.clone();
        message.anti_banned_meta = Some(outcome.meta.clone());

        let user_id = {
            let broadcast = inner
                .broadcasts
                .get_mut(&broadcast_id)
                .ok_or_else(|| StoreError::BroadcastNotFound(broadcast_id.clone()))?;
            broadcast.sent += 1;
            broadcast.user_id.clone()
        };

        // Credit is decremented per successful send (§4.10 step 9); the
        // multi-instance race on this row is accepted as-is (see DESIGN.md).
        if let Some(user) = inner.users.get_mut(&user_id) {
            user.credit = user.credit.saturating_sub(1);
        }
        Ok(())
    }

    async fn record_send_failure(
        &self,
        message_id: &MessageId,
        error: String,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let message = inner
            .messages
            .get_mut(message_id)
            .ok_or_else(|| StoreError::MessageNotFound(message_id.clone()))?;
        message.status = MessageStatus::Failed;
        message.error = Some(error);
        let broadcast_id = message.broadcast_id.clone();

        let broadcast = inner
            .broadcasts
            .get_mut(&broadcast_id)
            .ok_or(StoreError::BroadcastNotFound(broadcast_id))?;
        broadcast.failed += 1;
        Ok(())
    }

    async fn append_log(&self, log: BroadcastLog) -> Result<(), StoreError> {
        self.inner.lock().logs.push(log);
        Ok(())
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        Ok(self.inner.lock().users.get(id).cloned())
    }

    async fn list_pending_contacts(&self, limit: usize) -> Result<Vec<Contact>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .contacts
            .values()
            .filter(|c| c.status == ContactStatus::Pending)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn set_contact_status(
        &self,
        id: &ContactId,
        status: ContactStatus,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let contact = inner
            .contacts
            .get_mut(id)
            .ok_or_else(|| StoreError::ContactNotFound(id.clone()))?;
        contact.status = status;
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
