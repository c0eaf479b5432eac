// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the waengine authors

//! Verification Worker (§4.11): a background pass over `PENDING` contacts,
//! probing each against the protocol network for registration using
//! whatever healthy socket is available, independent of any one instance's
//! Broadcast Processor.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use waengine_adapters::{Sleeper, Socket};
use waengine_core::{to_jid, Contact, ContactStatus};
use waengine_store::{Store, StoreError};

const IDLE_SLEEP: Duration = Duration::from_secs(10);
const PROBE_ERROR_BACKOFF: Duration = Duration::from_secs(2);
const BATCH_LIMIT: usize = 50;
const INTER_PROBE_DELAY_MIN_MS: u64 = 300;
const INTER_PROBE_DELAY_MAX_MS: u64 = 500;

/// Outcome of one [`VerificationWorker::tick`], for tests and logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    NoHealthySocket,
    NothingPending,
    Ran { verified: u32, invalid: u32, errored: u32 },
}

/// Supplies a live, authenticated socket to probe with. Kept separate from
/// [`crate::connection_manager::Connector`] — the worker borrows a
/// supervisor's socket, it does not own a connection lifecycle
/// (teacher's read-only "any healthy worker" borrow pattern, e.g.
/// `crates/engine/src/runtime/mod.rs`'s agent-pool lookups).
pub trait SocketSource: Send + Sync + 'static {
    /// Any one socket currently `CONNECTED`, if the pool has one.
    fn any_connected(&self) -> Option<Arc<dyn Socket>>;
}

/// Background pass over `PENDING` contacts (§4.11).
pub struct VerificationWorker<S, L, K> {
    store: Arc<S>,
    sleeper: Arc<L>,
    sockets: Arc<K>,
    rng: parking_lot::Mutex<StdRng>,
}

impl<S, L, K> VerificationWorker<S, L, K>
where
    S: Store,
    L: Sleeper,
    K: SocketSource,
{
    pub fn new(store: Arc<S>, sleeper: Arc<L>, sockets: Arc<K>) -> Self {
        Self { store, sleeper, sockets, rng: parking_lot::Mutex::new(StdRng::from_rng(&mut rand::rng())) }
    }

    #[cfg(any(test, feature = "test-support"))]
    pub fn with_seed(self, seed: u64) -> Self {
        *self.rng.lock() = StdRng::seed_from_u64(seed);
        self
    }

    /// Run forever, as one of the engine's independent cooperating tasks (§5).
    pub async fn run(&self) {
        loop {
            match self.tick().await {
                Ok(_) => {}
                Err(err) => tracing::warn!(error = %err, "verification worker tick failed"),
            }
        }
    }

    /// One iteration of §4.11.
    pub async fn tick(&self) -> Result<VerifyOutcome, StoreError> {
        let Some(socket) = self.sockets.any_connected() else {
            self.sleeper.sleep(IDLE_SLEEP).await;
            return Ok(VerifyOutcome::NoHealthySocket);
        };

        let contacts = self.store.list_pending_contacts(BATCH_LIMIT).await?;
        if contacts.is_empty() {
            self.sleeper.sleep(IDLE_SLEEP).await;
            return Ok(VerifyOutcome::NothingPending);
        }

        let (mut verified, mut invalid, mut errored) = (0u32, 0u32, 0u32);
        for contact in contacts {
            match self.probe(&socket, &contact).await {
                Ok(status) => {
                    self.store.set_contact_status(&contact.id, status).await?;
                    match status {
                        ContactStatus::Verified => verified += 1,
                        ContactStatus::Invalid => invalid += 1,
                        ContactStatus::Pending => {}
                    }
                }
                Err(err) => {
                    tracing::warn!(contact_id = %contact.id, phone = %contact.phone, error = %err, "contact verification probe failed");
                    errored += 1;
                    self.sleeper.sleep(PROBE_ERROR_BACKOFF).await;
                    continue;
                }
            }

            let delay = self.rng.lock().random_range(INTER_PROBE_DELAY_MIN_MS..=INTER_PROBE_DELAY_MAX_MS);
            self.sleeper.sleep(Duration::from_millis(delay)).await;
        }

        Ok(VerifyOutcome::Ran { verified, invalid, errored })
    }

    async fn probe(&self, socket: &Arc<dyn Socket>, contact: &Contact) -> Result<ContactStatus, String> {
        let jid = to_jid(&contact.phone).ok_or_else(|| "phone does not normalise to a plausible MSISDN".to_string())?;
        let result = socket.on_whatsapp(&jid).await.map_err(|e| e.to_string())?;
        Ok(if result.exists { ContactStatus::Verified } else { ContactStatus::Invalid })
    }
}

#[cfg(test)]
#[path = "verification_worker_tests.rs"]
mod tests;
