// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the waengine authors

//! Stand-in [`SocketFactory`] for the protocol library this workspace
//! never names (§1 "the underlying protocol library (treated as an opaque
//! 'socket' capability)"). No such crate is reachable from this repository,
//! so — exactly as [`waengine_store::InMemoryStore`] stands in for the
//! dashboard database — [`NullSocketFactory`] is the one concrete
//! [`SocketFactory`] this workspace ships outside of tests. It refuses
//! every connect attempt, which the Connection Manager and Socket
//! Supervisor already treat as an ordinary transient failure (the instance
//! reverts to `DISCONNECTED` and is retried on the next admission tick). A
//! deployment with access to the real protocol library swaps this out
//! without touching `waengine-engine`.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{ConnectConfig, Socket, SocketError, SocketEvent, SocketFactory};

#[derive(Debug, Clone, Copy, Default)]
pub struct NullSocketFactory;

#[async_trait]
impl SocketFactory for NullSocketFactory {
    async fn connect(
        &self,
        _config: ConnectConfig,
        _events: mpsc::Sender<SocketEvent>,
    ) -> Result<std::sync::Arc<dyn Socket>, SocketError> {
        Err(SocketError::Transport(
            "no protocol library configured (NullSocketFactory is a wiring stand-in)".to_string(),
        ))
    }
}
