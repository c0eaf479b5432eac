// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the waengine authors

//! Fake socket and factory for deterministic tests.
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{
    ConnectConfig, ExistsResult, OutboundContent, PresenceState, Socket, SocketError, SocketEvent,
    SocketFactory,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Recorded call to a [`FakeSocket`].
#[derive(Debug, Clone, PartialEq)]
pub enum SocketCall {
    SendPresenceUpdate { state: PresenceState, jid: Option<String> },
    PresenceSubscribe { jid: String },
    SendMessage { jid: String, is_text: bool },
    ReadMessages { count: usize },
    OnWhatsApp { jid: String },
    Logout,
}

struct FakeSocketState {
    user: Option<String>,
    calls: Vec<SocketCall>,
    registered_numbers: HashMap<String, bool>,
    send_error: Option<SocketError>,
    on_whatsapp_error: Option<SocketError>,
    presence_subscribe_error: Option<SocketError>,
}

/// Fake [`Socket`] that records every call and lets tests script outcomes.
#[derive(Clone)]
pub struct FakeSocket {
    inner: Arc<Mutex<FakeSocketState>>,
    events: mpsc::Sender<SocketEvent>,
}

impl FakeSocket {
    pub fn new(user: Option<String>, events: mpsc::Sender<SocketEvent>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeSocketState {
                user,
                calls: Vec::new(),
                registered_numbers: HashMap::new(),
                send_error: None,
                on_whatsapp_error: None,
                presence_subscribe_error: None,
            })),
            events,
        }
    }

    pub fn calls(&self) -> Vec<SocketCall> {
        self.inner.lock().calls.clone()
    }

    pub fn set_authenticated(&self, user: impl Into<String>) {
        self.inner.lock().user = Some(user.into());
    }

    /// Script whether `on_whatsapp(jid)` reports the number as registered.
    pub fn set_registered(&self, jid: impl Into<String>, exists: bool) {
        self.inner.lock().registered_numbers.insert(jid.into(), exists);
    }

    pub fn set_send_error(&self, error: SocketError) {
        self.inner.lock().send_error = Some(error);
    }

    pub fn set_on_whatsapp_error(&self, error: SocketError) {
        self.inner.lock().on_whatsapp_error = Some(error);
    }

    pub fn set_presence_subscribe_error(&self, error: SocketError) {
        self.inner.lock().presence_subscribe_error = Some(error);
    }

    /// Push an event as if the underlying library emitted it.
    pub async fn push_event(&self, event: SocketEvent) {
        let _ = self.events.send(event).await;
    }
}

#[async_trait]
impl Socket for FakeSocket {
    fn user(&self) -> Option<String> {
        self.inner.lock().user.clone()
    }

    async fn send_presence_update(
        &self,
        state: PresenceState,
        jid: Option<&str>,
    ) -> Result<(), SocketError> {
        self.inner.lock().calls.push(SocketCall::SendPresenceUpdate {
            state,
            jid: jid.map(str::to_string),
        });
        Ok(())
    }

    async fn presence_subscribe(&self, jid: &str) -> Result<(), SocketError> {
        let mut inner = self.inner.lock();
        inner.calls.push(SocketCall::PresenceSubscribe { jid: jid.to_string() });
        if let Some(error) = inner.presence_subscribe_error.take() {
            return Err(error);
        }
        Ok(())
    }

    async fn send_message(&self, jid: &str, content: OutboundContent) -> Result<(), SocketError> {
        let mut inner = self.inner.lock();
        inner.calls.push(SocketCall::SendMessage {
            jid: jid.to_string(),
            is_text: matches!(content, OutboundContent::Text(_)),
        });
        if let Some(error) = inner.send_error.take() {
            return Err(error);
        }
        Ok(())
    }

    async fn read_messages(&self, keys: &[String]) -> Result<(), SocketError> {
        self.inner.lock().calls.push(SocketCall::ReadMessages { count: keys.len() });
        Ok(())
    }

    async fn on_whatsapp(&self, jid: &str) -> Result<ExistsResult, SocketError> {
        let mut inner = self.inner.lock();
        inner.calls.push(SocketCall::OnWhatsApp { jid: jid.to_string() });
        if let Some(error) = inner.on_whatsapp_error.take() {
            return Err(error);
        }
        let exists = inner.registered_numbers.get(jid).copied().unwrap_or(true);
        Ok(ExistsResult { exists })
    }

    async fn logout(&self) -> Result<(), SocketError> {
        self.inner.lock().calls.push(SocketCall::Logout);
        Ok(())
    }
}

struct FakeFactoryState {
    connect_error: Option<SocketError>,
    opened: Vec<FakeSocket>,
}

/// Fake [`SocketFactory`] that hands out [`FakeSocket`]s and remembers each
/// one so tests can drive events into a socket after `connect` returns.
#[derive(Clone)]
pub struct FakeSocketFactory {
    inner: Arc<Mutex<FakeFactoryState>>,
}

impl Default for FakeSocketFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSocketFactory {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeFactoryState { connect_error: None, opened: Vec::new() })),
        }
    }

    pub fn set_connect_error(&self, error: SocketError) {
        self.inner.lock().connect_error = Some(error);
    }

    /// The most recently opened socket, if any.
    pub fn last_opened(&self) -> Option<FakeSocket> {
        self.inner.lock().opened.last().cloned()
    }

    pub fn opened_count(&self) -> usize {
        self.inner.lock().opened.len()
    }
}

#[async_trait]
impl SocketFactory for FakeSocketFactory {
    async fn connect(
        &self,
        _config: ConnectConfig,
        events: mpsc::Sender<SocketEvent>,
    ) -> Result<Arc<dyn Socket>, SocketError> {
        let mut inner = self.inner.lock();
        if let Some(error) = inner.connect_error.take() {
            return Err(error);
        }
        let socket = FakeSocket::new(None, events);
        inner.opened.push(socket.clone());
        Ok(Arc::new(socket))
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
