// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the waengine authors

//! Abstraction over the opaque WhatsApp protocol library (§6 "Protocol
//! socket"). The engine never speaks the wire protocol directly: it opens
//! a [`Socket`] through a [`SocketFactory`], reacts to [`SocketEvent`]s on
//! a channel, and drives outbound actions through the trait methods.

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeSocket, FakeSocketFactory, SocketCall};

mod null;
pub use null::NullSocketFactory;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Error)]
pub enum SocketError {
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Parameters for opening a new socket (§4.7 "the socket is opened with").
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    pub session_dir: std::path::PathBuf,
    pub wire_version: [u32; 3],
    pub browser_fingerprint: BrowserFingerprint,
    pub keep_alive_interval_ms: u64,
}

/// One entry of the ten-member realistic browser fingerprint pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserFingerprint {
    pub browser: &'static str,
    pub platform: &'static str,
    pub version: &'static str,
}

/// Fixed pool the Socket Supervisor samples from (§4.7).
pub const FINGERPRINT_POOL: [BrowserFingerprint; 10] = [
    BrowserFingerprint { browser: "Chrome", platform: "Windows", version: "124.0.0.0" },
    BrowserFingerprint { browser: "Chrome", platform: "Mac OS", version: "124.0.0.0" },
    BrowserFingerprint { browser: "Chrome", platform: "Linux", version: "123.0.0.0" },
    BrowserFingerprint { browser: "Firefox", platform: "Windows", version: "125.0" },
    BrowserFingerprint { browser: "Firefox", platform: "Mac OS", version: "125.0" },
    BrowserFingerprint { browser: "Edge", platform: "Windows", version: "124.0.0.0" },
    BrowserFingerprint { browser: "Safari", platform: "Mac OS", version: "17.4" },
    BrowserFingerprint { browser: "Chrome", platform: "Android", version: "123.0.0.0" },
    BrowserFingerprint { browser: "Safari", platform: "iOS", version: "17.4" },
    BrowserFingerprint { browser: "Opera", platform: "Windows", version: "109.0.0.0" },
];

/// Connection-lifecycle events delivered on the supervisor's event channel
/// (§4.7 "events consumed"; wraps the library's `connectionUpdate`).
#[derive(Debug, Clone)]
pub enum ConnectionUpdate {
    Connecting,
    QrCode(String),
    Open,
    Close(CloseEvent),
}

/// A `connection = close` event's structured payload (§6).
#[derive(Debug, Clone)]
pub struct CloseEvent {
    pub status_code: Option<u16>,
    pub message: String,
}

#[derive(Debug, Clone)]
pub enum SocketEvent {
    ConnectionUpdate(ConnectionUpdate),
    CredsUpdated,
    MessagesUpsert(Vec<InboundMessage>),
}

/// Minimal shape of an inbound message needed by the Auto-Read handler (§4.7).
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub key: String,
    pub from_jid: String,
    pub from_self: bool,
    pub is_status_broadcast: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceState {
    Available,
    Unavailable,
    Composing,
    Paused,
}

/// Outbound message content (§6 `sendMessage(jid, {text | image, caption})`).
#[derive(Debug, Clone)]
pub enum OutboundContent {
    Text(String),
    Image { bytes: Vec<u8>, caption: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExistsResult {
    pub exists: bool,
}

/// One open protocol connection. `Arc<dyn Socket>` is shared between the
/// Socket Supervisor that owns it and the Broadcast Processor it launches.
#[async_trait]
pub trait Socket: Send + Sync + 'static {
    /// The authenticated user's JID, once `credentials updated` has fired
    /// with an identity present. `None` before authentication completes.
    fn user(&self) -> Option<String>;

    async fn send_presence_update(
        &self,
        state: PresenceState,
        jid: Option<&str>,
    ) -> Result<(), SocketError>;

    async fn presence_subscribe(&self, jid: &str) -> Result<(), SocketError>;

    async fn send_message(&self, jid: &str, content: OutboundContent) -> Result<(), SocketError>;

    async fn read_messages(&self, keys: &[String]) -> Result<(), SocketError>;

    async fn on_whatsapp(&self, jid: &str) -> Result<ExistsResult, SocketError>;

    async fn logout(&self) -> Result<(), SocketError>;
}

/// Opens new [`Socket`]s. A thin seam so the Socket Supervisor never names
/// the concrete protocol library directly.
#[async_trait]
pub trait SocketFactory: Clone + Send + Sync + 'static {
    async fn connect(
        &self,
        config: ConnectConfig,
        events: mpsc::Sender<SocketEvent>,
    ) -> Result<std::sync::Arc<dyn Socket>, SocketError>;
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
