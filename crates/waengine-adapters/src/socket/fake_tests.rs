// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the waengine authors

use super::*;

fn config() -> ConnectConfig {
    ConnectConfig {
        session_dir: std::path::PathBuf::from("/tmp/auth-test"),
        wire_version: [2, 3000, 0],
        browser_fingerprint: FINGERPRINT_POOL[0].clone(),
        keep_alive_interval_ms: 30_000,
    }
}

#[tokio::test]
async fn connect_hands_out_a_socket_and_remembers_it() {
    let factory = FakeSocketFactory::new();
    let (tx, _rx) = mpsc::channel(8);

    let socket = factory.connect(config(), tx).await.unwrap();

    assert!(socket.user().is_none());
    assert_eq!(factory.opened_count(), 1);
    assert!(factory.last_opened().is_some());
}

#[tokio::test]
async fn connect_returns_the_scripted_error_once() {
    let factory = FakeSocketFactory::new();
    factory.set_connect_error(SocketError::Transport("refused".to_string()));
    let (tx, _rx) = mpsc::channel(8);

    assert!(factory.connect(config(), tx.clone()).await.is_err());
    assert!(factory.connect(config(), tx).await.is_ok());
}

#[tokio::test]
async fn send_message_records_whether_it_was_text_or_image() {
    let (tx, _rx) = mpsc::channel(8);
    let socket = FakeSocket::new(None, tx);

    socket.send_message("628@s.whatsapp.net", OutboundContent::Text("hi".to_string())).await.unwrap();
    socket
        .send_message("628@s.whatsapp.net", OutboundContent::Image { bytes: vec![1, 2, 3], caption: None })
        .await
        .unwrap();

    let calls = socket.calls();
    assert!(matches!(calls[0], SocketCall::SendMessage { is_text: true, .. }));
    assert!(matches!(calls[1], SocketCall::SendMessage { is_text: false, .. }));
}

#[tokio::test]
async fn send_message_returns_the_scripted_error_once() {
    let (tx, _rx) = mpsc::channel(8);
    let socket = FakeSocket::new(None, tx);
    socket.set_send_error(SocketError::Timeout(std::time::Duration::from_secs(30)));

    assert!(socket
        .send_message("628@s.whatsapp.net", OutboundContent::Text("hi".to_string()))
        .await
        .is_err());
    assert!(socket
        .send_message("628@s.whatsapp.net", OutboundContent::Text("hi".to_string()))
        .await
        .is_ok());
}

#[tokio::test]
async fn on_whatsapp_defaults_to_registered_unless_scripted_otherwise() {
    let (tx, _rx) = mpsc::channel(8);
    let socket = FakeSocket::new(None, tx);

    assert!(socket.on_whatsapp("628@s.whatsapp.net").await.unwrap().exists);

    socket.set_registered("629@s.whatsapp.net", false);
    assert!(!socket.on_whatsapp("629@s.whatsapp.net").await.unwrap().exists);
}

#[tokio::test]
async fn push_event_is_observable_on_the_events_channel() {
    let (tx, mut rx) = mpsc::channel(8);
    let socket = FakeSocket::new(None, tx);

    socket.push_event(SocketEvent::ConnectionUpdate(ConnectionUpdate::Open)).await;

    let event = rx.recv().await.unwrap();
    assert!(matches!(event, SocketEvent::ConnectionUpdate(ConnectionUpdate::Open)));
}

#[tokio::test]
async fn set_authenticated_populates_user() {
    let (tx, _rx) = mpsc::channel(8);
    let socket = FakeSocket::new(None, tx);
    assert!(socket.user().is_none());

    socket.set_authenticated("6281@s.whatsapp.net");
    assert_eq!(socket.user().as_deref(), Some("6281@s.whatsapp.net"));
}
