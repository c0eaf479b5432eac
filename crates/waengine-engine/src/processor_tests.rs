// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the waengine authors

use super::*;
use tokio::sync::mpsc;
use waengine_adapters::{FakeSleeper, FakeSocket, SocketCall, SocketError};
use waengine_core::{FakeClock, Instance, InstanceStatus, MessageStatus, User};
use waengine_store::InMemoryStore;

type TestProcessor = BroadcastProcessor<InMemoryStore, FakeSleeper, FakeClock>;

fn instance(id: &str, created_at: chrono::DateTime<Utc>) -> Instance {
    Instance {
        id: InstanceId::new(id),
        phone_number: "6281200000000".to_string(),
        name: "test".to_string(),
        status: InstanceStatus::Connected,
        qr_code: String::new(),
        created_at,
        updated_at: created_at,
        linked_user_ids: vec![waengine_core::UserId::new("u1")],
    }
}

#[allow(clippy::too_many_arguments)]
fn broadcast(id: &BroadcastId, instance_id: &str, turbo: bool, message: &str, now: chrono::DateTime<Utc>) -> Broadcast {
    Broadcast {
        id: id.clone(),
        user_id: waengine_core::UserId::new("u1"),
        instance_id: InstanceId::new(instance_id),
        name: "campaign".to_string(),
        message: message.to_string(),
        image_url: None,
        status: BroadcastStatus::Pending,
        total: 0,
        sent: 0,
        failed: 0,
        delay_min: 1,
        delay_max: 2,
        daily_limit: 100,
        working_hour_start: 0,
        working_hour_end: 0, // start == end: "open all day", avoids local-timezone flakiness.
        is_turbo_mode: turbo,
        created_at: now,
        updated_at: now,
    }
}

fn message(id: &str, broadcast_id: &BroadcastId, recipient: &str) -> Message {
    Message::new(waengine_core::MessageId::new(id), broadcast_id.clone(), recipient.to_string())
}

/// Wires up a processor against a fresh in-memory store and a fake socket,
/// handing back everything a test needs to script and inspect it.
fn build(
    store: Arc<InMemoryStore>,
    clock: Arc<FakeClock>,
    instance_id: &str,
    instance_created_at: chrono::DateTime<Utc>,
) -> (Arc<TestProcessor>, Arc<FakeSleeper>, FakeSocket) {
    let (tx, _rx) = mpsc::channel(8);
    let fake = FakeSocket::new(Some("6281200000000@s.whatsapp.net".to_string()), tx);
    let socket: Arc<dyn Socket> = Arc::new(fake.clone());
    let sleeper = Arc::new(FakeSleeper::new());
    let media = Arc::new(MediaFetcher::new(tempfile::tempdir().expect("tempdir").into_path()));
    let memory = Arc::new(MemoryGuard::new(4096));
    let is_paused = Arc::new(AtomicBool::new(false));
    let processor = BroadcastProcessor::new(
        store,
        sleeper.clone(),
        clock,
        socket,
        media,
        memory,
        InstanceId::new(instance_id),
        instance_created_at,
        is_paused,
    )
    .with_seed(1);
    (Arc::new(processor), sleeper, fake)
}

#[tokio::test]
async fn paused_tick_sleeps_and_reports_paused() {
    let now = chrono::Utc::now();
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(FakeClock::new(now));
    let (processor, sleeper, _fake) = build(store, clock, "a", now);
    processor.is_paused.store(true, Ordering::Release);

    let outcome = processor.tick().await.unwrap();

    assert_eq!(outcome, TickOutcome::Paused);
    assert_eq!(sleeper.requested(), vec![PAUSED_SLEEP]);
}

#[tokio::test]
async fn nothing_to_claim_when_the_store_has_no_broadcast() {
    let now = chrono::Utc::now();
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(FakeClock::new(now));
    let (processor, sleeper, _fake) = build(store, clock, "a", now);

    let outcome = processor.tick().await.unwrap();

    assert_eq!(outcome, TickOutcome::NothingToClaim);
    assert_eq!(sleeper.requested(), vec![CLAIM_EMPTY_SLEEP]);
}

#[tokio::test]
async fn no_credit_pauses_the_broadcast_without_touching_messages() {
    let now = chrono::Utc::now();
    let store = Arc::new(InMemoryStore::new());
    store.put_instance(instance("a", now));
    store.put_user(User { id: waengine_core::UserId::new("u1"), credit: 0 });
    let broadcast_id = BroadcastId::new("b1");
    store.put_broadcast(broadcast(&broadcast_id, "a", true, "hello", now));
    let clock = Arc::new(FakeClock::new(now));
    let (processor, _sleeper, _fake) = build(store.clone(), clock, "a", now);

    let outcome = processor.tick().await.unwrap();

    assert_eq!(outcome, TickOutcome::NoCredit);
    assert_eq!(store.broadcast(&broadcast_id).unwrap().status, BroadcastStatus::PausedNoCredit);
}

#[tokio::test]
async fn session_probe_failure_retries_without_advancing_the_batch() {
    let now = chrono::Utc::now();
    let store = Arc::new(InMemoryStore::new());
    store.put_instance(instance("a", now));
    store.put_user(User { id: waengine_core::UserId::new("u1"), credit: 10 });
    let broadcast_id = BroadcastId::new("b1");
    store.put_broadcast(broadcast(&broadcast_id, "a", true, "hello", now));
    store.put_message(message("m1", &broadcast_id, "6281200000001"));
    let clock = Arc::new(FakeClock::new(now));
    let (processor, sleeper, fake) = build(store.clone(), clock, "a", now);
    fake.set_presence_subscribe_error(SocketError::Transport("probe failed".to_string()));

    let outcome = processor.tick().await.unwrap();

    assert_eq!(outcome, TickOutcome::SessionProbeFailed);
    assert!(sleeper.requested().contains(&SESSION_PROBE_RETRY_SLEEP));
    assert_eq!(store.message(&waengine_core::MessageId::new("m1")).unwrap().status, MessageStatus::Pending);
    assert!(!processor.session_validated.lock().contains(&broadcast_id));
}

#[tokio::test]
async fn broadcast_completes_when_the_batch_is_empty_and_nothing_is_pending() {
    let now = chrono::Utc::now();
    let store = Arc::new(InMemoryStore::new());
    store.put_instance(instance("a", now));
    store.put_user(User { id: waengine_core::UserId::new("u1"), credit: 10 });
    let broadcast_id = BroadcastId::new("b1");
    store.put_broadcast(broadcast(&broadcast_id, "a", true, "hello", now));
    let clock = Arc::new(FakeClock::new(now));
    let (processor, _sleeper, _fake) = build(store.clone(), clock, "a", now);

    let outcome = processor.tick().await.unwrap();

    assert_eq!(outcome, TickOutcome::BroadcastCompleted);
    assert_eq!(store.broadcast(&broadcast_id).unwrap().status, BroadcastStatus::Completed);
}

#[tokio::test]
async fn an_invalid_recipient_is_marked_failed_and_the_batch_continues() {
    let now = chrono::Utc::now();
    let store = Arc::new(InMemoryStore::new());
    store.put_instance(instance("a", now));
    store.put_user(User { id: waengine_core::UserId::new("u1"), credit: 10 });
    let broadcast_id = BroadcastId::new("b1");
    store.put_broadcast(broadcast(&broadcast_id, "a", true, "hello", now));
    store.put_message(message("m1", &broadcast_id, "1"));
    let clock = Arc::new(FakeClock::new(now));
    let (processor, _sleeper, _fake) = build(store.clone(), clock, "a", now);

    let outcome = processor.tick().await.unwrap();

    assert_eq!(outcome, TickOutcome::BatchProcessed);
    let stored = store.message(&waengine_core::MessageId::new("m1")).unwrap();
    assert_eq!(stored.status, MessageStatus::Failed);
    assert_eq!(stored.error.as_deref(), Some("invalid phone number"));
    assert_eq!(store.broadcast(&broadcast_id).unwrap().failed, 1);
    assert!(store.logs().iter().any(|l| l.action == LogAction::SkipInvalid.to_string()));
}

#[tokio::test]
async fn a_number_not_on_whatsapp_is_skipped_after_the_pre_verify_probe() {
    let now = chrono::Utc::now();
    // Non-turbo, account 25h old (skips warm-up), still young enough that
    // the Trust Tier Classifier requires a pre-verify probe (§4.5).
    let created_at = now - chrono::Duration::hours(25);
    let store = Arc::new(InMemoryStore::new());
    store.put_instance(instance("a", created_at));
    store.put_user(User { id: waengine_core::UserId::new("u1"), credit: 10 });
    let broadcast_id = BroadcastId::new("b1");
    store.put_broadcast(broadcast(&broadcast_id, "a", false, "hello", now));
    store.put_message(message("m1", &broadcast_id, "6281200000002"));
    let clock = Arc::new(FakeClock::new(now));
    let (processor, sleeper, fake) = build(store.clone(), clock, "a", created_at);
    fake.set_registered("6281200000002@s.whatsapp.net", false);

    let outcome = processor.tick().await.unwrap();

    assert_eq!(outcome, TickOutcome::BatchProcessed);
    let stored = store.message(&waengine_core::MessageId::new("m1")).unwrap();
    assert_eq!(stored.status, MessageStatus::Failed);
    assert_eq!(stored.error.as_deref(), Some("recipient not on WhatsApp"));
    assert!(fake.calls().contains(&SocketCall::OnWhatsApp { jid: "6281200000002@s.whatsapp.net".to_string() }));
    assert!(sleeper.requested().iter().any(|d| *d >= Duration::from_millis(1000) && *d <= Duration::from_millis(3000)));
}

#[tokio::test]
async fn a_rate_limited_send_pauses_the_broadcast_and_stops_the_batch() {
    let now = chrono::Utc::now();
    let store = Arc::new(InMemoryStore::new());
    store.put_instance(instance("a", now));
    store.put_user(User { id: waengine_core::UserId::new("u1"), credit: 10 });
    let broadcast_id = BroadcastId::new("b1");
    store.put_broadcast(broadcast(&broadcast_id, "a", true, "hello", now));
    store.put_message(message("m1", &broadcast_id, "6281200000003"));
    let clock = Arc::new(FakeClock::new(now));
    let (processor, _sleeper, fake) = build(store.clone(), clock, "a", now);
    fake.set_send_error(SocketError::Transport("Rate limit exceeded".to_string()));

    let outcome = processor.tick().await.unwrap();

    assert_eq!(outcome, TickOutcome::RateLimited);
    assert_eq!(store.broadcast(&broadcast_id).unwrap().status, BroadcastStatus::PausedRateLimit);
    let stored = store.message(&waengine_core::MessageId::new("m1")).unwrap();
    assert_eq!(stored.status, MessageStatus::Failed);
    assert_eq!(stored.error.as_deref(), Some("rate limited by provider"));
    assert!(store.logs().iter().any(|l| l.action == LogAction::RateLimitPause.to_string()));
}

#[tokio::test]
async fn a_successful_send_records_anti_banned_meta_and_advances_counters() {
    let now = chrono::Utc::now();
    let store = Arc::new(InMemoryStore::new());
    store.put_instance(instance("a", now));
    store.put_user(User { id: waengine_core::UserId::new("u1"), credit: 10 });
    let broadcast_id = BroadcastId::new("b1");
    store.put_broadcast(broadcast(&broadcast_id, "a", true, "hello {world|there}", now));
    store.put_message(message("m1", &broadcast_id, "6281200000004"));
    let clock = Arc::new(FakeClock::new(now));
    let (processor, sleeper, fake) = build(store.clone(), clock, "a", now);

    let outcome = processor.tick().await.unwrap();

    assert_eq!(outcome, TickOutcome::BatchProcessed);
    let stored = store.message(&waengine_core::MessageId::new("m1")).unwrap();
    assert_eq!(stored.status, MessageStatus::Sent);
    assert!(stored.content.is_some());
    let meta = stored.anti_banned_meta.expect("meta recorded");
    assert_eq!(meta.tier_name, "NEWBORN");
    assert_eq!(meta.batch_index, 1);
    assert_eq!(meta.daily_index, 1);
    assert_eq!(store.broadcast(&broadcast_id).unwrap().sent, 1);
    assert_eq!(store.user(&waengine_core::UserId::new("u1")).unwrap().credit, 9);
    let actions: Vec<String> = store.logs().iter().map(|l| l.action.clone()).collect();
    assert!(actions.contains(&LogAction::Spintax.to_string()));
    assert!(actions.contains(&LogAction::UniqueSuffix.to_string()));
    assert!(fake.calls().iter().any(|c| matches!(c, SocketCall::SendMessage { is_text: true, .. })));
    assert!(sleeper.requested().iter().any(|d| *d >= Duration::from_millis(3000)));
}

#[tokio::test]
async fn batch_cooling_fires_once_the_tier_batch_size_is_reached() {
    let now = chrono::Utc::now();
    let store = Arc::new(InMemoryStore::new());
    // Fresh instance -> NEWBORN tier -> batch_size 3, cooldown 300-600s.
    store.put_instance(instance("a", now));
    store.put_user(User { id: waengine_core::UserId::new("u1"), credit: 10 });
    let broadcast_id = BroadcastId::new("b1");
    store.put_broadcast(broadcast(&broadcast_id, "a", true, "hello", now));
    for n in 0..3 {
        store.put_message(message(&format!("m{n}"), &broadcast_id, &format!("628120000000{n}")));
    }
    let clock = Arc::new(FakeClock::new(now));
    let (processor, sleeper, _fake) = build(store.clone(), clock, "a", now);

    let outcome = processor.tick().await.unwrap();

    assert_eq!(outcome, TickOutcome::BatchProcessed);
    assert_eq!(store.broadcast(&broadcast_id).unwrap().sent, 3);
    assert!(sleeper.requested().iter().any(|d| *d >= Duration::from_secs(300) && *d <= Duration::from_secs(600)));
}

#[tokio::test]
async fn the_circuit_breaker_trips_cools_down_and_resumes_sending() {
    let now = chrono::Utc::now();
    let store = Arc::new(InMemoryStore::new());
    store.put_instance(instance("a", now));
    store.put_user(User { id: waengine_core::UserId::new("u1"), credit: 10 });
    let broadcast_id = BroadcastId::new("b1");
    store.put_broadcast(broadcast(&broadcast_id, "a", true, "hello", now));
    store.put_message(message("m1", &broadcast_id, "6281200000005"));
    let clock = Arc::new(FakeClock::new(now));
    let (processor, sleeper, fake) = build(store.clone(), clock, "a", now);
    // NEWBORN's circuit_threshold is 2; force the breaker to trip on the
    // very first message of this tick.
    processor.consecutive_fail_count.store(2, Ordering::Release);

    let outcome = processor.tick().await.unwrap();

    assert_eq!(outcome, TickOutcome::BatchProcessed);
    assert_eq!(store.message(&waengine_core::MessageId::new("m1")).unwrap().status, MessageStatus::Sent);
    assert!(store.logs().iter().any(|l| l.action == LogAction::CircuitBreaker.to_string()));
    assert!(sleeper.requested().iter().any(|d| *d >= Duration::from_secs(60) && *d <= Duration::from_secs(180)));
    assert!(fake.calls().contains(&SocketCall::SendPresenceUpdate { state: PresenceState::Unavailable, jid: None }));
    assert!(fake.calls().contains(&SocketCall::SendPresenceUpdate { state: PresenceState::Available, jid: None }));
}

#[tokio::test]
async fn an_already_mature_instance_skips_the_warm_up_gate() {
    let now = chrono::Utc::now();
    let created_at = now - chrono::Duration::hours(25);
    let store = Arc::new(InMemoryStore::new());
    store.put_instance(instance("a", created_at));
    store.put_user(User { id: waengine_core::UserId::new("u1"), credit: 10 });
    let broadcast_id = BroadcastId::new("b1");
    store.put_broadcast(broadcast(&broadcast_id, "a", false, "hello", now));
    let clock = Arc::new(FakeClock::new(now));
    let (processor, sleeper, _fake) = build(store.clone(), clock, "a", created_at);

    let outcome = processor.tick().await.unwrap();

    assert_eq!(outcome, TickOutcome::BroadcastCompleted);
    assert!(!sleeper.requested().contains(&WARMUP_CHUNK));
}
