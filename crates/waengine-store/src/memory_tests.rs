// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the waengine authors

use super::*;
use waengine_core::{BroadcastId, ContactId, InstanceId, MessageId, UserId};

fn instance(id: &str, status: InstanceStatus) -> Instance {
    Instance {
        id: InstanceId::new(id),
        phone_number: "6281234567890".to_string(),
        name: "test".to_string(),
        status,
        qr_code: String::new(),
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
        linked_user_ids: vec![UserId::new("u1")],
    }
}

fn broadcast(id: &str, instance_id: &str, status: BroadcastStatus) -> Broadcast {
    Broadcast {
        id: BroadcastId::new(id),
        user_id: UserId::new("u1"),
        instance_id: InstanceId::new(instance_id),
        name: "campaign".to_string(),
        message: "hello {hi|hey}".to_string(),
        image_url: None,
        status,
        total: 10,
        sent: 0,
        failed: 0,
        delay_min: 5,
        delay_max: 10,
        daily_limit: 0,
        working_hour_start: 8,
        working_hour_end: 20,
        is_turbo_mode: false,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn get_instance_returns_none_for_unknown_id() {
    let store = InMemoryStore::new();
    assert!(store.get_instance(&InstanceId::new("missing")).await.unwrap().is_none());
}

#[tokio::test]
async fn set_instance_status_updates_status_and_qr_and_rejects_unknown_id() {
    let store = InMemoryStore::new();
    store.put_instance(instance("i1", InstanceStatus::Initializing));

    store
        .set_instance_status(&InstanceId::new("i1"), InstanceStatus::QrReady, Some("data".to_string()))
        .await
        .unwrap();
    let reloaded = store.get_instance(&InstanceId::new("i1")).await.unwrap().unwrap();
    assert_eq!(reloaded.status, InstanceStatus::QrReady);
    assert_eq!(reloaded.qr_code, "data");

    let err = store
        .set_instance_status(&InstanceId::new("missing"), InstanceStatus::Connected, None)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InstanceNotFound(_)));
}

#[tokio::test]
async fn list_initializing_excludes_instances_with_no_linked_users() {
    let store = InMemoryStore::new();
    let mut orphan = instance("orphan", InstanceStatus::Initializing);
    orphan.linked_user_ids.clear();
    store.put_instance(orphan);
    store.put_instance(instance("linked", InstanceStatus::Initializing));
    store.put_instance(instance("connected", InstanceStatus::Connected));

    let found = store.list_initializing(10).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, InstanceId::new("linked"));
}

#[tokio::test]
async fn disconnect_all_clears_status_and_qr_for_named_ids_only() {
    let store = InMemoryStore::new();
    let mut connected = instance("i1", InstanceStatus::Connected);
    connected.qr_code = "stale".to_string();
    store.put_instance(connected);
    store.put_instance(instance("i2", InstanceStatus::Connected));

    store.disconnect_all(&[InstanceId::new("i1")]).await.unwrap();

    let i1 = store.get_instance(&InstanceId::new("i1")).await.unwrap().unwrap();
    assert_eq!(i1.status, InstanceStatus::Disconnected);
    assert!(i1.qr_code.is_empty());
    let i2 = store.get_instance(&InstanceId::new("i2")).await.unwrap().unwrap();
    assert_eq!(i2.status, InstanceStatus::Connected);
}

#[tokio::test]
async fn claim_broadcast_returns_none_when_nothing_claimable() {
    let store = InMemoryStore::new();
    store.put_broadcast(broadcast("b1", "i1", BroadcastStatus::Completed));
    assert!(store.claim_broadcast(&InstanceId::new("i1")).await.unwrap().is_none());
}

#[tokio::test]
async fn claim_broadcast_returns_owning_user_and_first_ten_pending_messages() {
    let store = InMemoryStore::new();
    store.put_user(User { id: UserId::new("u1"), credit: 500 });
    store.put_broadcast(broadcast("b1", "i1", BroadcastStatus::Pending));
    for n in 0..15 {
        store.put_message(Message::new(
            MessageId::new(format!("m{n}")),
            BroadcastId::new("b1"),
            format!("628{n}"),
        ));
    }

    let claim = store.claim_broadcast(&InstanceId::new("i1")).await.unwrap().unwrap();
    assert_eq!(claim.broadcast.id, BroadcastId::new("b1"));
    assert_eq!(claim.user.credit, 500);
    assert_eq!(claim.batch.len(), 10);
}

#[tokio::test]
async fn claim_broadcast_prefers_the_oldest_created_broadcast() {
    let store = InMemoryStore::new();
    store.put_user(User { id: UserId::new("u1"), credit: 10 });

    let mut older = broadcast("older", "i1", BroadcastStatus::Pending);
    older.created_at = chrono::Utc::now() - chrono::Duration::hours(2);
    let newer = broadcast("newer", "i1", BroadcastStatus::Pending);
    store.put_broadcast(newer);
    store.put_broadcast(older);

    let claim = store.claim_broadcast(&InstanceId::new("i1")).await.unwrap().unwrap();
    assert_eq!(claim.broadcast.id, BroadcastId::new("older"));
}

#[tokio::test]
async fn record_send_success_marks_message_bumps_sent_and_decrements_credit() {
    let store = InMemoryStore::new();
    store.put_user(User { id: UserId::new("u1"), credit: 3 });
    store.put_broadcast(broadcast("b1", "i1", BroadcastStatus::Running));
    let message_id = MessageId::new("m1");
    store.put_message(Message::new(message_id.clone(), BroadcastId::new("b1"), "6281".to_string()));

    let meta = test_meta();
    store
        .record_send_success(SendSuccess {
            message_id: &message_id,
            sent_at: chrono::Utc::now(),
            content: "hello there".to_string(),
            meta,
        })
        .await
        .unwrap();

    let message = store.message(&message_id).unwrap();
    assert_eq!(message.status, MessageStatus::Sent);
    assert_eq!(message.content.as_deref(), Some("hello there"));
    let b = store.broadcast(&BroadcastId::new("b1")).unwrap();
    assert_eq!(b.sent, 1);
    let u = store.user(&UserId::new("u1")).unwrap();
    assert_eq!(u.credit, 2);
}

#[tokio::test]
async fn record_send_failure_marks_message_and_bumps_failed_without_touching_credit() {
    let store = InMemoryStore::new();
    store.put_user(User { id: UserId::new("u1"), credit: 3 });
    store.put_broadcast(broadcast("b1", "i1", BroadcastStatus::Running));
    let message_id = MessageId::new("m1");
    store.put_message(Message::new(message_id.clone(), BroadcastId::new("b1"), "6281".to_string()));

    store
        .record_send_failure(&message_id, "invalid jid".to_string())
        .await
        .unwrap();

    let message = store.message(&message_id).unwrap();
    assert_eq!(message.status, MessageStatus::Failed);
    assert_eq!(message.error.as_deref(), Some("invalid jid"));
    let b = store.broadcast(&BroadcastId::new("b1")).unwrap();
    assert_eq!(b.failed, 1);
    let u = store.user(&UserId::new("u1")).unwrap();
    assert_eq!(u.credit, 3);
}

#[tokio::test]
async fn pause_running_broadcasts_only_touches_running_ones_for_that_instance() {
    let store = InMemoryStore::new();
    store.put_broadcast(broadcast("running", "i1", BroadcastStatus::Running));
    store.put_broadcast(broadcast("pending", "i1", BroadcastStatus::Pending));
    store.put_broadcast(broadcast("other-instance", "i2", BroadcastStatus::Running));

    store
        .pause_running_broadcasts(&InstanceId::new("i1"), BroadcastStatus::PausedRateLimit)
        .await
        .unwrap();

    assert_eq!(store.broadcast(&BroadcastId::new("running")).unwrap().status, BroadcastStatus::PausedRateLimit);
    assert_eq!(store.broadcast(&BroadcastId::new("pending")).unwrap().status, BroadcastStatus::Pending);
    assert_eq!(store.broadcast(&BroadcastId::new("other-instance")).unwrap().status, BroadcastStatus::Running);
}

#[tokio::test]
async fn resume_paused_broadcasts_covers_both_pause_reasons() {
    let store = InMemoryStore::new();
    store.put_broadcast(broadcast("rl", "i1", BroadcastStatus::PausedRateLimit));
    store.put_broadcast(broadcast("wh", "i1", BroadcastStatus::PausedWorkingHours));
    store.put_broadcast(broadcast("credit", "i1", BroadcastStatus::PausedNoCredit));

    store.resume_paused_broadcasts(&InstanceId::new("i1")).await.unwrap();

    assert_eq!(store.broadcast(&BroadcastId::new("rl")).unwrap().status, BroadcastStatus::Running);
    assert_eq!(store.broadcast(&BroadcastId::new("wh")).unwrap().status, BroadcastStatus::Running);
    assert_eq!(store.broadcast(&BroadcastId::new("credit")).unwrap().status, BroadcastStatus::PausedNoCredit);
}

#[tokio::test]
async fn append_log_is_observable_via_logs() {
    let store = InMemoryStore::new();
    store
        .append_log(waengine_core::BroadcastLog::new(
            BroadcastId::new("b1"),
            waengine_core::LogAction::TrustTier,
            "assigned NEWBORN",
            chrono::Utc::now(),
        ))
        .await
        .unwrap();
    assert_eq!(store.logs().len(), 1);
}

#[tokio::test]
async fn contact_lifecycle_filters_by_pending_status() {
    let store = InMemoryStore::new();
    store.put_contact(Contact {
        id: ContactId::new("c1"),
        user_id: UserId::new("u1"),
        phone: "6281".to_string(),
        status: ContactStatus::Pending,
    });
    store.put_contact(Contact {
        id: ContactId::new("c2"),
        user_id: UserId::new("u1"),
        phone: "6282".to_string(),
        status: ContactStatus::Verified,
    });

    let pending = store.list_pending_contacts(10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, ContactId::new("c1"));

    store.set_contact_status(&ContactId::new("c1"), ContactStatus::Verified).await.unwrap();
    assert!(store.list_pending_contacts(10).await.unwrap().is_empty());
}

fn test_meta() -> waengine_core::AntiBannedMeta {
    waengine_core::AntiBannedMeta {
        spintax_variant: "hello there".to_string(),
        zero_width_token: "zw[1]:0".to_string(),
        typing_duration_ms: 1200,
        post_send_delay_ms: 4000,
        batch_index: 0,
        daily_index: 0,
        memory_mb: 256,
        timestamp: chrono::Utc::now(),
        has_media: false,
        instance_id: InstanceId::new("i1"),
        is_turbo: false,
        tier_name: "VETERAN".to_string(),
        account_age_days: 90,
        delay_multiplier: 1.0,
        consecutive_fails_before_send: 0,
        total_sent_in_session: 1,
    }
}
