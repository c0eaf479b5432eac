// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the waengine authors

use super::*;
use chrono::{Duration, Utc};

fn instance_with_age(days: i64) -> Instance {
    Instance {
        id: InstanceId::new("i1"),
        phone_number: "628100000000".into(),
        name: "main".into(),
        status: InstanceStatus::Connected,
        qr_code: String::new(),
        created_at: Utc::now() - Duration::days(days),
        updated_at: Utc::now(),
        linked_user_ids: vec![UserId::new("u1")],
    }
}

#[test]
fn age_days_floors_at_zero_for_future_timestamps() {
    let mut instance = instance_with_age(0);
    instance.created_at = Utc::now() + Duration::hours(1);
    assert_eq!(instance.age_days(Utc::now()), 0);
}

#[test]
fn age_days_reports_whole_days_elapsed() {
    let instance = instance_with_age(10);
    assert_eq!(instance.age_days(Utc::now()), 10);
}

#[test]
fn disconnected_instances_have_no_supervisor() {
    assert!(!InstanceStatus::Disconnected.has_supervisor());
    assert!(InstanceStatus::Initializing.has_supervisor());
    assert!(InstanceStatus::QrReady.has_supervisor());
    assert!(InstanceStatus::Connected.has_supervisor());
    assert!(InstanceStatus::Disconnecting.has_supervisor());
}

#[test]
fn spintax_preview_truncates_at_200_chars_on_a_char_boundary() {
    let meta = AntiBannedMeta {
        spintax_variant: "é".repeat(250),
        zero_width_token: String::new(),
        typing_duration_ms: 0,
        post_send_delay_ms: 0,
        batch_index: 0,
        daily_index: 0,
        memory_mb: 0,
        timestamp: Utc::now(),
        has_media: false,
        instance_id: InstanceId::new("i1"),
        is_turbo: false,
        tier_name: "VETERAN".into(),
        account_age_days: 60,
        delay_multiplier: 1.0,
        consecutive_fails_before_send: 0,
        total_sent_in_session: 0,
    };
    assert_eq!(meta.spintax_preview().chars().count(), 200);
}

#[test]
fn log_action_display_matches_spec_tags() {
    assert_eq!(LogAction::TrustTier.to_string(), "TRUST_TIER");
    assert_eq!(LogAction::RateLimitPause.to_string(), "RATE_LIMIT_PAUSE");
    assert_eq!(LogAction::CircuitBreaker.to_string(), "CIRCUIT_BREAKER");
}
