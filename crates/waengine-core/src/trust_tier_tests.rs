// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the waengine authors

use super::*;

#[test]
fn zero_age_is_newborn() {
    assert_eq!(classify(Some(0), 5.0).tier, Tier::Newborn);
}

#[test]
fn thirty_days_is_veteran() {
    assert_eq!(classify(Some(30), 500.0).tier, Tier::Veteran);
}

#[test]
fn young_session_override_forces_newborn() {
    // age 5 days would normally be INFANT, but session < 1h forces NEWBORN.
    assert_eq!(classify(Some(5), 0.5).tier, Tier::Newborn);
}

#[test]
fn override_does_not_apply_past_seven_days() {
    assert_eq!(classify(Some(8), 0.1).tier, Tier::Adolescent);
}

#[test]
fn unknown_created_at_is_treated_as_zero_day() {
    assert_eq!(classify(None, 10.0).tier, Tier::Newborn);
}

#[test]
fn tier_boundaries_match_the_table() {
    assert_eq!(classify(Some(2), 10.0).tier, Tier::Newborn);
    assert_eq!(classify(Some(3), 10.0).tier, Tier::Infant);
    assert_eq!(classify(Some(6), 10.0).tier, Tier::Infant);
    assert_eq!(classify(Some(7), 10.0).tier, Tier::Adolescent);
    assert_eq!(classify(Some(13), 10.0).tier, Tier::Adolescent);
    assert_eq!(classify(Some(14), 10.0).tier, Tier::Mature);
    assert_eq!(classify(Some(29), 10.0).tier, Tier::Mature);
    assert_eq!(classify(Some(30), 10.0).tier, Tier::Veteran);
}

#[test]
fn daily_soft_cap_clamps_down_and_replaces_unlimited() {
    let newborn = TierParams::for_tier(Tier::Newborn);
    assert_eq!(newborn.daily_soft_cap.apply(0), 25);
    assert_eq!(newborn.daily_soft_cap.apply(10), 10);
    assert_eq!(newborn.daily_soft_cap.apply(100), 25);
}

#[test]
fn mature_and_veteran_use_configured_limit_unclamped() {
    let veteran = TierParams::for_tier(Tier::Veteran);
    assert_eq!(veteran.daily_soft_cap.apply(0), 0);
    assert_eq!(veteran.daily_soft_cap.apply(10_000), 10_000);
}

#[test]
fn circuit_thresholds_match_the_table() {
    assert_eq!(TierParams::for_tier(Tier::Newborn).circuit_threshold, 2);
    assert_eq!(TierParams::for_tier(Tier::Infant).circuit_threshold, 3);
    assert_eq!(TierParams::for_tier(Tier::Adolescent).circuit_threshold, 3);
    assert_eq!(TierParams::for_tier(Tier::Mature).circuit_threshold, 4);
    assert_eq!(TierParams::for_tier(Tier::Veteran).circuit_threshold, 5);
}
