// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the waengine authors

//! Trust Tier Classifier (§4.5): maps an instance's age to pacing
//! parameters consumed throughout the Broadcast Processor (§4.10).

use std::fmt;

/// Engine-assigned maturity class of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Newborn,
    Infant,
    Adolescent,
    Mature,
    Veteran,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tier::Newborn => "NEWBORN",
            Tier::Infant => "INFANT",
            Tier::Adolescent => "ADOLESCENT",
            Tier::Mature => "MATURE",
            Tier::Veteran => "VETERAN",
        };
        f.write_str(s)
    }
}

/// Soft daily cap: either a fixed clamp or "use the user's own `dailyLimit`
/// unclamped" (MATURE/VETERAN, table shows `0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailySoftCap {
    Clamp(u32),
    UseConfigured,
}

impl DailySoftCap {
    /// Apply the soft-cap semantics from §4.5: a non-zero tier cap clamps
    /// the campaign's `dailyLimit` downward (and turns an "unlimited" `0`
    /// into the tier cap); a zero tier cap leaves `configured` untouched.
    pub fn apply(self, configured: u32) -> u32 {
        match self {
            DailySoftCap::Clamp(cap) => {
                if configured == 0 {
                    cap
                } else {
                    configured.min(cap)
                }
            }
            DailySoftCap::UseConfigured => configured,
        }
    }
}

/// Pacing parameters attached to a [`Tier`] (§4.5 table).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierParams {
    pub tier: Tier,
    pub batch_size: u32,
    pub cooldown_min_secs: u64,
    pub cooldown_max_secs: u64,
    pub delay_multiplier: f64,
    pub daily_soft_cap: DailySoftCap,
    pub typing_multiplier: f64,
    pub requires_pre_verify: bool,
    pub random_activity_chance: f64,
    pub circuit_threshold: u32,
}

impl TierParams {
    pub const fn for_tier(tier: Tier) -> Self {
        match tier {
            Tier::Newborn => TierParams {
                tier,
                batch_size: 3,
                cooldown_min_secs: 5 * 60,
                cooldown_max_secs: 10 * 60,
                delay_multiplier: 3.0,
                daily_soft_cap: DailySoftCap::Clamp(25),
                typing_multiplier: 2.0,
                requires_pre_verify: true,
                random_activity_chance: 0.60,
                circuit_threshold: 2,
            },
            Tier::Infant => TierParams {
                tier,
                batch_size: 5,
                cooldown_min_secs: 4 * 60,
                cooldown_max_secs: 8 * 60,
                delay_multiplier: 2.0,
                daily_soft_cap: DailySoftCap::Clamp(50),
                typing_multiplier: 1.5,
                requires_pre_verify: true,
                random_activity_chance: 0.40,
                circuit_threshold: 3,
            },
            Tier::Adolescent => TierParams {
                tier,
                batch_size: 8,
                cooldown_min_secs: 3 * 60,
                cooldown_max_secs: 6 * 60,
                delay_multiplier: 1.5,
                daily_soft_cap: DailySoftCap::Clamp(100),
                typing_multiplier: 1.2,
                requires_pre_verify: true,
                random_activity_chance: 0.25,
                circuit_threshold: 3,
            },
            Tier::Mature => TierParams {
                tier,
                batch_size: 12,
                cooldown_min_secs: 2 * 60,
                cooldown_max_secs: 5 * 60,
                delay_multiplier: 1.0,
                daily_soft_cap: DailySoftCap::UseConfigured,
                typing_multiplier: 1.0,
                requires_pre_verify: false,
                random_activity_chance: 0.15,
                circuit_threshold: 4,
            },
            Tier::Veteran => TierParams {
                tier,
                batch_size: 15,
                cooldown_min_secs: 2 * 60,
                cooldown_max_secs: 5 * 60,
                delay_multiplier: 1.0,
                daily_soft_cap: DailySoftCap::UseConfigured,
                typing_multiplier: 1.0,
                requires_pre_verify: false,
                random_activity_chance: 0.10,
                circuit_threshold: 5,
            },
        }
    }
}

/// Classify an instance by age, with the "young session" override (§4.5):
/// a session open less than an hour on an account under 7 days old is
/// forced to NEWBORN regardless of its exact age bracket.
///
/// `age_days` of `None` (unknown `createdAt`) is treated as zero-day,
/// i.e. NEWBORN.
pub fn classify(age_days: Option<i64>, session_age_hours: f64) -> TierParams {
    let age_days = age_days.unwrap_or(0).max(0);

    if age_days < 7 && session_age_hours < 1.0 {
        return TierParams::for_tier(Tier::Newborn);
    }

    let tier = if age_days < 3 {
        Tier::Newborn
    } else if age_days < 7 {
        Tier::Infant
    } else if age_days < 14 {
        Tier::Adolescent
    } else if age_days < 30 {
        Tier::Mature
    } else {
        Tier::Veteran
    };

    TierParams::for_tier(tier)
}

#[cfg(test)]
#[path = "trust_tier_tests.rs"]
mod tests;
