// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the waengine authors

//! Pure pacing calculations used by the per-message pipeline (§4.10 step k):
//! the circuit breaker trip test, link detection, random activity
//! selection, typing-duration timing, and the post-send delay.

use rand::Rng;
use waengine_core::LogAction;

/// Circuit breaker trip test (§4.10 k.1): `consecutiveFailCount >= tier.circuitThreshold`.
pub fn circuit_tripped(consecutive_fails: u32, circuit_threshold: u32) -> bool {
    consecutive_fails >= circuit_threshold
}

const URL_MARKERS: [&str; 7] =
    ["http://", "https://", "www.", "bit.ly", "tinyurl.com", "t.co/", "goo.gl/"];

/// Scan a campaign body for URL-like patterns (§4.10 step f).
pub fn contains_link(body: &str) -> bool {
    let lower = body.to_lowercase();
    URL_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// One of the four random-activity behaviours (§4.10 step 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StealthActivity {
    Offline,
    PretendRead,
    BrowsePause,
    Composing,
}

impl StealthActivity {
    const ALL: [StealthActivity; 4] =
        [StealthActivity::Offline, StealthActivity::PretendRead, StealthActivity::BrowsePause, StealthActivity::Composing];

    pub fn pick(rng: &mut impl Rng) -> Self {
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }

    /// Inclusive duration range in seconds (§4.10 step 4, i-iv).
    pub fn duration_range_secs(self) -> (u64, u64) {
        match self {
            StealthActivity::Offline => (5, 15),
            StealthActivity::PretendRead => (3, 8),
            StealthActivity::BrowsePause => (8, 20),
            StealthActivity::Composing => (2, 5),
        }
    }

    pub fn log_action(self) -> LogAction {
        match self {
            StealthActivity::Offline => LogAction::StealthOffline,
            StealthActivity::PretendRead => LogAction::StealthPretendRead,
            StealthActivity::BrowsePause => LogAction::StealthBrowsePause,
            StealthActivity::Composing => LogAction::StealthComposing,
        }
    }

    pub fn sample_duration_secs(self, rng: &mut impl Rng) -> u64 {
        let (min, max) = self.duration_range_secs();
        rng.random_range(min..=max)
    }
}

/// Whether random activity injection fires this message (§4.10 step 4:
/// Turbo off, probability `tier.randomActivityChance`).
pub fn rolls_random_activity(turbo: bool, chance: f64, rng: &mut impl Rng) -> bool {
    !turbo && rng.random::<f64>() < chance
}

/// Typing duration in ms (§4.10 step 7): `max(3000, len*50) + (hasImage ?
/// 5000 : 0)`, scaled by the tier's typing multiplier, plus a jittered
/// upper bound of up to 3000 ms.
pub fn typing_duration_ms(text_len: usize, has_image: bool, typing_multiplier: f64, rng: &mut impl Rng) -> u64 {
    let base = (text_len as f64 * 50.0).max(3000.0) + if has_image { 5000.0 } else { 0.0 };
    let scaled = base * typing_multiplier;
    let jitter = rng.random_range(0.0..=3000.0);
    (scaled + jitter).round() as u64
}

/// Post-send delay in ms (§4.10 step 14): uniform `[userMin, userMax]`
/// seconds, scaled by `tier.delayMultiplier`, jittered by a factor uniform
/// in `[0.85, 1.15]`.
pub fn post_send_delay_ms(user_min_secs: u32, user_max_secs: u32, delay_multiplier: f64, rng: &mut impl Rng) -> u64 {
    let (min, max) = if user_min_secs <= user_max_secs {
        (user_min_secs, user_max_secs)
    } else {
        (user_max_secs, user_min_secs)
    };
    let base_secs = if min == max { min as f64 } else { rng.random_range(min..=max) as f64 };
    let jitter = rng.random_range(0.85..=1.15);
    (base_secs * delay_multiplier * jitter * 1000.0).round() as u64
}

#[cfg(test)]
#[path = "anti_ban_tests.rs"]
mod tests;
