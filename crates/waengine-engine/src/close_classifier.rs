// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the waengine authors

//! Close classification (§4.7 "Close classification"): maps a
//! `connection = close` event to the action the Socket Supervisor takes.
//! Cases are mutually exclusive and the first match wins.

use waengine_adapters::CloseEvent;

/// Case 6 give-up threshold: the 4th consecutive `connection lost` close
/// (kept in sync with [`crate::supervisor::MAX_CONNECTION_FAILURES`]).
const GIVE_UP_AFTER_CONSECUTIVE_FAILURES: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDelay {
    /// Case 1: stream restart, 2 s flat.
    StreamRestart,
    /// Normal backoff, uniform [3 s, 10 s].
    Normal,
    /// Rate-limit backoff, uniform [25 s, 45 s].
    RateLimited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseAction {
    /// Reconnect, keeping the session directory.
    ReconnectKeepSession(ReconnectDelay),
    /// Wipe the session directory, then reconnect (fresh QR cycle).
    ReconnectWipeSession,
    /// Mark the supervisor paused and pause RUNNING broadcasts to
    /// `PAUSED_RATE_LIMIT`, then reconnect with the rate-limit backoff.
    PauseForRateLimit,
    /// Wipe the session and persist `DISCONNECTED` — no reconnect
    /// (case 6, 4th consecutive connection-lost failure).
    GiveUpWipeSession,
}

const RATE_LIMIT_STATUS_CODES: [u16; 3] = [429, 405, 503];
const WIPE_STATUS_CODES: [u16; 3] = [401, 403, 440];
const LOGGED_OUT_STATUS_CODE: u16 = 401; // library-reported "logged out" uses 401 with a distinct message
const STREAM_RESTART_STATUS_CODE: u16 = 515;

const RATE_LIMIT_MESSAGE_MARKERS: [&str; 4] = ["rate-overlimit", "too many", "spam", "blocked"];
const BAD_SESSION_MARKERS: [&str; 2] = ["bad session", "qr refs over limit"];
const STREAM_ERROR_MARKERS: [&str; 2] = ["stream errored", "handshake"];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    let lower = haystack.to_lowercase();
    needles.iter().any(|n| lower.contains(n))
}

/// Case 6 needs the running count of consecutive connection-lost closes;
/// callers own that counter (it lives on the supervisor's per-instance
/// state, not in this pure function) and pass it in.
pub fn classify_close(event: &CloseEvent, consecutive_connection_lost: u32) -> CloseAction {
    let message_lower = event.message.to_lowercase();

    if event.status_code == Some(STREAM_RESTART_STATUS_CODE) {
        return CloseAction::ReconnectKeepSession(ReconnectDelay::StreamRestart);
    }

    if contains_any(&message_lower, &STREAM_ERROR_MARKERS) {
        return CloseAction::ReconnectKeepSession(ReconnectDelay::Normal);
    }

    if event.status_code == Some(LOGGED_OUT_STATUS_CODE) && message_lower.contains("logged out") {
        return CloseAction::ReconnectWipeSession;
    }

    let status_requests_wipe = event.status_code.is_some_and(|c| WIPE_STATUS_CODES.contains(&c));
    if status_requests_wipe || contains_any(&message_lower, &BAD_SESSION_MARKERS) {
        return CloseAction::ReconnectWipeSession;
    }

    let status_is_rate_limited = event.status_code == Some(405)
        || event.status_code.is_some_and(|c| RATE_LIMIT_STATUS_CODES.contains(&c));
    if status_is_rate_limited || contains_any(&message_lower, &RATE_LIMIT_MESSAGE_MARKERS) || message_lower.contains("banned")
    {
        return CloseAction::PauseForRateLimit;
    }

    let is_connection_lost = message_lower.contains("connection lost") || message_lower.contains("timed out");
    if is_connection_lost && consecutive_connection_lost + 1 >= GIVE_UP_AFTER_CONSECUTIVE_FAILURES {
        return CloseAction::GiveUpWipeSession;
    }
    if is_connection_lost {
        return CloseAction::ReconnectKeepSession(ReconnectDelay::Normal);
    }

    CloseAction::ReconnectKeepSession(ReconnectDelay::Normal)
}

/// Whether a close event should be attributed to `connection lost`, used by
/// the supervisor to decide whether to bump its failure counter at all.
pub fn is_connection_lost(event: &CloseEvent) -> bool {
    let lower = event.message.to_lowercase();
    lower.contains("connection lost") || lower.contains("timed out")
}

#[cfg(test)]
#[path = "close_classifier_tests.rs"]
mod tests;
