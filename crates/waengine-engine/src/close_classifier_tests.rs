// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the waengine authors

use super::*;

fn close(status_code: Option<u16>, message: &str) -> CloseEvent {
    CloseEvent { status_code, message: message.to_string() }
}

#[test]
fn stream_restart_keeps_session_with_flat_delay() {
    let action = classify_close(&close(Some(515), "stream restart"), 0);
    assert_eq!(action, CloseAction::ReconnectKeepSession(ReconnectDelay::StreamRestart));
}

#[test]
fn stream_errored_message_keeps_session() {
    let action = classify_close(&close(None, "Stream Errored (restart required)"), 0);
    assert_eq!(action, CloseAction::ReconnectKeepSession(ReconnectDelay::Normal));
}

#[test]
fn explicit_logged_out_wipes_session() {
    let action = classify_close(&close(Some(401), "you have been logged out"), 0);
    assert_eq!(action, CloseAction::ReconnectWipeSession);
}

#[test]
fn status_codes_401_403_440_wipe_session() {
    for code in [401u16, 403, 440] {
        let action = classify_close(&close(Some(code), "closed"), 0);
        assert_eq!(action, CloseAction::ReconnectWipeSession, "code {code}");
    }
}

#[test]
fn bad_session_message_wipes_session_regardless_of_status() {
    let action = classify_close(&close(None, "Bad Session detected"), 0);
    assert_eq!(action, CloseAction::ReconnectWipeSession);

    let action = classify_close(&close(None, "qr refs over limit"), 0);
    assert_eq!(action, CloseAction::ReconnectWipeSession);
}

#[test]
fn rate_limit_status_codes_pause_for_rate_limit() {
    for code in [429u16, 405, 503] {
        let action = classify_close(&close(Some(code), "closed"), 0);
        assert_eq!(action, CloseAction::PauseForRateLimit, "code {code}");
    }
}

#[test]
fn rate_limit_message_markers_pause_for_rate_limit() {
    for marker in ["rate-overlimit", "too many requests", "spam detected", "blocked", "you have been banned"] {
        let action = classify_close(&close(None, marker), 0);
        assert_eq!(action, CloseAction::PauseForRateLimit, "marker {marker}");
    }
}

#[test]
fn connection_lost_keeps_session_under_four_failures() {
    let action = classify_close(&close(None, "Connection Lost"), 2);
    assert_eq!(action, CloseAction::ReconnectKeepSession(ReconnectDelay::Normal));
}

#[test]
fn connection_lost_gives_up_on_the_fourth_failure() {
    let action = classify_close(&close(None, "connection timed out"), 3);
    assert_eq!(action, CloseAction::GiveUpWipeSession);
}

#[test]
fn unrecognised_close_reconnects_and_keeps_session() {
    let action = classify_close(&close(Some(999), "something unexpected"), 0);
    assert_eq!(action, CloseAction::ReconnectKeepSession(ReconnectDelay::Normal));
}

#[test]
fn is_connection_lost_matches_both_phrasings() {
    assert!(is_connection_lost(&close(None, "Connection Lost")));
    assert!(is_connection_lost(&close(None, "request timed out")));
    assert!(!is_connection_lost(&close(None, "stream errored")));
}
