// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the waengine authors

//! Socket Supervisor (§4.7): the per-instance connection state machine.
//!
//! Modelled as a pure reducer — `reduce(state, event) -> Vec<effect>` — in
//! the style of the teacher's `Event`/`Effect` split: deciding what to do
//! is synchronous and fully testable, while actually doing it (persisting
//! to the store, opening/tearing down sockets, sleeping) is a thin async
//! driver (see [`crate::engine::Engine::drive_supervisor_effects`]) that
//! interprets the effect list against real adapters.

use crate::close_classifier::{classify_close, is_connection_lost, CloseAction, ReconnectDelay};
use waengine_adapters::CloseEvent;
use waengine_core::InstanceStatus;

const MAX_QR_ATTEMPTS: u32 = 6;
const MAX_CONNECTION_FAILURES: u32 = 4;

/// In-memory state the reducer tracks alongside the persisted `Instance`
/// row (these fields are not part of the data model — §4.7 calls them
/// `qrAttempts`/`connectionFailures`/`isPaused`, engine-local bookkeeping).
#[derive(Debug, Clone, PartialEq)]
pub struct SupervisorState {
    pub qr_attempts: u32,
    pub connection_failures: u32,
    pub is_paused: bool,
    /// The reducer's own record of the status it last persisted — needed
    /// because `CredsUpdated`'s "only if still QR_READY" guard (§4.7) has
    /// no other way to see the persisted row from a pure function.
    pub status: InstanceStatus,
}

impl Default for SupervisorState {
    fn default() -> Self {
        Self { qr_attempts: 0, connection_failures: 0, is_paused: false, status: InstanceStatus::Disconnected }
    }
}

#[derive(Debug, Clone)]
pub enum SupervisorEvent {
    CredsUpdated { user_present: bool },
    ConnectionConnecting,
    QrReceived(String),
    ConnectionClose(CloseEvent),
    ConnectionOpen,
    StuckTimerFired,
    QrTimerFired,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SupervisorEffect {
    PersistStatus { status: InstanceStatus, qr_code: Option<String> },
    TearDownSocket,
    ArmStuckTimer,
    ArmQrTimer,
    CancelTimers,
    WipeSession,
    Reconnect { delay: ReconnectDelay, keep_session: bool },
    PauseRunningBroadcasts,
    ResumeRunningBroadcasts,
    StartPresenceHeartbeat,
    StartAutoRead,
    LaunchBroadcastProcessor,
    GiveUp,
}

/// Apply one event to `state`, mutating it and returning the effects the
/// async driver must carry out, in order.
pub fn reduce(state: &mut SupervisorState, event: SupervisorEvent) -> Vec<SupervisorEffect> {
    let effects = reduce_inner(state, event);
    for effect in &effects {
        if let SupervisorEffect::PersistStatus { status, .. } = effect {
            state.status = *status;
        }
    }
    effects
}

fn reduce_inner(state: &mut SupervisorState, event: SupervisorEvent) -> Vec<SupervisorEffect> {
    match event {
        SupervisorEvent::CredsUpdated { user_present } => {
            // The protocol library persists the credential bytes itself;
            // the engine only reacts to an identity becoming available —
            // and only flips a *stale QR prompt* to a syncing state (§4.7:
            // "if ... the persisted status is still QR_READY"). A creds
            // update that lands after the instance is already CONNECTED
            // (routine for this protocol) must not revert it.
            if user_present && state.status == InstanceStatus::QrReady {
                vec![SupervisorEffect::PersistStatus {
                    status: InstanceStatus::Initializing,
                    qr_code: Some(String::new()),
                }]
            } else {
                vec![]
            }
        }

        SupervisorEvent::ConnectionConnecting => vec![SupervisorEffect::ArmStuckTimer],

        SupervisorEvent::QrReceived(payload) => {
            state.qr_attempts += 1;
            if state.qr_attempts >= MAX_QR_ATTEMPTS {
                vec![
                    SupervisorEffect::TearDownSocket,
                    SupervisorEffect::PersistStatus { status: InstanceStatus::Disconnected, qr_code: None },
                ]
            } else {
                vec![
                    SupervisorEffect::PersistStatus { status: InstanceStatus::QrReady, qr_code: Some(payload) },
                    SupervisorEffect::ArmQrTimer,
                ]
            }
        }

        SupervisorEvent::QrTimerFired => {
            if state.qr_attempts >= MAX_QR_ATTEMPTS {
                vec![
                    SupervisorEffect::TearDownSocket,
                    SupervisorEffect::PersistStatus { status: InstanceStatus::Disconnected, qr_code: None },
                ]
            } else {
                vec![]
            }
        }

        SupervisorEvent::StuckTimerFired => {
            vec![
                SupervisorEffect::TearDownSocket,
                SupervisorEffect::PersistStatus { status: InstanceStatus::Disconnected, qr_code: None },
            ]
        }

        SupervisorEvent::ConnectionClose(close_event) => {
            let was_connection_lost = is_connection_lost(&close_event);
            let action = classify_close(&close_event, state.connection_failures);

            if was_connection_lost {
                state.connection_failures += 1;
            } else {
                state.connection_failures = 0;
            }

            match action {
                CloseAction::ReconnectKeepSession(delay) => {
                    vec![
                        SupervisorEffect::TearDownSocket,
                        SupervisorEffect::Reconnect { delay, keep_session: true },
                    ]
                }
                CloseAction::ReconnectWipeSession => {
                    vec![
                        SupervisorEffect::TearDownSocket,
                        SupervisorEffect::WipeSession,
                        SupervisorEffect::Reconnect { delay: ReconnectDelay::Normal, keep_session: false },
                    ]
                }
                CloseAction::PauseForRateLimit => {
                    state.is_paused = true;
                    vec![
                        SupervisorEffect::TearDownSocket,
                        SupervisorEffect::PauseRunningBroadcasts,
                        SupervisorEffect::Reconnect { delay: ReconnectDelay::RateLimited, keep_session: true },
                    ]
                }
                CloseAction::GiveUpWipeSession => {
                    vec![
                        SupervisorEffect::TearDownSocket,
                        SupervisorEffect::WipeSession,
                        SupervisorEffect::PersistStatus { status: InstanceStatus::Disconnected, qr_code: None },
                        SupervisorEffect::GiveUp,
                    ]
                }
            }
        }

        SupervisorEvent::ConnectionOpen => {
            state.qr_attempts = 0;
            state.connection_failures = 0;
            state.is_paused = false;
            vec![
                SupervisorEffect::CancelTimers,
                SupervisorEffect::PersistStatus { status: InstanceStatus::Connected, qr_code: Some(String::new()) },
                SupervisorEffect::ResumeRunningBroadcasts,
                SupervisorEffect::StartPresenceHeartbeat,
                SupervisorEffect::StartAutoRead,
                SupervisorEffect::LaunchBroadcastProcessor,
            ]
        }
    }
}

/// Whether `connection_failures` has crossed the "4th consecutive failure"
/// give-up threshold used by case 6 of the close classifier.
pub fn has_exhausted_connection_attempts(state: &SupervisorState) -> bool {
    state.connection_failures >= MAX_CONNECTION_FAILURES
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
