// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the waengine authors

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! waengine-core: domain types and pure algorithms for the broadcast
//! worker engine. No I/O — everything here is deterministic given its
//! inputs (and, where randomness is load-bearing, an injectable RNG).

pub mod clock;
pub mod human_clock;
pub mod ids;
pub mod model;
pub mod phone;
pub mod spintax;
pub mod trust_tier;
pub mod zerowidth;

pub use clock::{Clock, FakeClock, SystemClock};
pub use ids::{BroadcastId, ContactId, InstanceId, MessageId, UserId};
pub use model::{
    AntiBannedMeta, Broadcast, BroadcastLog, BroadcastStatus, Contact, ContactStatus, Instance,
    InstanceStatus, LogAction, Message, MessageStatus, User,
};
pub use phone::{is_plausible_msisdn, normalise_phone, to_jid};
pub use trust_tier::{DailySoftCap, Tier, TierParams};
