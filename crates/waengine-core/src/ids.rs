// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the waengine authors

//! Newtype identifiers for the entities in §3 of the data model.
//!
//! All ids are opaque strings assigned by the dashboard tier; the engine
//! never generates one itself except for short-lived log/debug tokens.

/// Define a newtype id wrapper around `String` with the usual trait impls.
///
/// Generates `new()`, `as_str()`, `Display`, `From<String>`, `From<&str>`,
/// `PartialEq<str>`, `PartialEq<&str>`, and `Borrow<str>`.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id! {
    /// Identifies one paired messaging session (§3 Instance).
    pub struct InstanceId;
}

define_id! {
    /// Identifies one authored campaign (§3 Broadcast).
    pub struct BroadcastId;
}

define_id! {
    /// Identifies one recipient slot within a broadcast (§3 Message).
    pub struct MessageId;
}

define_id! {
    /// Identifies the user owning credit and contacts (§3 User).
    pub struct UserId;
}

define_id! {
    /// Identifies one contact under verification (§3 Contact).
    pub struct ContactId;
}

#[cfg(test)]
#[path = "ids_tests.rs"]
mod tests;
