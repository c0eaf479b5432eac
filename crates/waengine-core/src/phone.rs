// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the waengine authors

//! Recipient phone normalisation (§4.10 step k.2, §8 round-trip law).
//!
//! See DESIGN.md for how the two normalisation examples in §8
//! (`normalisePhone("0812-345-6789") == "62812-3456789"` and
//! `normalisePhone("+6281234") == "6281234"`) and the separate "length
//! outside [10, 15] -> empty string" rule are reconciled: the length bound
//! is enforced by [`to_jid`], not by [`normalise_phone`] itself.

/// Strip everything but digits and rewrite a leading `0` national prefix to
/// the `62` (Indonesia) country code. Performs no length validation — see
/// [`to_jid`] for the JID-construction step that does.
pub fn normalise_phone(input: &str) -> String {
    let digits: String = input.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.starts_with('0') {
        format!("62{}", &digits[1..])
    } else {
        digits
    }
}

/// Whether a normalised digit string is a plausible MSISDN length.
pub fn is_plausible_msisdn(normalised: &str) -> bool {
    (10..=15).contains(&normalised.len())
}

/// Build the protocol-addressable JID for a normalised phone number.
///
/// Returns `None` if `phone` does not normalise to a plausible MSISDN
/// (length outside `[10, 15]`).
pub fn to_jid(phone: &str) -> Option<String> {
    let normalised = normalise_phone(phone);
    if is_plausible_msisdn(&normalised) {
        Some(format!("{normalised}@s.whatsapp.net"))
    } else {
        None
    }
}

#[cfg(test)]
#[path = "phone_tests.rs"]
mod tests;
