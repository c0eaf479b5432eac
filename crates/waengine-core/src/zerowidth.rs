// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the waengine authors

//! Zero-Width Tagger (§4.3).
//!
//! Appends a short random sequence of invisible code points so that two
//! otherwise-identical sent messages are bit-distinct without changing how
//! either one renders — this is the uniqueness half of the anti-ban
//! pipeline's content step (§4.10 step k.6).

use rand::Rng;

/// Fixed pool of invisible code points the tagger draws from.
const INVISIBLE_POOL: [char; 6] = [
    '\u{200B}', // zero-width space
    '\u{200C}', // zero-width non-joiner
    '\u{200D}', // zero-width joiner
    '\u{FEFF}', // byte-order mark / zero-width no-break space
    '\u{2060}', // word joiner
    '\u{2062}', // invisible times
];

/// A tagged string and the debug token describing exactly which code points
/// were appended, for logging.
#[derive(Debug, Clone, PartialEq)]
pub struct Tagged {
    pub text: String,
    pub token: String,
}

/// Append 1-5 invisible code points to `s`.
pub fn tag(s: &str) -> Tagged {
    tag_with_rng(s, &mut rand::rng())
}

/// Same as [`tag`] but with an injected RNG, for deterministic tests.
pub fn tag_with_rng(s: &str, rng: &mut impl Rng) -> Tagged {
    let n = rng.random_range(1..=5usize);
    let mut text = s.to_string();
    let mut indices = Vec::with_capacity(n);
    for _ in 0..n {
        let idx = rng.random_range(0..INVISIBLE_POOL.len());
        text.push(INVISIBLE_POOL[idx]);
        indices.push(idx.to_string());
    }
    let token = format!("zw[{n}]:{}", indices.join(","));
    Tagged { text, token }
}

/// Count of visible (non zero-width, non-BOM) characters, used to assert
/// that tagging never alters rendered text (§8 round-trip law).
pub fn visible_char_count(s: &str) -> usize {
    s.chars().filter(|c| !INVISIBLE_POOL.contains(c)).count()
}

#[cfg(test)]
#[path = "zerowidth_tests.rs"]
mod tests;
