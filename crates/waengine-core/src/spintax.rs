// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the waengine authors

//! Spintax expander (§4.2).
//!
//! Resolves nested `{a|b|c}` alternation groups by repeatedly finding and
//! substituting the innermost group (no `{` between its `{` and `}`), up to
//! a fixed recursion bound. Exceeding the bound returns the
//! partially-expanded text rather than erroring — the spec explicitly wants
//! a best-effort string here, never a failed send.

use rand::Rng;

const MAX_PASSES: usize = 10;

/// Expand one concrete string from `template`, choosing each alternative
/// uniformly at random.
pub fn expand(template: &str) -> String {
    expand_with_rng(template, &mut rand::rng())
}

/// Same as [`expand`] but with an injected RNG, for deterministic tests.
pub fn expand_with_rng(template: &str, rng: &mut impl Rng) -> String {
    let mut current = template.to_string();
    for _ in 0..MAX_PASSES {
        match find_innermost_group(&current) {
            Some((start, end)) => {
                let alternatives: Vec<&str> = current[start + 1..end].split('|').collect();
                let choice = if alternatives.is_empty() {
                    ""
                } else {
                    alternatives[rng.random_range(0..alternatives.len())]
                };
                current.replace_range(start..=end, choice);
            }
            None => return current,
        }
    }
    current
}

/// Find the span `(open_brace_idx, close_brace_idx)` of the first innermost
/// group: a `{` immediately followed (with no other `{`) by a matching `}`.
fn find_innermost_group(s: &str) -> Option<(usize, usize)> {
    let bytes = s.as_bytes();
    let mut last_open: Option<usize> = None;
    for (idx, &b) in bytes.iter().enumerate() {
        match b {
            b'{' => last_open = Some(idx),
            b'}' => {
                if let Some(open) = last_open {
                    return Some((open, idx));
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
#[path = "spintax_tests.rs"]
mod tests;
