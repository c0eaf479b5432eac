// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the waengine authors

use super::*;

#[test]
fn fingerprint_pool_has_exactly_ten_entries() {
    assert_eq!(FINGERPRINT_POOL.len(), 10);
}

#[test]
fn fingerprint_pool_entries_are_pairwise_distinct() {
    for (i, a) in FINGERPRINT_POOL.iter().enumerate() {
        for (j, b) in FINGERPRINT_POOL.iter().enumerate() {
            if i != j {
                assert_ne!(a, b);
            }
        }
    }
}
