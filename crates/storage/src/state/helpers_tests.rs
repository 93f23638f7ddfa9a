// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sendense_core::BackupId;

#[test]
fn exact_match_wins() {
    let mut map = HashMap::new();
    let id = BackupId::from_string("bck-aaaaaaaaaaaaaaaaaaa");
    map.insert(id, 1u32);
    assert_eq!(find_by_prefix(&map, "bck-aaaaaaaaaaaaaaaaaaa"), Some(&1));
}

#[test]
fn unique_prefix_matches() {
    let mut map = HashMap::new();
    map.insert(BackupId::from_string("bck-aaaaaaaaaaaaaaaaaaa"), 1u32);
    assert_eq!(find_by_prefix(&map, "bck-aaaa"), Some(&1));
}

#[test]
fn ambiguous_prefix_returns_none() {
    let mut map = HashMap::new();
    map.insert(BackupId::from_string("bck-aaaaaaaaaaaaaaaaaaa"), 1u32);
    map.insert(BackupId::from_string("bck-aaabbbbbbbbbbbbbbb"), 2u32);
    assert_eq!(find_by_prefix(&map, "bck-aaa"), None);
}

#[test]
fn no_match_returns_none() {
    let map: HashMap<BackupId, u32> = HashMap::new();
    assert_eq!(find_by_prefix(&map, "bck-zzz"), None);
}
