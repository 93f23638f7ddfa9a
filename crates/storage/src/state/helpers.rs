// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

/// Looks up `id` by exact match first, then by unique prefix (like a git
/// commit hash). Returns `None` if no key matches, or if more than one key
/// shares the prefix (ambiguous).
pub fn find_by_prefix<'a, K, V>(map: &'a HashMap<K, V>, id: &str) -> Option<&'a V>
where
    K: Eq + Hash + Borrow<str>,
{
    if let Some(v) = map.get(id) {
        return Some(v);
    }
    let mut matches = map.iter().filter(|(k, _)| k.borrow().starts_with(id));
    let first = matches.next()?;
    if matches.next().is_some() {
        return None;
    }
    Some(first.1)
}

#[cfg(test)]
#[path = "helpers_tests.rs"]
mod tests;
