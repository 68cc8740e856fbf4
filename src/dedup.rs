// src/dedup.rs
use std::collections::HashSet;

use crate::item::{CanonicalId, RawItem};
use crate::state::KnownIdIndex;

/// Remove items whose canonical id is already in the index snapshot, or has
/// appeared earlier in the same sequence (e.g. a person showing up both in a
/// channel's upload list and in their person-search results).
///
/// Stable: surviving items keep their relative order. Pure over the snapshot;
/// concurrent index writes during the run are not visible here.
pub fn dedup_filter(items: Vec<RawItem>, known: &KnownIdIndex) -> (Vec<RawItem>, usize) {
    let mut seen_this_run: HashSet<CanonicalId> = HashSet::new();
    let mut kept = Vec::with_capacity(items.len());
    let mut removed = 0usize;

    for item in items {
        let id = item.canonical_id();
        if known.contains(&id) || !seen_this_run.insert(id) {
            removed += 1;
            continue;
        }
        kept.push(item);
    }

    (kept, removed)
}
