//! Locator-based deduplication.

use std::collections::HashSet;

use groundwork_shared::Passage;

/// Keep the first passage for each locator, preserving order.
pub fn dedup_by_locator(passages: Vec<Passage>) -> Vec<Passage> {
    let mut seen = HashSet::new();
    passages
        .into_iter()
        .filter(|p| seen.insert(p.locator.clone()))
        .collect()
}
