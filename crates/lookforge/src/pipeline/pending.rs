//! Pending-work arithmetic shared by every orchestrator.
//!
//! Pending work is never stored: it is the set of subjects whose index has
//! no result, recomputed from the session on every call.

use std::collections::HashSet;

use crate::session::{Indexed, ResultItem};

/// Subjects without a result, in subject order.
pub fn pending<'a, S: Indexed, R: Indexed>(subjects: &'a [S], results: &[R]) -> Vec<&'a S> {
    let done: HashSet<u32> = results.iter().map(Indexed::index).collect();
    subjects
        .iter()
        .filter(|s| !done.contains(&s.index()))
        .collect()
}

/// Next free index: past both the persisted high-water mark and every index
/// still in `items`. The mark covers deleted tail items, the scan covers
/// documents written before the mark existed.
pub fn next_index<T: Indexed>(high_water: u32, items: &[T]) -> u32 {
    items
        .iter()
        .map(|item| item.index() + 1)
        .fold(high_water, u32::max)
}

/// Replaces the result with the same index, or inserts it keeping the list
/// ordered by index.
pub fn upsert_result(results: &mut Vec<ResultItem>, item: ResultItem) {
    match results.binary_search_by_key(&item.index, |r| r.index) {
        Ok(pos) => results[pos] = item,
        Err(pos) => results.insert(pos, item),
    }
}

/// Removes the result for `index`, returning it if there was one.
pub fn remove_result(results: &mut Vec<ResultItem>, index: u32) -> Option<ResultItem> {
    let pos = results.iter().position(|r| r.index == index)?;
    Some(results.remove(pos))
}
