//! Id-based merging of server pages into a list.
use crate::model::Identified;
use std::collections::HashSet;

/// Drop repeated ids, keeping the first occurrence and server order.
pub(crate) fn dedupe<T: Identified>(items: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::with_capacity(items.len());
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        if seen.insert(item.id().to_string()) {
            out.push(item);
        }
    }
    out
}

/// Append the items of `page` whose ids are not yet in `items`.
///
/// Returns how many were appended. Rows shift on the server between page
/// requests, so a later page routinely repeats entries already shown.
pub(crate) fn append_unique<T: Identified>(items: &mut Vec<T>, page: Vec<T>) -> usize {
    let mut seen: HashSet<String> = items.iter().map(|i| i.id().to_string()).collect();
    let before = items.len();
    for item in page {
        if seen.insert(item.id().to_string()) {
            items.push(item);
        }
    }
    items.len() - before
}
