//! Result deduplication and provenance tagging by `item_key`.
//!
//! Fusion already merges items by key, but merged sub-query results and
//! refined result sets can still carry repeats. Deduplication keeps the
//! first occurrence so rank order is preserved. Provenance records every
//! backend whose raw list returned the item.

use std::collections::{BTreeMap, HashSet};

use crate::types::{BackendKind, RankedList, SearchResult};

/// Keep the first occurrence of each `item_key`, preserving order.
pub fn deduplicate(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut seen: HashSet<String> = HashSet::with_capacity(results.len());
    results
        .into_iter()
        .filter(|r| seen.insert(r.item_key.clone()))
        .collect()
}

/// Fill `found_in` on every result with the names of the backends whose
/// list contains its key, in canonical backend order.
pub fn tag_provenance(
    results: &mut [SearchResult],
    results_by_backend: &BTreeMap<BackendKind, RankedList>,
) {
    for result in results.iter_mut() {
        result.found_in = results_by_backend
            .iter()
            .filter(|(_, list)| list.contains(&result.item_key))
            .map(|(kind, _)| kind.name().to_string())
            .collect();
    }
}

/// Union `extra` into `found_in`, keeping first-seen order.
pub(crate) fn merge_found_in(found_in: &mut Vec<String>, extra: &[String]) {
    for name in extra {
        if !found_in.contains(name) {
            found_in.push(name.clone());
        }
    }
}
