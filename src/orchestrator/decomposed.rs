//! Merge of per-sub-query result lists.
//!
//! A result at rank `r` of a sub-query with importance `w` contributes
//! `base * w / r`, where `base` is its native score (1.0 when absent).
//! Contributions add up per `item_key`, so an item returned by several
//! sub-queries rises.

use std::collections::HashMap;

use crate::types::{SearchResult, SubQuery};

use super::dedup::merge_found_in;

/// Native score used when a result has none.
pub const DEFAULT_BASE_SCORE: f64 = 1.0;

/// Weighted contribution of one result.
pub fn weighted_contribution(result: &SearchResult, importance: f64) -> f64 {
    let base = result
        .score
        .filter(|s| s.is_finite())
        .unwrap_or(DEFAULT_BASE_SCORE);
    base * importance / result.rank.max(1) as f64
}

/// Merge sub-query result lists into one ranking of at most `limit` items.
///
/// The first result seen for a key is its representative; `found_in` is
/// the union across every sub-query that returned it. `combined_score`
/// holds the accumulated sum and ranks are renumbered from 1.
pub fn merge_sub_query_results(
    per_sub_query: &[(SubQuery, Vec<SearchResult>)],
    limit: usize,
) -> Vec<SearchResult> {
    let mut order: Vec<String> = Vec::new();
    let mut merged: HashMap<String, (SearchResult, f64)> = HashMap::new();

    for (sub_query, results) in per_sub_query {
        for result in results {
            let contribution = weighted_contribution(result, sub_query.importance);
            match merged.get_mut(&result.item_key) {
                Some((representative, total)) => {
                    *total += contribution;
                    merge_found_in(&mut representative.found_in, &result.found_in);
                }
                None => {
                    order.push(result.item_key.clone());
                    merged.insert(result.item_key.clone(), (result.clone(), contribution));
                }
            }
        }
    }

    let mut ranked: Vec<(SearchResult, f64)> = order
        .into_iter()
        .filter_map(|key| merged.remove(&key))
        .collect();
    ranked.sort_by(|(a, a_total), (b, b_total)| {
        b_total
            .total_cmp(a_total)
            .then_with(|| a.item_key.cmp(&b.item_key))
    });
    ranked.truncate(limit);

    ranked
        .into_iter()
        .enumerate()
        .map(|(position, (mut result, total))| {
            result.rank = position + 1;
            result.combined_score = Some(total);
            result
        })
        .collect()
}
