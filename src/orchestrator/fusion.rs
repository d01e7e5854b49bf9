//! Reciprocal Rank Fusion over backend result lists.
//!
//! The score for an item at 1-indexed rank `r` in list `i` is:
//!
//! ```text
//! rrf(item) = Σ_i  1 / (k + r_i)
//! ```
//!
//! Items absent from a list contribute nothing from that list, so an item
//! found by several backends accumulates a larger score. Native backend
//! scores play no part: fusion is purely ordinal.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::collections::HashSet;

use crate::config::DEFAULT_RRF_K;
use crate::types::RankedList;

/// One fused item.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedItem {
    pub item_key: String,
    pub rrf_score: f64,
}

/// Replace a non-finite or negative `k` with the default.
pub fn sanitize_k(k: f64) -> f64 {
    if k.is_finite() && k >= 0.0 {
        k
    } else {
        DEFAULT_RRF_K
    }
}

#[inline]
fn rank_contribution(k: f64, rank: usize) -> f64 {
    let rank = u32::try_from(rank.max(1)).unwrap_or(u32::MAX);
    1.0 / (k + f64::from(rank))
}

/// Fuse ranked lists with plain RRF.
///
/// Output is sorted by descending score; equal scores are ordered by
/// ascending `item_key` so the result never depends on list or hash order.
pub fn rrf_fuse<'a>(lists: impl IntoIterator<Item = &'a RankedList>, k: f64) -> Vec<FusedItem> {
    weighted_rrf_fuse(lists.into_iter().map(|list| (list, 1.0)), k)
}

/// Fuse ranked lists, scaling each list's contributions by its weight.
///
/// Non-finite or negative weights count as zero. A key repeated inside one
/// list only contributes from its best rank.
pub fn weighted_rrf_fuse<'a>(
    lists: impl IntoIterator<Item = (&'a RankedList, f64)>,
    k: f64,
) -> Vec<FusedItem> {
    let k = sanitize_k(k);
    let mut scores: HashMap<&'a str, f64> = HashMap::new();

    for (list, weight) in lists {
        let weight = if weight.is_finite() && weight > 0.0 {
            weight
        } else {
            0.0
        };
        let mut seen: HashSet<&str> = HashSet::new();
        for result in list.results() {
            if !seen.insert(result.item_key.as_str()) {
                continue;
            }
            *scores.entry(result.item_key.as_str()).or_insert(0.0) +=
                weight * rank_contribution(k, result.rank);
        }
    }

    let mut fused: Vec<FusedItem> = scores
        .into_iter()
        .map(|(item_key, rrf_score)| FusedItem {
            item_key: item_key.to_string(),
            rrf_score,
        })
        .collect();
    fused.sort_by(compare_fused);
    tracing::debug!(count = fused.len(), k, "rrf fusion complete");
    fused
}

fn compare_fused(a: &FusedItem, b: &FusedItem) -> Ordering {
    b.rrf_score
        .total_cmp(&a.rrf_score)
        .then_with(|| a.item_key.cmp(&b.item_key))
}
