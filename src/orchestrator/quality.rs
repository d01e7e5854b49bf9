//! Result-set quality assessment.

use crate::types::{Confidence, QualityMetrics, SearchResult};

/// Result count at which coverage saturates.
pub const TARGET_RESULT_COUNT: usize = 10;

const HIGH_MIN_COUNT: usize = 10;
const HIGH_MIN_SCORE: f64 = 0.7;
const MEDIUM_MIN_COUNT: usize = 5;
const MEDIUM_MIN_SCORE: f64 = 0.6;

/// Assess a fused result list.
///
/// Native scores come from different backends and are only used as a
/// rough ceiling check. A set in which no result carries a score can reach
/// `high` on count alone but never `medium`.
pub fn assess(results: &[SearchResult]) -> QualityMetrics {
    if results.is_empty() {
        return QualityMetrics::empty();
    }

    let count = results.len();
    let coverage = (count as f64 / TARGET_RESULT_COUNT as f64).min(1.0);
    let max_score = results
        .iter()
        .filter_map(|r| r.score)
        .filter(|s| s.is_finite())
        .reduce(f64::max);

    let confidence = if count >= HIGH_MIN_COUNT && max_score.map_or(true, |m| m >= HIGH_MIN_SCORE)
    {
        Confidence::High
    } else if count >= MEDIUM_MIN_COUNT && max_score.is_some_and(|m| m >= MEDIUM_MIN_SCORE) {
        Confidence::Medium
    } else {
        Confidence::Low
    };

    QualityMetrics {
        confidence,
        coverage,
        needs_escalation: confidence == Confidence::Low,
        result_count: count,
        max_score,
    }
}
