//! Compound-query decomposition into weighted sub-queries.
//!
//! Patterns are tried in priority order and the first one that yields at
//! least two non-empty parts wins. Nothing is combined across patterns.
//! A query no pattern splits comes back as a single primary sub-query.

use regex::Regex;

use crate::patterns::QueryPatterns;
use crate::types::{SubQuery, SubQueryKind};

const REQUIRED_IMPORTANCE: f64 = 1.0;
const OPTIONAL_IMPORTANCE: f64 = 0.7;
const PRIMARY_IMPORTANCE: f64 = 1.0;
const PREPOSITION_SUPPORT: f64 = 0.6;
const LIST_SUPPORT: f64 = 0.5;
const PHRASE_SUPPORT: f64 = 0.4;
const MAX_PHRASES: usize = 3;

/// Split on `re`, dropping empty fragments. `None` unless ≥2 parts remain.
fn split_parts(re: &Regex, query: &str) -> Option<Vec<String>> {
    let parts: Vec<String> = re
        .split(query)
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    (parts.len() >= 2).then_some(parts)
}

fn uniform(parts: Vec<String>, kind: SubQueryKind, importance: f64) -> Vec<SubQuery> {
    parts
        .into_iter()
        .map(|p| SubQuery::new(p, kind, importance))
        .collect()
}

fn primary_with_support(query: &str, support: Vec<String>, importance: f64) -> Vec<SubQuery> {
    let mut subs = vec![SubQuery::new(query, SubQueryKind::Primary, PRIMARY_IMPORTANCE)];
    subs.extend(
        support
            .into_iter()
            .map(|p| SubQuery::new(p, SubQueryKind::Supporting, importance)),
    );
    subs
}

/// Decompose `query` into sub-queries.
pub fn decompose(query: &str, patterns: &QueryPatterns) -> Vec<SubQuery> {
    let query = query.trim();

    if let Some(parts) = split_parts(&patterns.explicit_and, query) {
        return uniform(parts, SubQueryKind::Required, REQUIRED_IMPORTANCE);
    }
    if let Some(parts) = split_parts(&patterns.explicit_or, query) {
        return uniform(parts, SubQueryKind::Optional, OPTIONAL_IMPORTANCE);
    }
    if let Some(parts) = split_parts(&patterns.natural_conjunction, query) {
        return uniform(parts, SubQueryKind::Required, REQUIRED_IMPORTANCE);
    }
    if let Some(caps) = patterns.preposition.captures(query) {
        let head = caps.get(1).map_or("", |m| m.as_str()).trim();
        let tail = caps.get(2).map_or("", |m| m.as_str()).trim();
        if !head.is_empty() && !tail.is_empty() {
            return primary_with_support(
                query,
                vec![head.to_string(), tail.to_string()],
                PREPOSITION_SUPPORT,
            );
        }
    }
    if query.contains(',') {
        let parts: Vec<String> = query
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        if parts.len() >= 2 {
            return primary_with_support(query, parts, LIST_SUPPORT);
        }
    }
    let phrases: Vec<String> = patterns
        .capitalized_phrase
        .find_iter(query)
        .map(|m| m.as_str().to_string())
        .collect();
    if phrases.len() >= 2 {
        let support = phrases.into_iter().take(MAX_PHRASES).collect();
        return primary_with_support(query, support, PHRASE_SUPPORT);
    }

    tracing::trace!(query, "no decomposition pattern matched");
    vec![SubQuery::new(query, SubQueryKind::Primary, PRIMARY_IMPORTANCE)]
}
