//! Intent-driven backend selection and weighting.
//!
//! Each intent maps to a backend set and a weight table. Weights are
//! normalised over the selected backends so they always sum to 1.0.

use crate::backend::Availability;
use crate::types::{BackendKind, BackendWeights, Intent, SearchMode};

/// Backends chosen for one query, in canonical order, with their weights.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendSelection {
    pub backends: Vec<BackendKind>,
    pub weights: BackendWeights,
}

/// Default weight table for an intent, covering every backend.
///
/// Every weight is positive, including backends outside the intent's
/// preferred set.
pub fn intent_weights(intent: Intent) -> BackendWeights {
    let table: [(BackendKind, f64); 4] = match intent {
        Intent::Entity => [
            (BackendKind::Semantic, 0.2),
            (BackendKind::Graph, 0.2),
            (BackendKind::Entity, 0.5),
            (BackendKind::Metadata, 0.1),
        ],
        Intent::Relationship => [
            (BackendKind::Semantic, 0.3),
            (BackendKind::Graph, 0.5),
            (BackendKind::Entity, 0.1),
            (BackendKind::Metadata, 0.1),
        ],
        Intent::Metadata => [
            (BackendKind::Semantic, 0.3),
            (BackendKind::Graph, 0.05),
            (BackendKind::Entity, 0.05),
            (BackendKind::Metadata, 0.6),
        ],
        Intent::Semantic => [
            (BackendKind::Semantic, 0.7),
            (BackendKind::Graph, 0.1),
            (BackendKind::Entity, 0.1),
            (BackendKind::Metadata, 0.1),
        ],
    };
    table.into_iter().collect()
}

/// Restrict `intent`'s table to `backends` and renormalise.
pub fn weights_for(intent: Intent, backends: &[BackendKind]) -> BackendWeights {
    let table = intent_weights(intent);
    let mut weights: BackendWeights = backends
        .iter()
        .map(|kind| (*kind, table.get(kind).copied().unwrap_or(0.0)))
        .collect();
    let total: f64 = weights.values().sum();
    if total > 0.0 {
        for weight in weights.values_mut() {
            *weight /= total;
        }
    }
    weights
}

/// Preferred backends for an intent before availability filtering.
fn preferred(intent: Intent, availability: &Availability) -> Vec<BackendKind> {
    match intent {
        Intent::Entity if availability.graph_available() => vec![BackendKind::Entity],
        Intent::Relationship if availability.graph_available() => {
            vec![BackendKind::Semantic, BackendKind::Graph]
        }
        Intent::Metadata => vec![BackendKind::Semantic, BackendKind::Metadata],
        _ => vec![BackendKind::Semantic],
    }
}

/// Map `(intent, availability, mode)` to a backend set and weights.
///
/// Unavailable backends are dropped. The semantic backend is the floor: a
/// selection is never empty.
pub fn select_backends(
    intent: Intent,
    availability: &Availability,
    mode: SearchMode,
) -> BackendSelection {
    let candidates = match mode {
        SearchMode::Fast => vec![BackendKind::Semantic],
        SearchMode::Comprehensive => availability.kinds().to_vec(),
        SearchMode::Auto => preferred(intent, availability),
    };

    let mut backends: Vec<BackendKind> = candidates
        .into_iter()
        .filter(|kind| availability.is_available(*kind))
        .collect();
    if backends.is_empty() {
        backends.push(BackendKind::Semantic);
    }
    backends.sort();
    backends.dedup();

    let weights = weights_for(intent, &backends);
    tracing::debug!(%intent, %mode, backends = ?backends, "backends selected");
    BackendSelection { backends, weights }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_available() -> Availability {
        Availability::new(BackendKind::all().iter().copied())
    }

    fn semantic_only() -> Availability {
        Availability::new([BackendKind::Semantic, BackendKind::Metadata])
    }

    #[test]
    fn entity_intent_with_graph_uses_entity_only() {
        let sel = select_backends(Intent::Entity, &all_available(), SearchMode::Auto);
        assert_eq!(sel.backends, vec![BackendKind::Entity]);
        assert!((sel.weights[&BackendKind::Entity] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn relationship_intent_with_graph() {
        let sel = select_backends(Intent::Relationship, &all_available(), SearchMode::Auto);
        assert_eq!(sel.backends, vec![BackendKind::Semantic, BackendKind::Graph]);
        let sum: f64 = sel.weights.values().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!(sel.weights[&BackendKind::Graph] > sel.weights[&BackendKind::Semantic]);
    }

    #[test]
    fn graph_intents_fall_back_without_graph() {
        for intent in [Intent::Entity, Intent::Relationship] {
            let sel = select_backends(intent, &semantic_only(), SearchMode::Auto);
            assert_eq!(sel.backends, vec![BackendKind::Semantic]);
        }
    }

    #[test]
    fn metadata_intent() {
        let sel = select_backends(Intent::Metadata, &semantic_only(), SearchMode::Auto);
        assert_eq!(sel.backends, vec![BackendKind::Semantic, BackendKind::Metadata]);
    }

    #[test]
    fn semantic_intent() {
        let sel = select_backends(Intent::Semantic, &all_available(), SearchMode::Auto);
        assert_eq!(sel.backends, vec![BackendKind::Semantic]);
    }

    #[test]
    fn fast_mode_forces_semantic() {
        let sel = select_backends(Intent::Relationship, &all_available(), SearchMode::Fast);
        assert_eq!(sel.backends, vec![BackendKind::Semantic]);
    }

    #[test]
    fn comprehensive_mode_uses_everything_available() {
        let sel = select_backends(Intent::Semantic, &all_available(), SearchMode::Comprehensive);
        assert_eq!(sel.backends, BackendKind::all());
        let sum: f64 = sel.weights.values().sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn unavailable_metadata_is_dropped() {
        let availability = Availability::new([BackendKind::Semantic]);
        let sel = select_backends(Intent::Metadata, &availability, SearchMode::Auto);
        assert_eq!(sel.backends, vec![BackendKind::Semantic]);
    }

    #[test]
    fn semantic_is_the_floor() {
        let sel = select_backends(Intent::Entity, &Availability::default(), SearchMode::Auto);
        assert_eq!(sel.backends, vec![BackendKind::Semantic]);
        let sel = select_backends(
            Intent::Semantic,
            &Availability::default(),
            SearchMode::Comprehensive,
        );
        assert_eq!(sel.backends, vec![BackendKind::Semantic]);
    }

    #[test]
    fn entity_intent_when_only_graph_traversal_is_available() {
        let availability = Availability::new([BackendKind::Semantic, BackendKind::Graph]);
        let sel = select_backends(Intent::Entity, &availability, SearchMode::Auto);
        assert_eq!(sel.backends, vec![BackendKind::Semantic]);
    }
}
