//! Pattern-based intent classification.
//!
//! Tables are checked in priority order and the first match wins:
//! entity discovery, relationships, metadata, then the semantic default.

use serde::{Deserialize, Serialize};

use crate::patterns::{any_match, QueryPatterns};
use crate::types::Intent;

/// Confidence reported for an entity-discovery match.
pub const ENTITY_CONFIDENCE: f64 = 0.95;
/// Confidence reported for a relationship match.
pub const RELATIONSHIP_CONFIDENCE: f64 = 0.9;
/// Confidence reported for a metadata match.
pub const METADATA_CONFIDENCE: f64 = 0.8;
/// Confidence reported when nothing matched.
pub const SEMANTIC_CONFIDENCE: f64 = 0.7;

/// Classified intent with its confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntentClassification {
    pub intent: Intent,
    pub confidence: f64,
}

/// Classify `query` against the compiled tables.
pub fn classify(query: &str, patterns: &QueryPatterns) -> IntentClassification {
    let (intent, confidence) = if any_match(&patterns.entity, query) {
        (Intent::Entity, ENTITY_CONFIDENCE)
    } else if any_match(&patterns.relationship, query) {
        (Intent::Relationship, RELATIONSHIP_CONFIDENCE)
    } else if any_match(&patterns.metadata, query) {
        (Intent::Metadata, METADATA_CONFIDENCE)
    } else {
        (Intent::Semantic, SEMANTIC_CONFIDENCE)
    };

    IntentClassification { intent, confidence }
}
