//! Core data model: results, ranked lists, sub-queries, quality, backends.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::SearchError;

/// Opaque key/value bag attached to each result.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A single retrieval hit.
///
/// `item_key` is the only identity used when merging lists from different
/// backends. `score` is whatever the producing backend reports and is not
/// comparable across backends; `combined_score` is filled in by fusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Opaque unique identity of the underlying document.
    pub item_key: String,
    /// 1-indexed position in the list this result came from.
    pub rank: usize,
    /// Backend-native score, if the backend produces one.
    pub score: Option<f64>,
    /// Text that matched the query (title, snippet, or entity name).
    pub matched_text: String,
    /// Opaque payload; well-known keys are `title`, `abstract`, `tags`.
    #[serde(default)]
    pub metadata: Metadata,
    /// Backend names whose lists contained this item, in canonical order.
    #[serde(default)]
    pub found_in: Vec<String>,
    /// Fusion output. Comparable only within one fusion run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combined_score: Option<f64>,
}

impl SearchResult {
    /// Create a result with empty metadata and no provenance.
    pub fn new(item_key: impl Into<String>, score: Option<f64>) -> Self {
        Self {
            item_key: item_key.into(),
            rank: 1,
            score,
            matched_text: String::new(),
            metadata: Metadata::new(),
            found_in: Vec::new(),
            combined_score: None,
        }
    }

    /// Set the matched text.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.matched_text = text.into();
        self
    }

    /// Insert a metadata entry.
    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// The `title` metadata entry, if it is a string.
    pub fn title(&self) -> Option<&str> {
        self.metadata.get("title").and_then(|v| v.as_str())
    }

    /// The `abstract` metadata entry, if it is a string.
    pub fn abstract_text(&self) -> Option<&str> {
        self.metadata.get("abstract").and_then(|v| v.as_str())
    }

    /// String entries of the `tags` metadata array.
    pub fn tags(&self) -> Vec<&str> {
        self.metadata
            .get("tags")
            .and_then(|v| v.as_array())
            .map(|tags| tags.iter().filter_map(|t| t.as_str()).collect())
            .unwrap_or_default()
    }
}

/// An ordered list of results produced by exactly one backend or sub-query.
///
/// Ranks are positional: constructing a list renumbers every result from 1.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankedList {
    /// Name of the producing backend or sub-query.
    pub source: String,
    results: Vec<SearchResult>,
}

impl RankedList {
    /// Build a list, assigning ranks `1..=n` in the given order.
    pub fn new(source: impl Into<String>, mut results: Vec<SearchResult>) -> Self {
        for (position, result) in results.iter_mut().enumerate() {
            result.rank = position + 1;
        }
        Self {
            source: source.into(),
            results,
        }
    }

    /// An empty list for `source`.
    pub fn empty(source: impl Into<String>) -> Self {
        Self::new(source, Vec::new())
    }

    /// Results in rank order.
    pub fn results(&self) -> &[SearchResult] {
        &self.results
    }

    /// Consume the list, returning its results.
    pub fn into_results(self) -> Vec<SearchResult> {
        self.results
    }

    /// Number of results.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether the list has no results.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Whether an item with `item_key` appears in this list.
    pub fn contains(&self, item_key: &str) -> bool {
        self.results.iter().any(|r| r.item_key == item_key)
    }
}

/// Role of a decomposed sub-query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubQueryKind {
    /// Must be satisfied (explicit or natural conjunction).
    Required,
    /// Alternative (explicit `OR`).
    Optional,
    /// The full original query.
    Primary,
    /// A fragment that supports the primary query.
    Supporting,
}

/// A fragment of a compound query with its merge weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubQuery {
    /// Query text to execute.
    pub text: String,
    /// Role of this fragment.
    pub kind: SubQueryKind,
    /// Merge weight in `[0, 1]`.
    pub importance: f64,
}

impl SubQuery {
    /// Create a sub-query, trimming the text and clamping importance.
    pub fn new(text: impl Into<String>, kind: SubQueryKind, importance: f64) -> Self {
        Self {
            text: text.into().trim().to_string(),
            kind,
            importance: importance.clamp(0.0, 1.0),
        }
    }
}

/// Coarse confidence in a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Adequacy of a result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub confidence: Confidence,
    /// `min(1, count / 10)`.
    pub coverage: f64,
    pub needs_escalation: bool,
    /// Number of results assessed.
    pub result_count: usize,
    /// Largest native score present, if any result carried one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_score: Option<f64>,
}

impl QualityMetrics {
    /// Metrics for an empty result set.
    pub fn empty() -> Self {
        Self {
            confidence: Confidence::Low,
            coverage: 0.0,
            needs_escalation: true,
            result_count: 0,
            max_score: None,
        }
    }
}

/// Query intent used to pick backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    /// "Which concepts/methods appear in ..."
    Entity,
    /// Collaboration, citation, or relatedness questions.
    Relationship,
    /// Author, venue, or year lookups.
    Metadata,
    /// Everything else.
    Semantic,
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Entity => "entity",
            Self::Relationship => "relationship",
            Self::Metadata => "metadata",
            Self::Semantic => "semantic",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The retrieval backends the orchestrator knows how to drive.
///
/// Declaration order is the canonical order: maps keyed by `BackendKind`
/// iterate semantic, graph, entity, metadata.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Dense/sparse vector similarity.
    Semantic,
    /// Knowledge-graph traversal from seed papers to related papers.
    Graph,
    /// Knowledge-graph entity lookup.
    Entity,
    /// Keyword and structured metadata lookup.
    Metadata,
}

impl BackendKind {
    /// Returns the stable name of this backend.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Semantic => "semantic",
            Self::Graph => "graph",
            Self::Entity => "entity",
            Self::Metadata => "metadata",
        }
    }

    /// Returns all backend variants in canonical order.
    pub fn all() -> &'static [BackendKind] {
        &[Self::Semantic, Self::Graph, Self::Entity, Self::Metadata]
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackendKind {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SearchError::Config(format!("unknown backend: {s}")))
    }
}

/// Backend name → fusion weight, one table per intent.
pub type BackendWeights = BTreeMap<BackendKind, f64>;

/// How backends are chosen for a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Pick backends from the classified intent.
    #[default]
    Auto,
    /// Semantic backend only.
    Fast,
    /// Every available backend.
    Comprehensive,
}

impl SearchMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Fast => "fast",
            Self::Comprehensive => "comprehensive",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Record of an automatic query expansion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryExpansion {
    pub expanded_query: String,
    pub added_terms: Vec<String>,
    pub was_expanded: bool,
}

/// The well-formed response returned by every orchestration call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Query as submitted by the caller.
    pub query: String,
    pub results: Vec<SearchResult>,
    pub total_found: usize,
    pub quality_metrics: QualityMetrics,
    /// Per-backend failures; omitted when every backend succeeded.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors_by_backend: BTreeMap<BackendKind, String>,
    /// Set only when no backend could produce results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Mode label, e.g. `"auto"` or `"auto (escalated)"`.
    pub mode: String,
    pub intent: Intent,
    pub intent_confidence: f64,
    pub backends_used: Vec<BackendKind>,
    pub weights: BackendWeights,
    pub escalated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expansion: Option<QueryExpansion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_queries: Option<Vec<SubQuery>>,
    pub elapsed_ms: u64,
    pub request_id: uuid::Uuid,
}
