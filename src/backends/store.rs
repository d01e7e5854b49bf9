//! Contracts of the external stores wrapped by the backend adapters.
//!
//! The vector index, graph database, and metadata index live outside this
//! crate. Adapters only see them through these traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SearchError;
use crate::patterns::QueryPatterns;
use crate::types::{Metadata, SearchResult};

/// A paper-like record as stored by the graph and metadata stores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    pub item_key: String,
    pub title: String,
    #[serde(default)]
    pub abstract_text: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub year: Option<u16>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Store-native relevance, if the store computes one.
    #[serde(default)]
    pub score: Option<f64>,
}

impl PaperRecord {
    pub fn new(item_key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            item_key: item_key.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    /// Convert into an unranked [`SearchResult`] with the record's fields
    /// copied into well-known metadata keys.
    pub fn into_result(self, matched_text: Option<String>) -> SearchResult {
        let mut metadata = Metadata::new();
        metadata.insert("title".into(), self.title.clone().into());
        if !self.abstract_text.is_empty() {
            metadata.insert("abstract".into(), self.abstract_text.into());
        }
        if !self.authors.is_empty() {
            metadata.insert("authors".into(), self.authors.into());
        }
        if let Some(year) = self.year {
            metadata.insert("year".into(), year.into());
        }
        if let Some(venue) = self.venue {
            metadata.insert("venue".into(), venue.into());
        }
        if !self.tags.is_empty() {
            metadata.insert("tags".into(), self.tags.into());
        }

        SearchResult {
            item_key: self.item_key,
            rank: 1,
            score: self.score,
            matched_text: matched_text.unwrap_or(self.title),
            metadata,
            found_in: Vec::new(),
            combined_score: None,
        }
    }
}

/// One nearest-neighbour hit from the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorHit {
    pub id: String,
    pub similarity: f64,
    #[serde(default)]
    pub payload: Metadata,
}

/// An entity node from the knowledge graph with the papers mentioning it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub name: String,
    pub entity_type: String,
    #[serde(default)]
    pub relevance: Option<f64>,
    #[serde(default)]
    pub papers: Vec<PaperRecord>,
}

/// Structured filters understood by the vector and metadata stores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFilter {
    pub author: Option<String>,
    pub year: Option<u16>,
    pub venue: Option<String>,
}

impl MetadataFilter {
    pub fn is_empty(&self) -> bool {
        self.author.is_none() && self.year.is_none() && self.venue.is_none()
    }

    /// Pull author, year, and venue filters out of a free-text query.
    ///
    /// Returns the filter and the remaining free text with the matched
    /// phrases removed. When everything was consumed, the original query
    /// is returned as the free text.
    pub fn from_query(query: &str, patterns: &QueryPatterns) -> (Self, String) {
        let mut filter = Self::default();
        let mut residual = query.to_string();

        if let Some(caps) = patterns.author.captures(query) {
            filter.author = caps.get(1).map(|m| m.as_str().to_string());
            if let Some(whole) = caps.get(0) {
                residual = residual.replacen(whole.as_str(), " ", 1);
            }
        }
        if let Some(caps) = patterns.venue.captures(query) {
            if let Some(venue) = caps.get(1) {
                filter.venue = Some(venue.as_str().to_string());
            }
            if let Some(whole) = caps.get(0) {
                residual = residual.replacen(whole.as_str(), " ", 1);
            }
        }
        if let Some(caps) = patterns.year.captures(query) {
            filter.year = caps.get(1).and_then(|m| m.as_str().parse().ok());
            if let Some(whole) = caps.get(0) {
                residual = residual.replacen(whole.as_str(), " ", 1);
            }
        }

        let residual = residual.split_whitespace().collect::<Vec<_>>().join(" ");
        let text = if residual.is_empty() {
            query.trim().to_string()
        } else {
            residual
        };
        (filter, text)
    }
}

/// Text → embedding model.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError>;
}

/// Nearest-neighbour vector index.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn nearest(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<VectorHit>, SearchError>;

    /// Number of indexed vectors.
    async fn len(&self) -> Result<usize, SearchError>;
}

/// Knowledge-graph store.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn search_entities(
        &self,
        query: &str,
        types: &[&str],
        limit: usize,
    ) -> Result<Vec<EntityRecord>, SearchError>;

    async fn find_related_papers(
        &self,
        item_key: &str,
        limit: usize,
    ) -> Result<Vec<PaperRecord>, SearchError>;

    /// Number of nodes in the graph.
    async fn node_count(&self) -> Result<usize, SearchError>;
}

/// Keyword and structured-field index.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn search(
        &self,
        text: &str,
        filter: &MetadataFilter,
        limit: usize,
    ) -> Result<Vec<PaperRecord>, SearchError>;

    /// Number of indexed records.
    async fn len(&self) -> Result<usize, SearchError>;
}
