//! Graph backend: knowledge-graph traversal.
//!
//! Seeds the traversal with papers attached to the best-matching entities,
//! then follows citation/related edges from each seed. Seeds come first,
//! followed by their neighbours in seed order.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

use crate::backend::Backend;
use crate::error::SearchError;
use crate::types::{BackendKind, RankedList, SearchResult};

use super::entity::DEFAULT_ENTITY_TYPES;
use super::store::GraphStore;

/// Default number of seed papers expanded per query.
const DEFAULT_SEED_PAPERS: usize = 3;

/// Adapter over [`GraphStore::find_related_papers`].
pub struct GraphBackend {
    store: Arc<dyn GraphStore>,
    seed_papers: usize,
}

impl GraphBackend {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self {
            store,
            seed_papers: DEFAULT_SEED_PAPERS,
        }
    }

    /// Number of seed papers to traverse from.
    pub fn with_seed_papers(mut self, seed_papers: usize) -> Self {
        self.seed_papers = seed_papers.max(1);
        self
    }
}

#[async_trait]
impl Backend for GraphBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Graph
    }

    async fn search(&self, query: &str, limit: usize) -> Result<RankedList, SearchError> {
        tracing::trace!(query, "graph traversal");

        let entities = self
            .store
            .search_entities(query, DEFAULT_ENTITY_TYPES, self.seed_papers)
            .await?;

        let mut seen: HashSet<String> = HashSet::new();
        let mut seeds: Vec<SearchResult> = Vec::new();
        for entity in entities {
            for paper in entity.papers {
                if seeds.len() >= self.seed_papers {
                    break;
                }
                if seen.insert(paper.item_key.clone()) {
                    let mut result = paper.into_result(None);
                    result.score = result.score.or(entity.relevance);
                    result.metadata.insert("seed".into(), true.into());
                    seeds.push(result);
                }
            }
        }

        let mut results: Vec<SearchResult> = Vec::new();
        let mut neighbours: Vec<SearchResult> = Vec::new();
        for seed in seeds {
            let related = self.store.find_related_papers(&seed.item_key, limit).await?;
            for paper in related {
                if seen.insert(paper.item_key.clone()) {
                    let mut result = paper.into_result(None);
                    result
                        .metadata
                        .insert("related_to".into(), seed.item_key.clone().into());
                    neighbours.push(result);
                }
            }
            results.push(seed);
        }
        results.extend(neighbours);
        results.truncate(limit);

        tracing::debug!(count = results.len(), "graph results");
        Ok(RankedList::new(BackendKind::Graph.name(), results))
    }

    async fn is_available(&self) -> bool {
        match self.store.node_count().await {
            Ok(count) => count > 0,
            Err(err) => {
                tracing::debug!(error = %err, "graph availability probe failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::store::{EntityRecord, PaperRecord};
    use std::collections::HashMap;

    struct CitationGraph {
        entities: Vec<EntityRecord>,
        edges: HashMap<&'static str, Vec<&'static str>>,
        fail_related: bool,
    }

    #[async_trait]
    impl GraphStore for CitationGraph {
        async fn search_entities(
            &self,
            _query: &str,
            _types: &[&str],
            limit: usize,
        ) -> Result<Vec<EntityRecord>, SearchError> {
            Ok(self.entities.iter().take(limit).cloned().collect())
        }

        async fn find_related_papers(
            &self,
            item_key: &str,
            limit: usize,
        ) -> Result<Vec<PaperRecord>, SearchError> {
            if self.fail_related {
                return Err(SearchError::backend("graph", "traversal failed"));
            }
            Ok(self
                .edges
                .get(item_key)
                .map(|keys| {
                    keys.iter()
                        .take(limit)
                        .map(|k| PaperRecord::new(*k, format!("Paper {k}")))
                        .collect()
                })
                .unwrap_or_default())
        }

        async fn node_count(&self) -> Result<usize, SearchError> {
            Ok(self.entities.len() + self.edges.len())
        }
    }

    fn graph(fail_related: bool) -> Arc<CitationGraph> {
        let entity = EntityRecord {
            name: "Attention".into(),
            entity_type: "concept".into(),
            relevance: Some(0.8),
            papers: vec![PaperRecord::new("a", "Paper a"), PaperRecord::new("b", "Paper b")],
        };
        let mut edges = HashMap::new();
        edges.insert("a", vec!["c", "b", "d"]);
        edges.insert("b", vec!["d", "e"]);
        Arc::new(CitationGraph {
            entities: vec![entity],
            edges,
            fail_related,
        })
    }

    #[tokio::test]
    async fn seeds_precede_neighbours_without_duplicates() {
        let backend = GraphBackend::new(graph(false));
        let list = backend.search("attention", 10).await.expect("search");
        let keys: Vec<&str> = list.results().iter().map(|r| r.item_key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(list.results()[0].score, Some(0.8));
        assert_eq!(list.results()[2].metadata["related_to"], "a");
        assert_eq!(list.results()[4].metadata["related_to"], "b");
    }

    #[tokio::test]
    async fn truncates_to_limit() {
        let backend = GraphBackend::new(graph(false));
        let list = backend.search("attention", 3).await.expect("search");
        assert_eq!(list.len(), 3);
    }

    #[tokio::test]
    async fn single_seed_limits_traversal() {
        let backend = GraphBackend::new(graph(false)).with_seed_papers(1);
        let list = backend.search("attention", 10).await.expect("search");
        let keys: Vec<&str> = list.results().iter().map(|r| r.item_key.as_str()).collect();
        assert_eq!(keys, vec!["a", "c", "b", "d"]);
    }

    #[tokio::test]
    async fn traversal_failure_propagates() {
        let backend = GraphBackend::new(graph(true));
        let err = backend.search("attention", 10).await.unwrap_err();
        assert!(err.to_string().contains("traversal failed"));
    }
}
