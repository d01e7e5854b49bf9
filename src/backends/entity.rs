//! Entity backend: knowledge-graph entity lookup.
//!
//! Finds concept/method/dataset nodes matching the query and returns the
//! papers that mention them, in entity relevance order.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

use crate::backend::Backend;
use crate::error::SearchError;
use crate::types::{BackendKind, RankedList, SearchResult};

use super::store::GraphStore;

/// Entity types searched by default.
pub const DEFAULT_ENTITY_TYPES: &[&str] = &["concept", "method", "dataset", "task"];

/// Adapter over [`GraphStore::search_entities`].
pub struct EntityBackend {
    store: Arc<dyn GraphStore>,
    entity_types: Vec<&'static str>,
}

impl EntityBackend {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self {
            store,
            entity_types: DEFAULT_ENTITY_TYPES.to_vec(),
        }
    }

    /// Search only the given entity types.
    pub fn with_entity_types(mut self, types: &[&'static str]) -> Self {
        self.entity_types = types.to_vec();
        self
    }
}

#[async_trait]
impl Backend for EntityBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Entity
    }

    async fn search(&self, query: &str, limit: usize) -> Result<RankedList, SearchError> {
        tracing::trace!(query, "entity search");

        let entities = self
            .store
            .search_entities(query, &self.entity_types, limit)
            .await?;

        let mut seen: HashSet<String> = HashSet::new();
        let mut results: Vec<SearchResult> = Vec::new();
        'entities: for entity in entities {
            for paper in entity.papers {
                if results.len() >= limit {
                    break 'entities;
                }
                if !seen.insert(paper.item_key.clone()) {
                    continue;
                }
                let score = entity.relevance.or(paper.score);
                let mut result = paper.into_result(Some(entity.name.clone()));
                result.score = score;
                result
                    .metadata
                    .insert("entity".into(), entity.name.clone().into());
                result
                    .metadata
                    .insert("entity_type".into(), entity.entity_type.clone().into());
                results.push(result);
            }
        }

        tracing::debug!(count = results.len(), "entity results");
        Ok(RankedList::new(BackendKind::Entity.name(), results))
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
