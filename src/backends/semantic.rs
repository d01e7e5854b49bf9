//! Semantic backend: dense/sparse vector similarity.
//!
//! Embeds the query with an external model, then asks the vector index for
//! its nearest neighbours. Similarity is kept as the native score.

use async_trait::async_trait;
use std::sync::Arc;

use crate::backend::Backend;
use crate::error::SearchError;
use crate::types::{BackendKind, RankedList, SearchResult};

use super::store::{Embedder, MetadataFilter, VectorHit, VectorStore};

/// Vector-similarity adapter over an [`Embedder`] and a [`VectorStore`].
pub struct SemanticBackend {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    filter: Option<MetadataFilter>,
}

impl SemanticBackend {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            embedder,
            store,
            filter: None,
        }
    }

    /// Restrict every search to records matching `filter`.
    pub fn with_filter(mut self, filter: MetadataFilter) -> Self {
        self.filter = (!filter.is_empty()).then_some(filter);
        self
    }

    fn hit_to_result(hit: VectorHit) -> SearchResult {
        let matched_text = hit
            .payload
            .get("title")
            .or_else(|| hit.payload.get("text"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        SearchResult {
            item_key: hit.id,
            rank: 1,
            score: Some(hit.similarity),
            matched_text,
            metadata: hit.payload,
            found_in: Vec::new(),
            combined_score: None,
        }
    }
}

#[async_trait]
impl Backend for SemanticBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Semantic
    }

    async fn search(&self, query: &str, limit: usize) -> Result<RankedList, SearchError> {
        tracing::trace!(query, "semantic search");

        let embedding = self.embedder.embed(query).await?;
        if embedding.is_empty() {
            return Err(SearchError::backend(
                BackendKind::Semantic.name(),
                "embedder returned an empty vector",
            ));
        }

        let hits = self
            .store
            .nearest(&embedding, limit, self.filter.as_ref())
            .await?;

        let results: Vec<SearchResult> = hits
            .into_iter()
            .take(limit)
            .map(Self::hit_to_result)
            .collect();

        tracing::debug!(count = results.len(), "semantic results");
        Ok(RankedList::new(BackendKind::Semantic.name(), results))
    }

    async fn is_available(&self) -> bool {
        match self.store.len().await {
            Ok(count) => count > 0,
            Err(err) => {
                tracing::debug!(error = %err, "vector store availability probe failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Metadata;
    use std::sync::Mutex;

    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, SearchError> {
            Ok(self.0.clone())
        }
    }

    struct FakeIndex {
        hits: Vec<VectorHit>,
        seen_filter: Mutex<Option<MetadataFilter>>,
    }

    impl FakeIndex {
        fn new(hits: Vec<VectorHit>) -> Self {
            Self {
                hits,
                seen_filter: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl VectorStore for FakeIndex {
        async fn nearest(
            &self,
            _embedding: &[f32],
            limit: usize,
            filter: Option<&MetadataFilter>,
        ) -> Result<Vec<VectorHit>, SearchError> {
            if let Ok(mut seen) = self.seen_filter.lock() {
                *seen = filter.cloned();
            }
            Ok(self.hits.iter().take(limit).cloned().collect())
        }

        async fn len(&self) -> Result<usize, SearchError> {
            Ok(self.hits.len())
        }
    }

    fn hit(id: &str, similarity: f64, title: &str) -> VectorHit {
        let mut payload = Metadata::new();
        payload.insert("title".into(), title.into());
        VectorHit {
            id: id.into(),
            similarity,
            payload,
        }
    }

    #[tokio::test]
    async fn converts_hits_to_ranked_results() {
        let index = Arc::new(FakeIndex::new(vec![
            hit("p1", 0.92, "Deep Residual Learning"),
            hit("p2", 0.81, "Batch Normalization"),
        ]));
        let backend = SemanticBackend::new(Arc::new(FixedEmbedder(vec![0.1, 0.2])), index);

        let list = backend.search("resnets", 10).await.expect("search");
        assert_eq!(list.source, "semantic");
        assert_eq!(list.len(), 2);
        let first = &list.results()[0];
        assert_eq!(first.item_key, "p1");
        assert_eq!(first.rank, 1);
        assert_eq!(first.score, Some(0.92));
        assert_eq!(first.matched_text, "Deep Residual Learning");
        assert_eq!(list.results()[1].rank, 2);
    }

    #[tokio::test]
    async fn empty_embedding_is_an_error() {
        let backend = SemanticBackend::new(
            Arc::new(FixedEmbedder(vec![])),
            Arc::new(FakeIndex::new(vec![])),
        );
        let err = backend.search("anything", 5).await.unwrap_err();
        assert!(err.to_string().contains("empty vector"));
    }

    #[tokio::test]
    async fn filter_is_forwarded_to_store() {
        let index = Arc::new(FakeIndex::new(vec![hit("p1", 0.5, "T")]));
        let backend = SemanticBackend::new(Arc::new(FixedEmbedder(vec![1.0])), index.clone())
            .with_filter(MetadataFilter {
                year: Some(2020),
                ..Default::default()
            });
        backend.search("q", 1).await.expect("search");
        let seen = index.seen_filter.lock().expect("lock").clone();
        assert_eq!(seen.and_then(|f| f.year), Some(2020));
    }

    #[tokio::test]
    async fn availability_follows_index_size() {
        let empty = SemanticBackend::new(
            Arc::new(FixedEmbedder(vec![1.0])),
            Arc::new(FakeIndex::new(vec![])),
        );
        assert!(!empty.is_available().await);

        let populated = SemanticBackend::new(
            Arc::new(FixedEmbedder(vec![1.0])),
            Arc::new(FakeIndex::new(vec![hit("p1", 0.5, "T")])),
        );
        assert!(populated.is_available().await);
    }
}
