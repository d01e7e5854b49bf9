//! Metadata backend: keyword and structured-field lookup.
//!
//! Author, venue, and year phrases are lifted out of the query into a
//! [`MetadataFilter`]; the remaining text goes to the keyword index.

use async_trait::async_trait;
use std::sync::Arc;

use crate::backend::Backend;
use crate::error::SearchError;
use crate::patterns::QueryPatterns;
use crate::types::{BackendKind, RankedList, SearchResult};

use super::store::{MetadataFilter, MetadataStore};

/// Adapter over a [`MetadataStore`].
pub struct MetadataBackend {
    store: Arc<dyn MetadataStore>,
    patterns: Arc<QueryPatterns>,
}

impl MetadataBackend {
    pub fn new(store: Arc<dyn MetadataStore>, patterns: Arc<QueryPatterns>) -> Self {
        Self { store, patterns }
    }
}

#[async_trait]
impl Backend for MetadataBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Metadata
    }

    async fn search(&self, query: &str, limit: usize) -> Result<RankedList, SearchError> {
        let (filter, text) = MetadataFilter::from_query(query, &self.patterns);
        tracing::trace!(query, text = %text, ?filter, "metadata search");

        let records = self.store.search(&text, &filter, limit).await?;
        let results: Vec<SearchResult> = records
            .into_iter()
            .take(limit)
            .map(|record| record.into_result(None))
            .collect();

        tracing::debug!(count = results.len(), "metadata results");
        Ok(RankedList::new(BackendKind::Metadata.name(), results))
    }

    async fn is_available(&self) -> bool {
        match self.store.len().await {
            Ok(count) => count > 0,
            Err(err) => {
                tracing::debug!(error = %err, "metadata availability probe failed");
                false
            }
        }
    }
}
