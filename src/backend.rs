//! Trait definition and registry for pluggable retrieval backends.
//!
//! Each backend (vector similarity, graph traversal, entity lookup,
//! metadata search) implements [`Backend`] so the orchestrator can drive
//! them uniformly through a [`BackendRegistry`] without branching on names.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::SearchError;
use crate::types::{BackendKind, RankedList};

/// A pluggable retrieval backend.
///
/// Implementors wrap one external store and convert its records into a
/// [`RankedList`]. All implementations must be `Send + Sync` so several
/// backends can be queried concurrently.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Which backend this implementation represents.
    fn kind(&self) -> BackendKind;

    /// Run `query` and return at most `limit` results in rank order.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] if the underlying store fails. The
    /// orchestrator records the error and continues without this backend.
    async fn search(&self, query: &str, limit: usize) -> Result<RankedList, SearchError>;

    /// Cheap availability probe, e.g. "does the graph store have any nodes".
    async fn is_available(&self) -> bool {
        true
    }
}

/// Which backends are currently usable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Availability {
    available: Vec<BackendKind>,
}

impl Availability {
    /// Build from an explicit set; stored in canonical order without duplicates.
    pub fn new(kinds: impl IntoIterator<Item = BackendKind>) -> Self {
        let mut available: Vec<BackendKind> = kinds.into_iter().collect();
        available.sort();
        available.dedup();
        Self { available }
    }

    pub fn is_available(&self, kind: BackendKind) -> bool {
        self.available.contains(&kind)
    }

    /// Whether the knowledge-graph backends can be used.
    pub fn graph_available(&self) -> bool {
        self.is_available(BackendKind::Graph) || self.is_available(BackendKind::Entity)
    }

    /// Available backends in canonical order.
    pub fn kinds(&self) -> &[BackendKind] {
        &self.available
    }
}

/// Backends keyed by kind.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: BTreeMap<BackendKind, Arc<dyn Backend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend. Replaces any backend of the same kind.
    pub fn register(&mut self, backend: Arc<dyn Backend>) {
        self.backends.insert(backend.kind(), backend);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, backend: Arc<dyn Backend>) -> Self {
        self.register(backend);
        self
    }

    pub fn get(&self, kind: BackendKind) -> Option<Arc<dyn Backend>> {
        self.backends.get(&kind).cloned()
    }

    /// Registered kinds in canonical order.
    pub fn kinds(&self) -> Vec<BackendKind> {
        self.backends.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Probe every registered backend and snapshot which ones are usable.
    pub async fn availability(&self) -> Availability {
        let probes = self.backends.iter().map(|(kind, backend)| {
            let backend = Arc::clone(backend);
            let kind = *kind;
            async move { (kind, backend.is_available().await) }
        });
        let outcomes = futures::future::join_all(probes).await;
        Availability::new(
            outcomes
                .into_iter()
                .filter_map(|(kind, available)| available.then_some(kind)),
        )
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SearchResult;

    /// A mock backend for testing trait bounds and registry behaviour.
    struct MockBackend {
        kind: BackendKind,
        keys: Vec<&'static str>,
        available: bool,
    }

    impl MockBackend {
        fn new(kind: BackendKind, keys: Vec<&'static str>) -> Self {
            Self {
                kind,
                keys,
                available: true,
            }
        }

        fn unavailable(kind: BackendKind) -> Self {
            Self {
                kind,
                keys: vec![],
                available: false,
            }
        }
    }

    #[async_trait]
    impl Backend for MockBackend {
        fn kind(&self) -> BackendKind {
            self.kind
        }

        async fn search(&self, _query: &str, limit: usize) -> Result<RankedList, SearchError> {
            if self.keys.is_empty() {
                return Err(SearchError::backend(self.kind.name(), "mock backend failure"));
            }
            let results = self
                .keys
                .iter()
                .take(limit)
                .map(|k| SearchResult::new(*k, Some(0.5)))
                .collect();
            Ok(RankedList::new(self.kind.name(), results))
        }

        async fn is_available(&self) -> bool {
            self.available
        }
    }

    #[test]
    fn mock_backend_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MockBackend>();
        assert_send_sync::<BackendRegistry>();
    }

    #[tokio::test]
    async fn mock_backend_respects_limit() {
        let backend = MockBackend::new(BackendKind::Semantic, vec!["a", "b", "c"]);
        let list = backend.search("q", 2).await.expect("search");
        assert_eq!(list.len(), 2);
        assert_eq!(list.results()[1].rank, 2);
    }

    #[tokio::test]
    async fn mock_backend_propagates_errors() {
        let backend = MockBackend::new(BackendKind::Graph, vec![]);
        let err = backend.search("q", 5).await.unwrap_err();
        assert!(err.to_string().contains("mock backend failure"));
    }

    #[test]
    fn registry_replaces_same_kind() {
        let registry = BackendRegistry::new()
            .with(Arc::new(MockBackend::new(BackendKind::Semantic, vec!["a"])))
            .with(Arc::new(MockBackend::new(BackendKind::Semantic, vec!["b"])));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn registry_kinds_in_canonical_order() {
        let registry = BackendRegistry::new()
            .with(Arc::new(MockBackend::new(BackendKind::Metadata, vec!["a"])))
            .with(Arc::new(MockBackend::new(BackendKind::Semantic, vec!["a"])))
            .with(Arc::new(MockBackend::new(BackendKind::Graph, vec!["a"])));
        assert_eq!(
            registry.kinds(),
            vec![BackendKind::Semantic, BackendKind::Graph, BackendKind::Metadata]
        );
        assert!(registry.get(BackendKind::Entity).is_none());
    }

    #[tokio::test]
    async fn availability_excludes_unavailable_backends() {
        let registry = BackendRegistry::new()
            .with(Arc::new(MockBackend::new(BackendKind::Semantic, vec!["a"])))
            .with(Arc::new(MockBackend::unavailable(BackendKind::Graph)))
            .with(Arc::new(MockBackend::unavailable(BackendKind::Entity)));
        let availability = registry.availability().await;
        assert_eq!(availability.kinds(), &[BackendKind::Semantic]);
        assert!(!availability.graph_available());
    }

    #[test]
    fn availability_dedups_and_sorts() {
        let availability = Availability::new([
            BackendKind::Metadata,
            BackendKind::Semantic,
            BackendKind::Metadata,
        ]);
        assert_eq!(
            availability.kinds(),
            &[BackendKind::Semantic, BackendKind::Metadata]
        );
    }
}
