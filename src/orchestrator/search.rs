//! Pipeline driver: classify, expand, select, execute, fuse, assess,
//! escalate once, deduplicate, tag provenance.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use uuid::Uuid;

use crate::backend::BackendRegistry;
use crate::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::config::OrchestratorConfig;
use crate::error::{Result, SearchError};
use crate::patterns::QueryPatterns;
use crate::query::{classify, decompose, expand, IntentClassification};
use crate::refine::{IterativeRefiner, RefinementOutcome, Searcher};
use crate::types::{
    BackendKind, QualityMetrics, SearchMode, SearchResponse, SearchResult, SubQuery,
};

use super::decomposed::merge_sub_query_results;
use super::dedup::{deduplicate, tag_provenance};
use super::escalation::EscalationController;
use super::executor::{ExecutionOutcome, Executor};
use super::fusion::{rrf_fuse, FusedItem};
use super::quality::assess;
use super::selector::{select_backends, weights_for};

/// Mode label reported by [`Orchestrator::search_decomposed`].
pub const DECOMPOSED_MODE: &str = "decomposed";

/// Federated search orchestrator.
///
/// Owns the backend registry, configuration, compiled query patterns, and
/// per-backend circuit breaker. Every call returns a well-formed
/// [`SearchResponse`]; backend failures never surface as `Err`.
pub struct Orchestrator {
    registry: BackendRegistry,
    config: OrchestratorConfig,
    patterns: Arc<QueryPatterns>,
    breaker: Mutex<CircuitBreaker>,
}

impl Orchestrator {
    /// Build an orchestrator over `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if `config` is invalid, or
    /// [`SearchError::Pattern`] if the query patterns fail to compile.
    pub fn new(registry: BackendRegistry, config: OrchestratorConfig) -> Result<Self> {
        config.validate()?;
        let patterns = QueryPatterns::shared()?;
        let breaker = Mutex::new(CircuitBreaker::new(config.circuit_breaker.clone()));
        Ok(Self {
            registry,
            config,
            patterns,
            breaker,
        })
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// `(backend, circuit state, consecutive failures)` for every backend
    /// that has been called.
    pub fn health_report(&self) -> Vec<(BackendKind, CircuitState, u32)> {
        self.breaker
            .lock()
            .map(|breaker| breaker.health_report())
            .unwrap_or_default()
    }

    /// Run the full pipeline for `query`.
    pub async fn search(&self, query: &str, limit: usize, mode: SearchMode) -> SearchResponse {
        let started = Instant::now();
        let request_id = Uuid::new_v4();
        let classification = classify(query, &self.patterns);

        if let Err(err) = check_request(query, limit) {
            tracing::warn!(%request_id, error = %err, "rejected search request");
            return failed_response(query, mode.name(), &classification, err, request_id, started);
        }

        tracing::trace!(%request_id, query, "search started");

        let expansion = self
            .config
            .enable_expansion
            .then(|| expand(query, None, &self.patterns, &self.config.expansion))
            .filter(|e| e.was_expanded);
        let effective_query = expansion
            .as_ref()
            .map_or(query, |e| e.expanded_query.as_str());

        let availability = self.registry.availability().await;
        let selection = select_backends(classification.intent, &availability, mode);
        let executor = Executor::new(&self.registry, &self.breaker, &self.config);

        let mut outcome = executor
            .execute(&selection.backends, effective_query, limit)
            .await;
        let mut results = self.fuse(&outcome, limit);
        let mut quality = assess(&results);

        let mut controller = EscalationController::new(self.config.enable_escalation);
        if controller.should_escalate(&quality, mode, outcome.backends().len()) {
            let additional =
                EscalationController::additional_backends(&availability, &outcome.backends());
            if additional.is_empty() {
                tracing::debug!(%request_id, "escalation wanted but no other backend is available");
            } else {
                tracing::debug!(
                    %request_id,
                    additional = ?additional,
                    confidence = ?quality.confidence,
                    "escalating search"
                );
                let round = executor
                    .execute_with(
                        &additional,
                        effective_query,
                        limit,
                        EscalationController::strategy(&additional),
                    )
                    .await;
                outcome.merge(round);
                results = self.fuse(&outcome, limit);
                quality = assess(&results);
                controller.mark_escalated();
            }
        }

        let mut results = deduplicate(results);
        tag_provenance(&mut results, &outcome.results_by_backend);

        let backends_used = outcome.backends();
        let weights = weights_for(classification.intent, &backends_used);
        let error = outcome.all_failed().then(|| {
            SearchError::AllBackendsFailed(outcome.error_summary()).to_string()
        });
        if error.is_some() {
            results.clear();
            quality = QualityMetrics::empty();
        }

        let elapsed_ms = elapsed_ms(started);
        tracing::info!(
            %request_id,
            intent = %classification.intent,
            backends = ?backends_used,
            escalated = controller.escalated(),
            count = results.len(),
            failed = outcome.errors_by_backend.len(),
            elapsed_ms,
            "search complete"
        );

        SearchResponse {
            query: query.to_string(),
            total_found: results.len(),
            results,
            quality_metrics: quality,
            errors_by_backend: outcome.errors_by_backend,
            error,
            mode: controller.mode_label(mode),
            intent: classification.intent,
            intent_confidence: classification.confidence,
            backends_used,
            weights,
            escalated: controller.escalated(),
            expansion,
            sub_queries: None,
            elapsed_ms,
            request_id,
        }
    }

    /// Decompose `query`, run every sub-query through [`search`](Self::search)
    /// with a widened limit, and merge by importance-weighted rank.
    ///
    /// Sub-queries run one after another, so no more than `max_workers`
    /// backend calls are ever in flight.
    pub async fn search_decomposed(&self, query: &str, limit: usize) -> SearchResponse {
        let started = Instant::now();
        let request_id = Uuid::new_v4();
        let classification = classify(query, &self.patterns);

        if let Err(err) = check_request(query, limit) {
            tracing::warn!(%request_id, error = %err, "rejected decomposed search request");
            return failed_response(query, DECOMPOSED_MODE, &classification, err, request_id, started);
        }

        let sub_queries = decompose(query, &self.patterns);
        let sub_limit = limit.saturating_mul(self.config.decomposition_limit_multiplier);
        tracing::debug!(%request_id, count = sub_queries.len(), sub_limit, "query decomposed");

        let responses: Vec<SearchResponse> = stream::iter(&sub_queries)
            .then(|sub| self.search(&sub.text, sub_limit, SearchMode::Auto))
            .collect()
            .await;

        let mut errors_by_backend: BTreeMap<BackendKind, String> = BTreeMap::new();
        let mut backends_used: Vec<BackendKind> = Vec::new();
        let mut escalated = false;
        let mut failures: Vec<String> = Vec::new();
        let mut per_sub_query: Vec<(SubQuery, Vec<SearchResult>)> = Vec::new();

        for (sub, response) in sub_queries.iter().zip(responses) {
            escalated |= response.escalated;
            backends_used.extend(response.backends_used.iter().copied());
            for (kind, message) in response.errors_by_backend {
                errors_by_backend.entry(kind).or_insert(message);
            }
            if let Some(error) = response.error {
                failures.push(format!("{}: {error}", sub.text));
            }
            per_sub_query.push((sub.clone(), response.results));
        }
        backends_used.sort();
        backends_used.dedup();

        let mut results = deduplicate(merge_sub_query_results(&per_sub_query, limit));
        let error = (failures.len() == sub_queries.len()).then(|| {
            results.clear();
            SearchError::AllBackendsFailed(failures.join("; ")).to_string()
        });
        let quality = assess(&results);

        let elapsed_ms = elapsed_ms(started);
        tracing::info!(
            %request_id,
            sub_queries = sub_queries.len(),
            count = results.len(),
            elapsed_ms,
            "decomposed search complete"
        );

        SearchResponse {
            query: query.to_string(),
            total_found: results.len(),
            results,
            quality_metrics: quality,
            errors_by_backend,
            error,
            mode: DECOMPOSED_MODE.to_string(),
            intent: classification.intent,
            intent_confidence: classification.confidence,
            weights: weights_for(classification.intent, &backends_used),
            backends_used,
            escalated,
            expansion: None,
            sub_queries: Some(sub_queries),
            elapsed_ms,
            request_id,
        }
    }

    /// Run the iterative refiner with this orchestrator as its searcher.
    ///
    /// # Errors
    ///
    /// Returns the initial search's error if no backend produced results.
    pub async fn search_refined(&self, query: &str, limit: usize) -> Result<RefinementOutcome> {
        let refiner =
            IterativeRefiner::new(self.config.refiner.clone(), Arc::clone(&self.patterns));
        refiner.refine(self, query, limit).await
    }

    /// Fuse every backend list and build at most `limit` results.
    ///
    /// The representative for each key is its first occurrence in canonical
    /// backend order. `combined_score` carries the RRF score.
    fn fuse(&self, outcome: &ExecutionOutcome, limit: usize) -> Vec<SearchResult> {
        let fused = rrf_fuse(outcome.results_by_backend.values(), self.config.rrf_k);

        let mut representatives: HashMap<&str, &SearchResult> = HashMap::new();
        for list in outcome.results_by_backend.values() {
            for result in list.results() {
                representatives
                    .entry(result.item_key.as_str())
                    .or_insert(result);
            }
        }

        fused
            .into_iter()
            .filter_map(|FusedItem { item_key, rrf_score }| {
                representatives.get(item_key.as_str()).map(|r| {
                    let mut result = (*r).clone();
                    result.combined_score = Some(rrf_score);
                    result
                })
            })
            .take(limit)
            .enumerate()
            .map(|(position, mut result)| {
                result.rank = position + 1;
                result
            })
            .collect()
    }
}

#[async_trait]
impl Searcher for Orchestrator {
    async fn retrieve(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let response = self.search(query, limit, SearchMode::Auto).await;
        match response.error {
            Some(error) if response.results.is_empty() => Err(SearchError::AllBackendsFailed(error)),
            _ => Ok(response.results),
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn check_request(query: &str, limit: usize) -> Result<()> {
    if limit == 0 {
        return Err(SearchError::Config("limit must be greater than 0".into()));
    }
    if query.trim().is_empty() {
        return Err(SearchError::Config("query must not be empty".into()));
    }
    Ok(())
}

fn failed_response(
    query: &str,
    mode: &str,
    classification: &IntentClassification,
    err: SearchError,
    request_id: Uuid,
    started: Instant,
) -> SearchResponse {
    SearchResponse {
        query: query.to_string(),
        results: Vec::new(),
        total_found: 0,
        quality_metrics: QualityMetrics::empty(),
        errors_by_backend: BTreeMap::new(),
        error: Some(err.to_string()),
        mode: mode.to_string(),
        intent: classification.intent,
        intent_confidence: classification.confidence,
        backends_used: Vec::new(),
        weights: BTreeMap::new(),
        escalated: false,
        expansion: None,
        sub_queries: None,
        elapsed_ms: elapsed_ms(started),
        request_id,
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Backend;
    use crate::types::{Intent, RankedList};

    struct FixedBackend {
        kind: BackendKind,
        results: Vec<(&'static str, Option<f64>)>,
        fail: bool,
    }

    #[async_trait]
    impl Backend for FixedBackend {
        fn kind(&self) -> BackendKind {
            self.kind
        }

        async fn search(
            &self,
            _query: &str,
            limit: usize,
        ) -> std::result::Result<RankedList, SearchError> {
            if self.fail {
                return Err(SearchError::backend(self.kind.name(), "unreachable"));
            }
            Ok(RankedList::new(
                self.kind.name(),
                self.results
                    .iter()
                    .take(limit)
                    .map(|(k, s)| SearchResult::new(*k, *s).with_meta("title", format!("Paper {k}")))
                    .collect(),
            ))
        }
    }

    fn backend(
        kind: BackendKind,
        results: &[(&'static str, Option<f64>)],
    ) -> Arc<dyn Backend> {
        Arc::new(FixedBackend {
            kind,
            results: results.to_vec(),
            fail: false,
        })
    }

    fn failing(kind: BackendKind) -> Arc<dyn Backend> {
        Arc::new(FixedBackend {
            kind,
            results: Vec::new(),
            fail: true,
        })
    }

    fn orchestrator(registry: BackendRegistry) -> Orchestrator {
        Orchestrator::new(registry, OrchestratorConfig::default()).expect("orchestrator")
    }

    fn strong(prefix: &'static [&'static str]) -> Vec<(&'static str, Option<f64>)> {
        prefix.iter().map(|k| (*k, Some(0.9))).collect()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = OrchestratorConfig {
            max_workers: 0,
            ..OrchestratorConfig::default()
        };
        assert!(Orchestrator::new(BackendRegistry::new(), config).is_err());
    }

    #[tokio::test]
    async fn zero_limit_is_reported_in_response() {
        let orch = orchestrator(BackendRegistry::new());
        let response = orch.search("graph kernels", 0, SearchMode::Auto).await;
        assert!(response.results.is_empty());
        assert_eq!(response.total_found, 0);
        assert!(response.error.as_deref().unwrap_or_default().contains("limit"));
    }

    #[tokio::test]
    async fn blank_query_is_reported_in_response() {
        let orch = orchestrator(BackendRegistry::new());
        let response = orch.search("   ", 5, SearchMode::Auto).await;
        assert!(response.error.is_some());
    }

    #[tokio::test]
    async fn semantic_only_search_keeps_native_scores_and_sets_combined() {
        let keys: &'static [&'static str] =
            &["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"];
        let registry = BackendRegistry::new().with(backend(BackendKind::Semantic, &strong(keys)));
        let orch = orchestrator(registry);

        let response = orch.search("protein folding", 10, SearchMode::Auto).await;
        assert_eq!(response.intent, Intent::Semantic);
        assert_eq!(response.backends_used, vec![BackendKind::Semantic]);
        assert_eq!(response.total_found, 10);
        assert!(!response.escalated);
        assert_eq!(response.mode, "auto");
        assert!(response.error.is_none());

        let first = &response.results[0];
        assert_eq!(first.item_key, "a");
        assert_eq!(first.score, Some(0.9));
        assert_eq!(first.found_in, vec!["semantic"]);
        assert!((first.combined_score.unwrap_or_default() - 1.0 / 61.0).abs() < 1e-12);
        let ranks: Vec<usize> = response.results.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, (1..=10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn partial_failure_is_recorded_without_error() {
        let registry = BackendRegistry::new()
            .with(backend(BackendKind::Semantic, &[("a", Some(0.8))]))
            .with(failing(BackendKind::Metadata));
        let orch = orchestrator(registry);

        let response = orch
            .search("papers by Yoshua Bengio", 5, SearchMode::Auto)
            .await;
        assert_eq!(response.intent, Intent::Metadata);
        assert_eq!(response.total_found, 1);
        assert!(response.error.is_none());
        assert!(response.errors_by_backend[&BackendKind::Metadata].contains("unreachable"));
    }

    #[tokio::test]
    async fn all_backends_failing_yields_error_response() {
        let registry = BackendRegistry::new()
            .with(failing(BackendKind::Semantic))
            .with(failing(BackendKind::Graph));
        let orch = orchestrator(registry);

        let response = orch.search("anything at all", 5, SearchMode::Auto).await;
        assert!(response.results.is_empty());
        assert_eq!(response.total_found, 0);
        assert!(response.error.is_some());
        assert_eq!(response.errors_by_backend.len(), 2);
    }

    #[tokio::test]
    async fn expansion_is_recorded_when_applied() {
        let registry = BackendRegistry::new().with(backend(BackendKind::Semantic, &[("a", None)]));
        let orch = orchestrator(registry);
        let response = orch.search("transformers", 5, SearchMode::Fast).await;
        let expansion = response.expansion.expect("expansion");
        assert!(expansion.was_expanded);
        assert!(expansion.expanded_query.starts_with("transformers "));
    }

    #[tokio::test]
    async fn expansion_can_be_disabled() {
        let registry = BackendRegistry::new().with(backend(BackendKind::Semantic, &[("a", None)]));
        let config = OrchestratorConfig {
            enable_expansion: false,
            ..OrchestratorConfig::default()
        };
        let orch = Orchestrator::new(registry, config).expect("orchestrator");
        let response = orch.search("transformers", 5, SearchMode::Fast).await;
        assert!(response.expansion.is_none());
    }

    #[tokio::test]
    async fn decomposed_search_reports_sub_queries() {
        let registry = BackendRegistry::new().with(backend(
            BackendKind::Semantic,
            &[("a", None), ("b", None)],
        ));
        let orch = orchestrator(registry);
        let response = orch
            .search_decomposed("machine learning AND healthcare", 5)
            .await;
        let subs = response.sub_queries.expect("sub-queries");
        assert_eq!(subs.len(), 2);
        assert_eq!(response.mode, DECOMPOSED_MODE);
        // Both sub-queries return a and b, so each accumulates twice.
        assert_eq!(response.total_found, 2);
        assert_eq!(response.results[0].item_key, "a");
        assert!((response.results[0].combined_score.unwrap_or_default() - 2.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn decomposed_search_with_no_backends_fails_cleanly() {
        let orch = orchestrator(BackendRegistry::new());
        let response = orch.search_decomposed("cats OR dogs", 5).await;
        assert!(response.results.is_empty());
        assert!(response.error.is_some());
    }

    #[test]
    fn accessors_expose_construction_inputs() {
        let registry = BackendRegistry::new()
            .with(backend(BackendKind::Metadata, &[]))
            .with(backend(BackendKind::Semantic, &[]));
        let config = OrchestratorConfig {
            max_workers: 2,
            ..OrchestratorConfig::default()
        };
        let orch = Orchestrator::new(registry, config).expect("orchestrator");
        assert_eq!(orch.config().max_workers, 2);
        assert_eq!(
            orch.registry().kinds(),
            vec![BackendKind::Semantic, BackendKind::Metadata]
        );
    }

    #[tokio::test]
    async fn health_report_tracks_called_backends() {
        let registry = BackendRegistry::new().with(failing(BackendKind::Semantic));
        let orch = orchestrator(registry);
        orch.search("query", 5, SearchMode::Fast).await;
        let report = orch.health_report();
        assert_eq!(report, vec![(BackendKind::Semantic, CircuitState::Closed, 1)]);
    }
}
