//! # fae-retrieval
//!
//! Federated search orchestration over heterogeneous retrieval backends.
//!
//! Given a natural-language query, the orchestrator classifies its intent,
//! picks a subset of backends (vector similarity, knowledge-graph traversal,
//! graph entity lookup, metadata lookup), runs them, and merges their
//! independently ranked lists into one consensus ranking with Reciprocal
//! Rank Fusion.
//!
//! ## Design
//!
//! - Backends are trait objects in a [`BackendRegistry`]; nothing branches on
//!   backend names
//! - Two backends or fewer run concurrently on a bounded pool; larger sets
//!   run one at a time
//! - Every backend call has its own timeout and circuit breaker
//! - Fusion is ordinal (RRF, `k = 60`) with a deterministic `item_key`
//!   tie-break
//! - A poor result set widens the backend set once, never more
//! - Graceful degradation: failed backends are recorded per backend and the
//!   caller always gets a well-formed [`SearchResponse`]
//!
//! ## Security
//!
//! - Query text is logged only at trace level
//! - The crate opens no connections of its own; stores are supplied by the
//!   caller through the traits in [`backends::store`]

pub mod backend;
pub mod backends;
pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod patterns;
pub mod query;
pub mod refine;
pub mod types;

pub use backend::{Availability, Backend, BackendRegistry};
pub use config::OrchestratorConfig;
pub use error::{Result, SearchError};
pub use orchestrator::Orchestrator;
pub use refine::{IterativeRefiner, RefinementOutcome, Searcher};
pub use types::{
    BackendKind, Confidence, Intent, QualityMetrics, RankedList, SearchMode, SearchResponse,
    SearchResult, SubQuery, SubQueryKind,
};

/// Run one federated search over `registry`.
///
/// Builds a short-lived [`Orchestrator`] and runs its full pipeline. Keep
/// an [`Orchestrator`] around instead when circuit-breaker state should
/// persist across queries.
///
/// # Errors
///
/// Returns [`SearchError::Config`] if `config` is invalid. Backend failures
/// are reported inside the returned [`SearchResponse`].
///
/// # Examples
///
/// ```no_run
/// # async fn example(registry: fae_retrieval::BackendRegistry) -> fae_retrieval::Result<()> {
/// let config = fae_retrieval::OrchestratorConfig::default();
/// let response = fae_retrieval::search(registry, "graph kernels", 10, config).await?;
/// for result in &response.results {
///     println!("{} ({:?})", result.item_key, result.found_in);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn search(
    registry: BackendRegistry,
    query: &str,
    limit: usize,
    config: OrchestratorConfig,
) -> Result<SearchResponse> {
    let orchestrator = Orchestrator::new(registry, config)?;
    Ok(orchestrator.search(query, limit, SearchMode::Auto).await)
}
