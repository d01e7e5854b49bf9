//! Backend execution: sequential or bounded-parallel fan-out.
//!
//! Every call is wrapped individually. A failure, timeout, or open circuit
//! is logged, recorded in [`ExecutionOutcome::errors_by_backend`], and the
//! backend contributes an empty list. Results are written into the
//! outcome maps only after every call of the phase has resolved, so
//! completion order never affects the output.

use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::backend::BackendRegistry;
use crate::circuit_breaker::CircuitBreaker;
use crate::config::OrchestratorConfig;
use crate::error::SearchError;
use crate::types::{BackendKind, RankedList};

/// How a phase drives its backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// One backend at a time.
    Sequential,
    /// Concurrently, at most `max_workers` in flight.
    Parallel,
}

impl Strategy {
    /// Sequential when `count >= threshold`, parallel otherwise.
    pub fn for_count(count: usize, threshold: usize) -> Self {
        if count >= threshold {
            Self::Sequential
        } else {
            Self::Parallel
        }
    }
}

/// Per-backend results and failures from one or more phases.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOutcome {
    pub results_by_backend: BTreeMap<BackendKind, RankedList>,
    pub errors_by_backend: BTreeMap<BackendKind, String>,
}

impl ExecutionOutcome {
    /// Fold a later phase into this one. Later entries replace earlier
    /// ones for the same backend.
    pub fn merge(&mut self, other: ExecutionOutcome) {
        for (kind, list) in other.results_by_backend {
            self.errors_by_backend.remove(&kind);
            self.results_by_backend.insert(kind, list);
        }
        for (kind, message) in other.errors_by_backend {
            self.errors_by_backend.insert(kind, message);
        }
    }

    /// Backends that were executed, successfully or not, in canonical order.
    pub fn backends(&self) -> Vec<BackendKind> {
        self.results_by_backend.keys().copied().collect()
    }

    /// Whether every executed backend failed.
    pub fn all_failed(&self) -> bool {
        !self.results_by_backend.is_empty()
            && self
                .results_by_backend
                .keys()
                .all(|kind| self.errors_by_backend.contains_key(kind))
    }

    /// `"backend: message"` pairs joined for a top-level error.
    pub fn error_summary(&self) -> String {
        self.errors_by_backend
            .iter()
            .map(|(kind, message)| format!("{kind}: {message}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Drives registered backends with a per-call timeout and circuit breaker.
pub struct Executor<'a> {
    registry: &'a BackendRegistry,
    breaker: &'a Mutex<CircuitBreaker>,
    config: &'a OrchestratorConfig,
}

impl<'a> Executor<'a> {
    pub fn new(
        registry: &'a BackendRegistry,
        breaker: &'a Mutex<CircuitBreaker>,
        config: &'a OrchestratorConfig,
    ) -> Self {
        Self {
            registry,
            breaker,
            config,
        }
    }

    /// Run `backends` for `query`, choosing the strategy from the configured
    /// sequential threshold.
    pub async fn execute(
        &self,
        backends: &[BackendKind],
        query: &str,
        limit: usize,
    ) -> ExecutionOutcome {
        let strategy = Strategy::for_count(backends.len(), self.config.sequential_threshold);
        self.execute_with(backends, query, limit, strategy).await
    }

    /// Run `backends` for `query` with an explicit strategy.
    pub async fn execute_with(
        &self,
        backends: &[BackendKind],
        query: &str,
        limit: usize,
        strategy: Strategy,
    ) -> ExecutionOutcome {
        tracing::debug!(backends = ?backends, ?strategy, limit, "executing backends");

        let outcomes: Vec<(BackendKind, Result<RankedList, SearchError>)> = match strategy {
            Strategy::Sequential => {
                let mut outcomes = Vec::with_capacity(backends.len());
                for kind in backends {
                    outcomes.push(self.call(*kind, query, limit).await);
                }
                outcomes
            }
            Strategy::Parallel => {
                stream::iter(backends.iter().copied())
                    .map(|kind| self.call(kind, query, limit))
                    .buffer_unordered(self.config.max_workers.max(1))
                    .collect::<Vec<_>>()
                    .await
            }
        };

        let mut outcome = ExecutionOutcome::default();
        for (kind, result) in outcomes {
            match result {
                Ok(list) => {
                    tracing::debug!(backend = %kind, count = list.len(), "backend returned results");
                    outcome.results_by_backend.insert(kind, list);
                }
                Err(err) => {
                    tracing::warn!(backend = %kind, error = %err, "backend query failed");
                    outcome
                        .results_by_backend
                        .insert(kind, RankedList::empty(kind.name()));
                    outcome.errors_by_backend.insert(kind, err.to_string());
                }
            }
        }
        outcome
    }

    async fn call(
        &self,
        kind: BackendKind,
        query: &str,
        limit: usize,
    ) -> (BackendKind, Result<RankedList, SearchError>) {
        let Some(backend) = self.registry.get(kind) else {
            return (
                kind,
                Err(SearchError::backend(kind.name(), "backend not registered")),
            );
        };

        let allowed = self
            .breaker
            .lock()
            .map(|mut breaker| breaker.should_attempt(kind))
            .unwrap_or(true);
        if !allowed {
            return (kind, Err(SearchError::CircuitOpen(kind.name().to_string())));
        }

        let timeout_ms = self.config.backend_timeout_ms;
        let result =
            match tokio::time::timeout(Duration::from_millis(timeout_ms), backend.search(query, limit))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(SearchError::Timeout {
                    backend: kind.name().to_string(),
                    timeout_ms,
                }),
            };

        if let Ok(mut breaker) = self.breaker.lock() {
            match &result {
                Ok(_) => breaker.record_success(kind),
                Err(_) => breaker.record_failure(kind),
            }
        }

        let result = result.map(|list| {
            let mut results = list.into_results();
            results.truncate(limit);
            RankedList::new(kind.name(), results)
        });
        (kind, result)
    }
}
