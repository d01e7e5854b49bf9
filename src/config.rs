//! Orchestrator configuration with sensible defaults.
//!
//! [`OrchestratorConfig`] controls fusion, concurrency, timeouts, expansion,
//! escalation, and iterative refinement. Every field has a default so a
//! partial TOML document is enough to override a single knob.

use serde::{Deserialize, Serialize};

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::error::SearchError;

/// Default RRF smoothing constant.
pub const DEFAULT_RRF_K: f64 = 60.0;

/// Configuration for a federated retrieval orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// RRF constant `k`.
    pub rrf_k: f64,
    /// Maximum backends in flight during a parallel phase.
    pub max_workers: usize,
    /// Backend count at or above which a phase runs sequentially.
    pub sequential_threshold: usize,
    /// Per-backend call timeout in milliseconds.
    pub backend_timeout_ms: u64,
    /// Sub-query limit multiplier for decomposed searches.
    pub decomposition_limit_multiplier: usize,
    /// Whether a low-quality result set may trigger one escalation round.
    pub enable_escalation: bool,
    /// Whether short queries are expanded with domain terms.
    pub enable_expansion: bool,
    pub expansion: ExpansionConfig,
    pub refiner: RefinerConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            rrf_k: DEFAULT_RRF_K,
            max_workers: 4,
            sequential_threshold: 3,
            backend_timeout_ms: 10_000,
            decomposition_limit_multiplier: 2,
            enable_escalation: true,
            enable_expansion: true,
            expansion: ExpansionConfig::default(),
            refiner: RefinerConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// Query expansion gating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionConfig {
    /// Queries with more words than this are never expanded.
    pub max_words: usize,
    /// Related terms appended per matched concept.
    pub max_terms_per_concept: usize,
    /// Prior coverage below this counts as a poor result set.
    pub low_coverage_threshold: f64,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            max_words: 4,
            max_terms_per_concept: 2,
            low_coverage_threshold: 0.3,
        }
    }
}

/// Iterative refinement loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinerConfig {
    /// Maximum reformulated queries executed.
    pub max_iterations: usize,
    /// Maximum reformulations generated.
    pub max_reformulations: usize,
    /// Maximum key concepts extracted from top results.
    pub max_concepts: usize,
    /// Number of top results mined for concepts.
    pub concept_source_results: usize,
    /// Minimum occurrences for a term to count as a concept.
    pub min_concept_frequency: usize,
    /// Coverage below which refinement is attempted.
    pub min_coverage: f64,
    /// Coverage that, with high confidence, stops the loop early.
    pub stop_coverage: f64,
}

impl Default for RefinerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 2,
            max_reformulations: 3,
            max_concepts: 10,
            concept_source_results: 3,
            min_concept_frequency: 2,
            min_coverage: 0.4,
            stop_coverage: 0.6,
        }
    }
}

impl OrchestratorConfig {
    /// Parse a configuration from TOML. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if the document is malformed or the
    /// resulting configuration fails [`validate`](Self::validate).
    pub fn from_toml_str(raw: &str) -> Result<Self, SearchError> {
        let config: Self = toml::from_str(raw)
            .map_err(|e| SearchError::Config(format!("invalid orchestrator config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize this configuration to TOML.
    pub fn to_toml_string(&self) -> Result<String, SearchError> {
        toml::to_string_pretty(self)
            .map_err(|e| SearchError::Config(format!("failed to serialize config: {e}")))
    }

    /// Validates this configuration, returning an error if any field is invalid.
    pub fn validate(&self) -> Result<(), SearchError> {
        if !self.rrf_k.is_finite() || self.rrf_k < 0.0 {
            return Err(SearchError::Config(
                "rrf_k must be a finite, non-negative number".into(),
            ));
        }
        if self.max_workers == 0 {
            return Err(SearchError::Config(
                "max_workers must be greater than 0".into(),
            ));
        }
        if self.sequential_threshold == 0 {
            return Err(SearchError::Config(
                "sequential_threshold must be greater than 0".into(),
            ));
        }
        if self.backend_timeout_ms == 0 {
            return Err(SearchError::Config(
                "backend_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.decomposition_limit_multiplier == 0 {
            return Err(SearchError::Config(
                "decomposition_limit_multiplier must be greater than 0".into(),
            ));
        }
        if self.expansion.max_words == 0 {
            return Err(SearchError::Config(
                "expansion.max_words must be greater than 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.refiner.min_coverage)
            || !(0.0..=1.0).contains(&self.refiner.stop_coverage)
        {
            return Err(SearchError::Config(
                "refiner coverage thresholds must be within [0, 1]".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sensible_values() {
        let config = OrchestratorConfig::default();
        assert!((config.rrf_k - 60.0).abs() < f64::EPSILON);
        assert_eq!(config.max_workers, 4);
        assert_eq!(config.sequential_threshold, 3);
        assert_eq!(config.decomposition_limit_multiplier, 2);
        assert!(config.enable_escalation);
        assert_eq!(config.expansion.max_words, 4);
        assert_eq!(config.expansion.max_terms_per_concept, 2);
        assert_eq!(config.refiner.max_iterations, 2);
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(OrchestratorConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_workers_rejected() {
        let config = OrchestratorConfig {
            max_workers: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_workers"));
    }

    #[test]
    fn zero_timeout_rejected() {
        let config = OrchestratorConfig {
            backend_timeout_ms: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("backend_timeout_ms"));
    }

    #[test]
    fn non_finite_rrf_k_rejected() {
        let config = OrchestratorConfig {
            rrf_k: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn out_of_range_refiner_coverage_rejected() {
        let mut config = OrchestratorConfig::default();
        config.refiner.stop_coverage = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("coverage"));
    }

    #[test]
    fn partial_toml_overrides_single_field() {
        let config = OrchestratorConfig::from_toml_str(
            r#"
            max_workers = 2

            [refiner]
            max_iterations = 5
            "#,
        )
        .expect("parse");
        assert_eq!(config.max_workers, 2);
        assert_eq!(config.refiner.max_iterations, 5);
        assert_eq!(config.refiner.max_concepts, 10);
        assert_eq!(config.sequential_threshold, 3);
    }

    #[test]
    fn invalid_toml_value_rejected() {
        let err = OrchestratorConfig::from_toml_str("max_workers = 0").unwrap_err();
        assert!(err.to_string().contains("max_workers"));
    }

    #[test]
    fn malformed_toml_rejected() {
        let err = OrchestratorConfig::from_toml_str("max_workers = [").unwrap_err();
        assert!(err.to_string().contains("invalid orchestrator config"));
    }

    #[test]
    fn toml_round_trip_preserves_values() {
        let config = OrchestratorConfig {
            backend_timeout_ms: 750,
            enable_escalation: false,
            ..Default::default()
        };
        let raw = config.to_toml_string().expect("serialize");
        let parsed = OrchestratorConfig::from_toml_str(&raw).expect("parse");
        assert_eq!(parsed, config);
    }
}
