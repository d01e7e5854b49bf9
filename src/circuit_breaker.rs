//! Per-backend circuit breaker.
//!
//! Tracks consecutive failures per backend and temporarily skips backends
//! that keep failing. After a cooldown a tripped backend becomes half-open
//! and a single call decides whether it is restored or tripped again.
//!
//! # State Machine
//!
//! ```text
//! ┌────────┐  N failures   ┌────────┐  cooldown   ┌──────────┐
//! │ Closed ├──────────────►│  Open  ├────────────►│ HalfOpen │
//! └───▲────┘               └────────┘             └────┬─────┘
//!     │                         ▲                      │
//!     │  success                │  failure             │
//!     └─────────────────────────┴──────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::types::BackendKind;

/// Circuit breaker state for a single backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Backend is healthy.
    Closed,
    /// Backend failed too often; calls are skipped until cooldown expires.
    Open,
    /// Cooldown elapsed; the next call is a probe.
    HalfOpen,
}

/// Health tracking data for a single backend.
#[derive(Debug, Clone)]
pub struct BackendHealth {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub last_failure_at: Option<Instant>,
    pub last_success_at: Option<Instant>,
}

impl Default for BackendHealth {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure_at: None,
            last_success_at: None,
        }
    }
}

/// Configuration for circuit breaker behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens. `0` disables the breaker.
    pub failure_threshold: u32,
    /// Seconds to stay open before allowing a probe.
    pub cooldown_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_secs: 60,
        }
    }
}

/// Per-backend circuit breaker.
///
/// Owned by one orchestrator; callers wrap it in a mutex and never hold
/// the lock across a backend call.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    backends: BTreeMap<BackendKind, BackendHealth>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            backends: BTreeMap::new(),
        }
    }

    /// Record a successful call. Always closes the circuit.
    pub fn record_success(&mut self, backend: BackendKind) {
        let health = self.backends.entry(backend).or_default();
        health.state = CircuitState::Closed;
        health.consecutive_failures = 0;
        health.last_success_at = Some(Instant::now());
    }

    /// Record a failed call, opening the circuit at the threshold.
    pub fn record_failure(&mut self, backend: BackendKind) {
        let threshold = self.config.failure_threshold;
        let health = self.backends.entry(backend).or_default();
        health.consecutive_failures += 1;
        health.last_failure_at = Some(Instant::now());

        if threshold > 0 && health.consecutive_failures >= threshold {
            health.state = CircuitState::Open;
        }
    }

    /// Whether a call to `backend` should be attempted now.
    ///
    /// An open circuit whose cooldown has elapsed moves to half-open and
    /// allows the call.
    pub fn should_attempt(&mut self, backend: BackendKind) -> bool {
        let cooldown_secs = self.config.cooldown_secs;
        let health = self.backends.entry(backend).or_default();

        match health.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooldown_elapsed = health
                    .last_failure_at
                    .is_none_or(|t| t.elapsed().as_secs() >= cooldown_secs);

                if cooldown_elapsed {
                    health.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Current state for `backend`; unseen backends are closed.
    pub fn backend_status(&self, backend: BackendKind) -> CircuitState {
        self.backends
            .get(&backend)
            .map_or(CircuitState::Closed, |h| h.state)
    }

    /// `(backend, state, consecutive_failures)` for every tracked backend,
    /// in canonical backend order.
    pub fn health_report(&self) -> Vec<(BackendKind, CircuitState, u32)> {
        self.backends
            .iter()
            .map(|(backend, health)| (*backend, health.state, health.consecutive_failures))
            .collect()
    }

    /// Forget all tracked state.
    pub fn reset(&mut self) {
        self.backends.clear();
    }
}
