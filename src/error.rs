//! Error types for the fae-retrieval crate.
//!
//! Backend-level errors are recovered inside the orchestrator and only
//! surface as entries in a response's `errors_by_backend` map. The
//! remaining variants cover configuration and total failure.

/// Errors that can occur during federated retrieval.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SearchError {
    /// A single backend failed. Recorded and skipped, never fatal.
    #[error("backend {backend} failed: {message}")]
    Backend {
        /// Name of the failing backend.
        backend: String,
        /// Human-readable failure description.
        message: String,
    },

    /// Every selected backend failed, so no results could be produced.
    #[error("all backends failed: {0}")]
    AllBackendsFailed(String),

    /// A backend did not respond within its time budget.
    #[error("backend {backend} timed out after {timeout_ms}ms")]
    Timeout {
        /// Name of the backend that timed out.
        backend: String,
        /// The timeout that was exceeded.
        timeout_ms: u64,
    },

    /// The backend is temporarily disabled by its circuit breaker.
    #[error("circuit open for backend {0}")]
    CircuitOpen(String),

    /// Invalid orchestrator configuration or call arguments.
    #[error("config error: {0}")]
    Config(String),

    /// A query pattern table failed to compile.
    #[error("pattern error: {0}")]
    Pattern(String),
}

impl SearchError {
    /// Convenience constructor for [`SearchError::Backend`].
    pub fn backend(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            backend: backend.into(),
            message: message.into(),
        }
    }
}

impl From<regex::Error> for SearchError {
    fn from(err: regex::Error) -> Self {
        Self::Pattern(err.to_string())
    }
}

/// Convenience type alias for fae-retrieval results.
pub type Result<T> = std::result::Result<T, SearchError>;
