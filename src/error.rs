//! Error types for workreg.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Input failed validation. Never retried.
    #[error("validation error: {0}")]
    Validation(String),

    /// The targeted work item does not exist.
    #[error("work item not found: {0}")]
    NotFound(String),

    /// Circuit breaker is open; the store was not invoked.
    #[error("circuit breaker open: store operations rejected")]
    CircuitOpen,

    /// Bulkhead permit not acquired within the wait budget.
    #[error("bulkhead timeout: too many in-flight store operations")]
    BulkheadTimeout,

    /// The underlying key-value store failed. Counts toward the circuit.
    #[error("store error: {0}")]
    Store(String),

    /// Similarity computation failed. Callers treat this as similarity 0.0.
    #[error("similarity computation failed: {0}")]
    Similarity(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error is a backend failure the circuit should count.
    ///
    /// Domain errors (`NotFound`, `Validation`) mean the store round-trip
    /// itself succeeded and must not trip the breaker.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Error::Store(_))
    }

    /// Whether a caller may reasonably retry with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::CircuitOpen | Error::BulkheadTimeout | Error::Store(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
