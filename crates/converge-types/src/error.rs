//! The `ConvergeError` taxonomy shared across every component.
//!
//! Matches the error classes in the core design: invalid input, not-found,
//! conflict, transient I/O, lock contention, timeout, and SCM failures are
//! each a distinguished kind so callers can match on it instead of parsing
//! strings. Policy denial and tamper detection are NOT represented here —
//! they are structured data returned from the relevant call, never errors.

use thiserror::Error;

/// The unified error type for Converge's core components.
#[derive(Debug, Error)]
pub enum ConvergeError {
    /// Missing required fields, unknown event type, unknown backend. Never retried.
    #[error("invalid input: {0}")]
    Invalid(String),

    /// Unknown intent, unknown review task, or similar.
    #[error("not found: {0}")]
    NotFound(String),

    /// Unique-constraint violation on a primary key.
    #[error("conflict: {0}")]
    Conflict(String),

    /// SCM, network, or subprocess failure. Retried by the resilience layer.
    #[error("transient failure: {0}")]
    Transient(String),

    /// The queue lock could not be acquired.
    #[error("lock contention on '{0}'")]
    LockContention(String),

    /// A guarded operation exceeded its deadline.
    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// SCM adapter failure (simulate/execute/log).
    #[error("scm error: {0}")]
    Scm(String),

    /// Circuit breaker is open; the call was rejected without being attempted.
    #[error("circuit breaker open, retry after {retry_after:?}")]
    CircuitOpen {
        /// How long until the breaker allows a half-open probe.
        retry_after: std::time::Duration,
    },

    /// Escape hatch for storage-layer errors not worth a dedicated variant.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result alias used throughout the Converge crates.
pub type ConvergeResult<T> = Result<T, ConvergeError>;
