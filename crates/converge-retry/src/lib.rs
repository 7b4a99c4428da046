//! Resilience primitives: bounded exponential backoff, a three-state circuit
//! breaker, and an async timeout wrapper, for guarding calls to git, SCM
//! subprocesses, and the store.

mod backoff;
mod circuit_breaker;
mod timeout;

pub use backoff::{BackoffConfig, calculate_delay, retry_with_backoff};
pub use circuit_breaker::CircuitBreaker;
pub use timeout::with_timeout;
