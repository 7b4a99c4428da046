//! Three-state circuit breaker (Closed -> Open -> HalfOpen -> Closed).
//!
//! A direct port of the reference's `CircuitBreaker`, with the threading
//! lock replaced by a `std::sync::Mutex` and `time.monotonic()` by
//! `std::time::Instant`.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use converge_types::ConvergeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: State,
    failure_count: u32,
    success_count: u32,
    last_failure_at: Option<Instant>,
}

/// Guards a flaky dependency: after `failure_threshold` consecutive
/// failures the breaker opens and rejects calls for `recovery_timeout`,
/// then allows `success_threshold` probe successes before fully closing.
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    recovery_timeout: Duration,
    success_threshold: u32,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, failure_threshold: u32, recovery_timeout: Duration, success_threshold: u32) -> Self {
        CircuitBreaker {
            name: name.into(),
            failure_threshold,
            recovery_timeout,
            success_threshold,
            inner: Mutex::new(Inner {
                state: State::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure_at: None,
            }),
        }
    }

    /// The default policy used across Converge's resilience-wrapped calls:
    /// 5 consecutive failures, 30s recovery, 2 probe successes.
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, 5, Duration::from_secs(30), 2)
    }

    fn poll_state(&self, guard: &mut Inner) -> State {
        if guard.state == State::Open {
            if let Some(last) = guard.last_failure_at {
                if last.elapsed() >= self.recovery_timeout {
                    guard.state = State::HalfOpen;
                    guard.success_count = 0;
                }
            }
        }
        guard.state
    }

    fn record_success(&self) {
        let mut guard = self.inner.lock().expect("circuit breaker mutex poisoned");
        if guard.state == State::HalfOpen {
            guard.success_count += 1;
            if guard.success_count >= self.success_threshold {
                guard.state = State::Closed;
                guard.failure_count = 0;
                tracing::info!(breaker = %self.name, "circuit breaker closed");
            }
        } else {
            guard.failure_count = 0;
        }
    }

    fn record_failure(&self) {
        let mut guard = self.inner.lock().expect("circuit breaker mutex poisoned");
        guard.failure_count += 1;
        guard.last_failure_at = Some(Instant::now());
        if guard.state == State::HalfOpen {
            guard.state = State::Open;
            tracing::warn!(breaker = %self.name, "circuit breaker re-opened from half-open");
        } else if guard.failure_count >= self.failure_threshold {
            guard.state = State::Open;
            tracing::warn!(breaker = %self.name, failures = guard.failure_count, "circuit breaker opened");
        }
    }

    /// Reset to closed state (used in tests).
    pub fn reset(&self) {
        let mut guard = self.inner.lock().expect("circuit breaker mutex poisoned");
        guard.state = State::Closed;
        guard.failure_count = 0;
        guard.success_count = 0;
    }

    /// Runs `operation` if the breaker is not open, recording the outcome.
    /// Returns `ConvergeError::CircuitOpen` without invoking `operation` if
    /// the breaker is currently open.
    pub fn call<T, E>(&self, operation: impl FnOnce() -> Result<T, E>) -> Result<T, ConvergeError>
    where
        E: Into<anyhow::Error>,
    {
        let state = {
            let mut guard = self.inner.lock().expect("circuit breaker mutex poisoned");
            self.poll_state(&mut guard)
        };
        if state == State::Open {
            return Err(ConvergeError::CircuitOpen {
                retry_after: self.recovery_timeout,
            });
        }
        match operation() {
            Ok(v) => {
                self.record_success();
                Ok(v)
            }
            Err(e) => {
                self.record_failure();
                Err(ConvergeError::Other(e.into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_consecutive_failures() {
        let cb = CircuitBreaker::new("test", 3, Duration::from_secs(30), 2);
        for _ in 0..3 {
            let _ = cb.call(|| Err::<(), _>(anyhow::anyhow!("boom")));
        }
        let result = cb.call(|| Ok::<_, anyhow::Error>(()));
        assert!(matches!(result, Err(ConvergeError::CircuitOpen { .. })));
    }

    #[test]
    fn success_resets_failure_count_while_closed() {
        let cb = CircuitBreaker::new("test", 3, Duration::from_secs(30), 2);
        let _ = cb.call(|| Err::<(), _>(anyhow::anyhow!("boom")));
        let _ = cb.call(|| Ok::<_, anyhow::Error>(()));
        let _ = cb.call(|| Err::<(), _>(anyhow::anyhow!("boom")));
        let _ = cb.call(|| Err::<(), _>(anyhow::anyhow!("boom")));
        // Only 2 consecutive failures since the last success; still closed.
        let result = cb.call(|| Ok::<_, anyhow::Error>(()));
        assert!(result.is_ok());
    }

    #[test]
    fn half_open_failure_reopens_immediately() {
        let cb = CircuitBreaker::new("test", 1, Duration::from_millis(10), 2);
        let _ = cb.call(|| Err::<(), _>(anyhow::anyhow!("boom")));
        std::thread::sleep(Duration::from_millis(20));
        // This call observes HalfOpen, then fails, landing back in Open.
        let _ = cb.call(|| Err::<(), _>(anyhow::anyhow!("boom again")));
        let result = cb.call(|| Ok::<_, anyhow::Error>(()));
        assert!(matches!(result, Err(ConvergeError::CircuitOpen { .. })));
    }
}
