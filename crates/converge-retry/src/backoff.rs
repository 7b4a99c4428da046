//! Bounded exponential backoff with jitter.
//!
//! One fixed policy, used everywhere in the merge-coordination core: base
//! 0.5s, factor 2x, capped at 30s, 3 attempts total.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry configuration. The `Default` impl matches the core's fixed policy;
/// callers that need a different shape (e.g. webhook delivery) build one
/// explicitly rather than picking from named presets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Total attempts, including the first (not a retry count).
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    /// 0.0 disables jitter; 1.0 means the delay is multiplied by a factor
    /// uniformly drawn from `[1 - jitter, 1 + jitter]`.
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        BackoffConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
            jitter: 0.0,
        }
    }
}

/// Delay before the given attempt (1-indexed: the delay *preceding* attempt
/// `attempt`, so `attempt=1` is always zero).
pub fn calculate_delay(config: &BackoffConfig, attempt: u32) -> Duration {
    if attempt <= 1 {
        return Duration::ZERO;
    }
    let exponent = (attempt - 2).min(32);
    let factor = config.backoff_factor.powi(exponent as i32);
    let millis = (config.base_delay.as_millis() as f64 * factor).min(config.max_delay.as_millis() as f64);
    let delay = Duration::from_millis(millis.max(0.0) as u64);
    let capped = delay.min(config.max_delay);
    if config.jitter > 0.0 {
        apply_jitter(capped, config.jitter)
    } else {
        capped
    }
}

fn apply_jitter(delay: Duration, jitter: f64) -> Duration {
    use rand::Rng;
    let jitter_range = 2.0 * jitter;
    let mut rng = rand::thread_rng();
    let random_value: f64 = rng.r#gen();
    let random_factor = 1.0 - jitter + (random_value * jitter_range);
    let millis = (delay.as_millis() as f64 * random_factor).round() as u64;
    Duration::from_millis(millis)
}

/// Runs a fallible async operation with bounded exponential backoff.
///
/// The operation receives the current attempt number (1-indexed). Retries
/// stop once `config.max_attempts` is reached, returning the last error.
pub async fn retry_with_backoff<T, E, F, Fut>(config: &BackoffConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        match operation(attempt).await {
            Ok(v) => return Ok(v),
            Err(e) => {
                if attempt >= config.max_attempts {
                    return Err(e);
                }
                let delay = calculate_delay(config, attempt + 1);
                tracing::warn!(attempt, ?delay, "retrying after transient failure");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_attempt_has_no_delay() {
        let cfg = BackoffConfig::default();
        assert_eq!(calculate_delay(&cfg, 1), Duration::ZERO);
    }

    #[test]
    fn delay_doubles_each_attempt() {
        let cfg = BackoffConfig {
            jitter: 0.0,
            ..BackoffConfig::default()
        };
        assert_eq!(calculate_delay(&cfg, 2), Duration::from_millis(500));
        assert_eq!(calculate_delay(&cfg, 3), Duration::from_millis(1000));
        assert_eq!(calculate_delay(&cfg, 4), Duration::from_millis(2000));
    }

    #[test]
    fn delay_is_capped_at_max() {
        let cfg = BackoffConfig {
            max_attempts: 20,
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
            jitter: 0.0,
        };
        assert_eq!(calculate_delay(&cfg, 2), Duration::from_secs(10));
        assert_eq!(calculate_delay(&cfg, 3), Duration::from_secs(20));
        assert_eq!(calculate_delay(&cfg, 4), Duration::from_secs(30));
        assert_eq!(calculate_delay(&cfg, 10), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn retry_with_backoff_succeeds_after_transient_failures() {
        let cfg = BackoffConfig {
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            ..BackoffConfig::default()
        };
        let mut seen = 0;
        let result: Result<&str, &str> = retry_with_backoff(&cfg, |attempt| {
            seen = attempt;
            async move {
                if attempt < 3 {
                    Err("transient")
                } else {
                    Ok("ok")
                }
            }
        })
        .await;
        assert_eq!(result, Ok("ok"));
        assert_eq!(seen, 3);
    }

    #[tokio::test]
    async fn retry_with_backoff_gives_up_after_max_attempts() {
        let cfg = BackoffConfig {
            max_attempts: 2,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            ..BackoffConfig::default()
        };
        let result: Result<&str, &str> = retry_with_backoff(&cfg, |_| async { Err("permanent") }).await;
        assert_eq!(result, Err("permanent"));
    }
}
