//! Timeout wrapper for async operations.
//!
//! The reference implements this with a daemon thread joined with a
//! timeout — it can abandon a hung call but never cancel it. `tokio::time`
//! gives real cancellation on the `.await` point, so this is a strict
//! improvement over the ported behavior rather than a faithful port of it.

use std::time::Duration;

use converge_types::ConvergeError;

/// Runs `fut` and converts a timeout into `ConvergeError::Timeout`.
pub async fn with_timeout<T>(
    duration: Duration,
    fut: impl std::future::Future<Output = T>,
) -> Result<T, ConvergeError> {
    tokio::time::timeout(duration, fut)
        .await
        .map_err(|_| ConvergeError::Timeout(duration))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_when_under_the_deadline() {
        let result = with_timeout(Duration::from_millis(200), async { 42 }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn times_out_when_the_future_never_resolves_in_time() {
        let result = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            42
        })
        .await;
        assert!(matches!(result, Err(ConvergeError::Timeout(_))));
    }
}
