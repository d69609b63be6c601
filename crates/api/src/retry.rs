use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::RetryConfig;

/// Doubling backoff for dependencies that may still be starting when the
/// server boots. Questions are never retried.
#[derive(Debug, Clone)]
pub struct StartupBackoff {
    max_retries: usize,
    initial: Duration,
    cap: Duration,
}

impl StartupBackoff {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial: Duration::from_millis(config.initial_backoff_ms),
            cap: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Delay before the given retry (1-based).
    pub fn delay(&self, retry: usize) -> Duration {
        let shift = u32::try_from(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        let factor = 1u32.checked_shl(shift).unwrap_or(u32::MAX);
        self.initial.saturating_mul(factor).min(self.cap)
    }

    /// Runs `attempt` until it succeeds or the retries run out; the last error is returned.
    pub async fn wait_for<F, Fut, T, E>(&self, dependency: &str, mut attempt: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut last_error = match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        for retry in 1..=self.max_retries {
            let delay = self.delay(retry);
            warn!(
                dependency,
                retry,
                max_retries = self.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %last_error,
                "dependency not reachable yet"
            );
            sleep(delay).await;

            match attempt().await {
                Ok(value) => {
                    info!(dependency, retries = retry, "dependency reachable");
                    return Ok(value);
                }
                Err(e) => last_error = e,
            }
        }

        warn!(dependency, retries = self.max_retries, error = %last_error, "giving up on dependency");
        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn backoff(max_retries: usize, initial_backoff_ms: u64, max_backoff_ms: u64) -> StartupBackoff {
        StartupBackoff::from_config(&RetryConfig { max_retries, initial_backoff_ms, max_backoff_ms })
    }

    #[test]
    fn test_delay_doubles_up_to_cap() {
        let backoff = backoff(10, 100, 1_000);
        let delays: Vec<u64> = (1..=6).map(|r| backoff.delay(r).as_millis() as u64).collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1_000, 1_000]);
        assert_eq!(backoff.delay(200), Duration::from_millis(1_000));
    }

    #[tokio::test]
    async fn test_reachable_after_transient_failures() {
        let calls = AtomicUsize::new(0);

        let result: Result<&str, String> = backoff(3, 1, 2)
            .wait_for("neo4j", || {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call < 2 {
                        Err("connection refused".to_string())
                    } else {
                        Ok("connected")
                    }
                }
            })
            .await;

        assert_eq!(result, Ok("connected"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_last_error_after_retries_run_out() {
        let calls = AtomicUsize::new(0);

        let result: Result<(), String> = backoff(2, 1, 1)
            .wait_for("neo4j", || {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(format!("refused on call {call}")) }
            })
            .await;

        assert_eq!(result, Err("refused on call 2".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_retries_means_single_attempt() {
        let calls = AtomicUsize::new(0);

        let result: Result<(), &str> = backoff(0, 1, 1)
            .wait_for("neo4j", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("down") }
            })
            .await;

        assert_eq!(result, Err("down"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
