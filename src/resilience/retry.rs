//! Retry Policy
//!
//! Wraps a fallible async operation with bounded retries and pure
//! exponential backoff (no jitter).

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Bounded-retry policy with exponential backoff.
///
/// An operation that fails is retried with delays
/// `base_delay * 1, base_delay * 2, base_delay * 4, ...` between attempts.
/// After exhausting `retries` total attempts, the last error is returned.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    retries: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, base_delay: Duration) -> Self {
        Self {
            retries: retries.max(1),
            base_delay,
        }
    }

    /// Invoke `op` until it succeeds or `retries` attempts are exhausted.
    ///
    /// Successful attempts short-circuit with no delay. Each failed attempt
    /// is logged with its index and the computed backoff delay.
    pub async fn execute<F, Fut, T, E>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.retries {
                        tracing::error!(
                            op = label,
                            attempts = self.retries,
                            error = %e,
                            "all attempts failed"
                        );
                        return Err(e);
                    }

                    let delay = self.base_delay * 2u32.pow(attempt - 1);
                    tracing::warn!(
                        op = label,
                        attempt,
                        total = self.retries,
                        delay_secs = delay.as_secs_f64(),
                        error = %e,
                        "attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn success_short_circuits() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        let calls = AtomicU32::new(0);

        let result: Result<u32, String> = policy
            .execute("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(7) }
            })
            .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        let calls = AtomicU32::new(0);

        let result: Result<u32, String> = policy
            .execute("op", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("transient".to_string())
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_retries_with_exponential_backoff() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result: Result<u32, String> = policy
            .execute("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("down".to_string()) }
            })
            .await;

        assert_eq!(result, Err("down".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // backoff delays: 1s after the first failure, 2s after the second
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }
}
