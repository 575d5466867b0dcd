//! Sliding-Window Rate Limiter
//!
//! Bounds call frequency per external source using a trailing 60-second
//! window of call timestamps.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const WINDOW: Duration = Duration::from_secs(60);

/// Per-source sliding-window rate limiter.
///
/// Each source gets its own timestamp queue, so waiting on one source never
/// delays another. The per-source mutex is held across the wait, which
/// serializes concurrent acquisitions for the same source.
pub struct RateLimiter {
    calls_per_minute: usize,
    windows: Mutex<HashMap<String, Arc<Mutex<VecDeque<Instant>>>>>,
}

impl RateLimiter {
    /// Create a limiter allowing `calls_per_minute` calls per source in any
    /// trailing 60-second window.
    pub fn new(calls_per_minute: usize) -> Self {
        Self {
            calls_per_minute: calls_per_minute.max(1),
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Suspend the calling task until issuing a call for `source_id` would
    /// stay within the limit, then record the call.
    pub async fn acquire(&self, source_id: &str) {
        let window = {
            let mut map = self.windows.lock().await;
            map.entry(source_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(VecDeque::new())))
                .clone()
        };

        let mut calls = window.lock().await;
        let now = Instant::now();
        Self::prune(&mut calls, now);

        if calls.len() >= self.calls_per_minute {
            if let Some(&oldest) = calls.front() {
                let wait = WINDOW.saturating_sub(now.duration_since(oldest));
                if !wait.is_zero() {
                    tracing::info!(
                        source = source_id,
                        wait_secs = wait.as_secs_f64(),
                        "rate limit reached, waiting"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
            Self::prune(&mut calls, Instant::now());
        }

        calls.push_back(Instant::now());
    }

    fn prune(calls: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&front) = calls.front() {
            if now.duration_since(front) >= WINDOW {
                calls.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn under_limit_does_not_wait() {
        let limiter = RateLimiter::new(3);
        let start = Instant::now();

        for _ in 0..3 {
            limiter.acquire("scale").await;
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn over_limit_waits_out_the_window() {
        let limiter = RateLimiter::new(3);
        let start = Instant::now();

        for _ in 0..3 {
            limiter.acquire("scale").await;
        }
        limiter.acquire("scale").await;

        assert!(start.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn sixty_one_acquisitions_span_at_least_a_minute() {
        let limiter = RateLimiter::new(30);
        let start = Instant::now();

        for _ in 0..61 {
            limiter.acquire("cuff").await;
        }

        assert!(start.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn sources_do_not_interfere() {
        let limiter = RateLimiter::new(2);
        let start = Instant::now();

        limiter.acquire("scale").await;
        limiter.acquire("scale").await;
        limiter.acquire("cuff").await;
        limiter.acquire("cuff").await;

        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
