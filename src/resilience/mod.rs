//! Resilience Primitives
//!
//! Cross-cutting wrappers applied at fetch call sites:
//! - [`RateLimiter`]: sliding one-minute window per source
//! - [`RetryPolicy`]: bounded retries with exponential backoff
//!
//! The two compose: the rate limiter is acquired inside each retry attempt,
//! so backoff delay and rate-limit wait can stack.

mod rate_limit;
mod retry;

pub use rate_limit::RateLimiter;
pub use retry::RetryPolicy;
