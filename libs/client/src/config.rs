//! Resilience configuration for the rate-limited transport.

use crate::error::ClientError;
use std::time::Duration;

/// Retry, backoff, timeout, and rate-limit knobs for upstream calls.
///
/// The defaults match a polite client for a shared Horreum instance:
/// 10 requests per rolling second, three retries with exponential backoff
/// starting at 500 ms, and a 30 s per-attempt timeout.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Backoff delay before the first retry.
    pub backoff_initial: Duration,
    /// Upper bound on the (pre-jitter) backoff delay.
    pub backoff_max: Duration,
    /// Uniform jitter applied to each delay, as a fraction in `[0, 1)`.
    pub jitter_ratio: f64,
    /// Per-attempt timeout. An attempt that exceeds it is aborted, not retried.
    pub timeout: Duration,
    /// Maximum requests admitted in any rolling one-second window.
    pub requests_per_second: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_initial: Duration::from_millis(500),
            backoff_max: Duration::from_secs(10),
            jitter_ratio: 0.2,
            timeout: Duration::from_secs(30),
            requests_per_second: 10,
        }
    }
}

impl RetryPolicy {
    /// Validate the invariants the transport relies on.
    ///
    /// `backoff_initial <= backoff_max`, `jitter_ratio` in `[0, 1)`, and a
    /// non-zero request rate.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.backoff_initial > self.backoff_max {
            return Err(ClientError::InvalidPolicy(
                "backoff_initial exceeds backoff_max".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.jitter_ratio) {
            return Err(ClientError::InvalidPolicy(
                "jitter_ratio must be in [0, 1)".into(),
            ));
        }
        if self.requests_per_second == 0 {
            return Err(ClientError::InvalidPolicy(
                "requests_per_second must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Jittered exponential backoff delay for retry `attempt` (1-indexed).
    ///
    /// The base delay is `backoff_initial * 2^(attempt-1)` clamped to
    /// `backoff_max`; the result is drawn uniformly from
    /// `[base * (1 - jitter_ratio), base * (1 + jitter_ratio)]`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self.backoff_initial.as_secs_f64()
            * 2f64.powi(attempt.saturating_sub(1).min(30) as i32);
        let base = exp.min(self.backoff_max.as_secs_f64());
        let jitter = 1.0 + (rand::random::<f64>() * 2.0 - 1.0) * self.jitter_ratio;
        Duration::from_secs_f64(base * jitter)
    }
}
