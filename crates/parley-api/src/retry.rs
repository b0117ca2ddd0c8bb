//! Backoff policy for transient completion failures.

use parley_types::ApiError;
use rand::Rng;
use std::time::Duration;

/// How many times, and how patiently, a failed completion is retried.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt (0 = single attempt).
    pub max_retries: u32,
    /// Base delay before the first retry, in milliseconds.
    pub initial_delay_ms: u64,
    /// Upper bound on any single delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Growth factor applied per attempt.
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay_ms: 1000,
            max_delay_ms: 30_000,
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    /// A policy that never retries.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Total number of requests this policy allows.
    pub fn attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay before retry number `attempt` (zero-based).
    ///
    /// A server-supplied `retry_after_ms` wins over the computed backoff.
    /// Both are capped at `max_delay_ms`; computed delays carry ±25% jitter.
    pub fn delay_for(&self, attempt: u32, retry_after_ms: Option<u64>) -> Duration {
        if let Some(server_delay) = retry_after_ms {
            return Duration::from_millis(server_delay.min(self.max_delay_ms));
        }

        let base = self.initial_delay_ms as f64 * self.backoff_factor.powi(attempt as i32);
        let jitter = rand::rng().random_range(0.75..=1.25);
        let millis = (base.min(self.max_delay_ms as f64) * jitter) as u64;
        Duration::from_millis(millis.min(self.max_delay_ms))
    }
}

/// Whether a failed request may succeed if sent again.
pub fn is_retryable(error: &ApiError) -> bool {
    matches!(
        error,
        ApiError::RateLimited { .. }
            | ApiError::Overloaded
            | ApiError::Server { .. }
            | ApiError::Network(_)
            | ApiError::Timeout
    )
}
