//! Retry policy applied around individual HTTP calls (§13.1).
//!
//! Distinct from, and layered underneath, the Worker's circuit breakers
//! (`job_worker_core::circuit_breaker`): this retries a single operation a
//! bounded number of times against transient failures (5xx, 429, transport
//! errors) before handing the final outcome up to the breaker, which
//! reasons about failure *rate* over a longer window.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exponential backoff retry policy for transient HTTP failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts after the first try.
    pub max_retries: u32,

    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Cap applied to the computed delay.
    pub max_delay: Duration,

    /// Multiplicative growth applied per retry.
    pub backoff_multiplier: f64,

    /// Whether to apply ±25% jitter to the computed delay.
    pub use_jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            use_jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay,
            ..Self::default()
        }
    }

    pub fn without_jitter(mut self) -> Self {
        self.use_jitter = false;
        self
    }

    /// Delay before attempt `attempt` (1-indexed; `0` returns zero delay, as
    /// there is no wait before the first try).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::from_secs(0);
        }

        let multiplier = self.backoff_multiplier.powi(attempt as i32 - 1);
        let delay_ms = (self.initial_delay.as_millis() as f64 * multiplier) as u64;
        let mut delay = Duration::from_millis(delay_ms).min(self.max_delay);

        if self.use_jitter {
            use rand::Rng;
            let jitter_factor = rand::rng().random_range(0.75..=1.25);
            delay = Duration::from_millis((delay.as_millis() as f64 * jitter_factor) as u64);
        }

        delay
    }

    /// Whether another retry should be attempted after failure number
    /// `attempt` (0-indexed: `0` is the first failure).
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

/// Whether an HTTP status code indicates a transient failure worth retrying
/// (server errors and rate limiting).
pub fn is_transient_status(status: u16) -> bool {
    status == 429 || status >= 500
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
