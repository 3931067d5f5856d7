//! Exponential backoff with capped multiplicative jitter (§4.1).
//!
//! [`ExponentialBackoff`] is a small stateful generator: each call to
//! [`ExponentialBackoff::next_delay`] advances an internal attempt counter,
//! and [`ExponentialBackoff::reset`] rewinds it to the first attempt. The
//! Worker resets it exactly when the handler breaker transitions to
//! `HalfOpen` or `Closed` (§4.4.4) — it is not tied to dequeue/handler
//! success directly, only to breaker recovery.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Configuration for [`ExponentialBackoff`] (§4.1, §6.2 `backoffOptions`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BackoffOptions {
    /// Delay for attempt 1, before jitter is applied.
    pub initial_base_retry_delay_ms: u64,
    /// Multiplicative growth applied per attempt.
    pub backoff_factor: f64,
    /// Cap applied to the delay before jitter.
    pub max_delay_ms: u64,
    /// When `true`, `next_delay` returns the capped delay verbatim.
    pub disable_jitter: bool,
    /// Half-width of the symmetric multiplicative jitter. Default `0.25`.
    pub max_jitter_factor: f64,
}

impl Default for BackoffOptions {
    fn default() -> Self {
        Self {
            initial_base_retry_delay_ms: 500,
            backoff_factor: 2.0,
            max_delay_ms: 30_000,
            disable_jitter: false,
            max_jitter_factor: 0.25,
        }
    }
}

/// Stateful generator of wait durations between 4.1's attempt counter `n`
/// (1-indexed) and the configured growth curve.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    options: BackoffOptions,
    attempt: u32,
}

impl ExponentialBackoff {
    pub fn new(options: BackoffOptions) -> Self {
        Self {
            options,
            attempt: 1,
        }
    }

    /// Compute the delay for the current attempt, then advance the
    /// counter. Values are non-negative; growth saturates at `max_delay_ms`
    /// regardless of how large `n` gets (the `powi` argument is clamped so a
    /// long-running worker under sustained backoff cannot overflow `f64`).
    pub fn next_delay(&mut self) -> u64 {
        // backoff_factor^(n-1) grows without bound; clamping the exponent
        // before it can overflow keeps `base` finite while still exceeding
        // max_delay_ms long before the clamp matters in practice.
        let exponent = (self.attempt.saturating_sub(1)).min(64) as i32;
        let base = self.options.initial_base_retry_delay_ms as f64
            * self.options.backoff_factor.powi(exponent);
        let capped = base.min(self.options.max_delay_ms as f64);

        let delay_ms = if self.options.disable_jitter {
            capped
        } else {
            let jitter = rand::rng()
                .random_range(-self.options.max_jitter_factor..=self.options.max_jitter_factor);
            capped * (1.0 + jitter)
        };

        self.attempt = self.attempt.saturating_add(1);
        delay_ms.max(0.0).floor() as u64
    }

    /// Reset the attempt counter to 1, so the next `next_delay` call
    /// produces the initial-attempt delay (jitter aside).
    pub fn reset(&mut self) {
        self.attempt = 1;
    }

    /// Current attempt number (1-indexed), for observability/testing.
    pub fn current_attempt(&self) -> u32 {
        self.attempt
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
