//! Circuit breaker resilience pattern protecting the worker's two external
//! call sites: dequeuing a task and invoking the user handler.
//!
//! # Circuit Breaker States
//!
//! - **Closed**: normal operation, outcomes are counted in a rolling window.
//! - **Open**: requests are rejected immediately without invoking the
//!   wrapped operation.
//! - **Half-Open**: a single probe is admitted; its outcome decides whether
//!   the circuit closes or re-opens.
//!
//! Unlike a simple consecutive-failure counter, tripping here is based on a
//! rolling failure-rate percentage over a time window, matching how an
//! upstream outage (rather than a handful of unlucky calls) should be the
//! trigger.
//!
//! ```rust
//! use job_worker_core::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, DefaultCircuitBreaker};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CircuitBreakerConfig::default();
//! let breaker: DefaultCircuitBreaker<u32, String> = DefaultCircuitBreaker::new(config);
//! let result = breaker.call(|| async { Ok::<_, String>(42) }).await;
//! assert_eq!(result.unwrap(), 42);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;

use crate::Timestamp;

mod breaker;
pub use breaker::DefaultCircuitBreaker;

/// Circuit breaker protection for an external service operation.
///
/// # Type Parameters
///
/// - `T`: success result type
/// - `E`: operation error type
#[async_trait]
pub trait CircuitBreaker<T, E>: Send + Sync {
    /// Execute `operation` with circuit breaker protection.
    ///
    /// - **Closed**: the operation runs; its outcome is recorded.
    /// - **Open**: rejected immediately with [`CircuitBreakerError::CircuitOpen`].
    /// - **Half-Open**: a bounded number of probes are admitted; beyond that,
    ///   rejected with [`CircuitBreakerError::TooManyConcurrentRequests`].
    async fn call<F, Fut>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send;

    /// Current circuit state.
    fn state(&self) -> CircuitState;

    /// Current circuit metrics and statistics.
    fn metrics(&self) -> CircuitMetrics;

    /// Force the circuit back to closed, clearing the rolling window.
    fn reset(&self);

    /// `true` when the circuit currently admits requests.
    fn is_healthy(&self) -> bool {
        self.state().allows_requests()
    }
}

/// Current state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    /// Normal operation; outcomes are tracked in the rolling window.
    Closed,
    /// Fast-fail mode; the rolling failure rate exceeded the threshold.
    Open,
    /// Testing recovery with a single admitted probe.
    HalfOpen,
}

impl CircuitState {
    /// `true` for states that forward calls to the wrapped operation.
    pub fn allows_requests(&self) -> bool {
        matches!(self, Self::Closed | Self::HalfOpen)
    }

    /// `true` for states that indicate the circuit is not healthy.
    pub fn is_failure_state(&self) -> bool {
        matches!(self, Self::Open | Self::HalfOpen)
    }
}

/// Configuration for circuit breaker tripping and recovery.
///
/// Mirrors the constructor options table: both the task-handler breaker and
/// the dequeue breaker default to `enabled = true`,
/// `error_threshold_percentage = 50.0`, `reset_timeout_ms = 30_000`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Name used for logging and metrics labeling.
    pub service_name: String,

    /// If `false`, `call` behaves as an identity pass-through: every
    /// operation is invoked directly and outcomes are not tracked.
    pub enabled: bool,

    /// Width of the rolling window used to count outcomes, in milliseconds.
    pub rolling_count_timeout_ms: u64,

    /// Minimum number of outcomes inside the window before the error
    /// threshold may trip the circuit.
    pub volume_threshold: u32,

    /// Percentage (0-100) of failures within the window required to trip.
    pub error_threshold_percentage: f64,

    /// Cooldown in milliseconds the circuit stays open before a half-open
    /// probe is admitted.
    pub reset_timeout_ms: u64,

    /// Optional per-call deadline. Exceeding it counts as a failure.
    pub timeout_ms: Option<u64>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".to_string(),
            enabled: true,
            rolling_count_timeout_ms: 10_000,
            volume_threshold: 10,
            error_threshold_percentage: 50.0,
            reset_timeout_ms: 30_000,
            timeout_ms: None,
        }
    }
}

/// Circuit breaker configuration guarding the user task handler.
///
/// Matches the defaults in the worker constructor table: 50% error
/// threshold, 30 second reset timeout.
pub fn task_handler_circuit_breaker_config() -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        service_name: "task-handler".to_string(),
        ..CircuitBreakerConfig::default()
    }
}

/// Circuit breaker configuration guarding the dequeue operation.
///
/// Same defaults as the task-handler breaker; the two are independent
/// instances so an outage in one does not mask the other.
pub fn dequeue_task_circuit_breaker_config() -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        service_name: "dequeue-task".to_string(),
        ..CircuitBreakerConfig::default()
    }
}

/// Point-in-time statistics for a circuit breaker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitMetrics {
    pub state: CircuitState,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub rejected_requests: u64,
    /// Outcomes currently inside the rolling window.
    pub windowed_requests: u32,
    /// Failures currently inside the rolling window.
    pub windowed_failures: u32,
    pub last_state_change: Timestamp,
    /// When the circuit will next admit a half-open probe, if open.
    pub next_recovery_attempt: Option<Timestamp>,
    pub failure_rate: f64,
    pub avg_response_time_ms: f64,
}

impl CircuitMetrics {
    /// Success rate over the lifetime of the breaker (1.0 if no requests yet).
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            1.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64
        }
    }

    /// Whether the windowed failure rate meets or exceeds `threshold` (0-100)
    /// and the window holds enough samples to judge.
    pub fn should_trip(&self, threshold: f64, volume_threshold: u32) -> bool {
        if self.windowed_requests < volume_threshold {
            return false;
        }
        let rate = self.windowed_failures as f64 / self.windowed_requests as f64 * 100.0;
        rate >= threshold
    }
}

/// A transition notification emitted whenever the circuit changes state.
///
/// The worker subscribes to these to suspend/resume its pull loop and to
/// reset backoff on recovery (§4.4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitTransition {
    pub service_name: String,
    pub state: CircuitState,
    pub at: Timestamp,
}

/// Errors produced by circuit-breaker-wrapped operations.
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open; the operation was not invoked.
    #[error("circuit breaker '{service_name}' is open")]
    CircuitOpen { service_name: String },

    /// The operation did not complete within the configured deadline.
    #[error("operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The wrapped operation returned an error.
    #[error("operation failed: {0}")]
    OperationFailed(E),

    /// Too many concurrent probes were attempted while half-open.
    #[error("too many concurrent requests while circuit is half-open")]
    TooManyConcurrentRequests,
}

impl<E> CircuitBreakerError<E> {
    /// `true` for outcomes that should be recorded as a failure by the
    /// breaker itself (as opposed to breaker-protection rejections, which
    /// are not counted — rejecting fast is the point, not a symptom).
    pub fn counts_as_failure(&self) -> bool {
        matches!(self, Self::OperationFailed(_) | Self::Timeout { .. })
    }

    /// `true` when the error is the breaker's own protection kicking in
    /// rather than the wrapped operation failing.
    pub fn is_circuit_protection(&self) -> bool {
        matches!(
            self,
            Self::CircuitOpen { .. } | Self::TooManyConcurrentRequests
        )
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
