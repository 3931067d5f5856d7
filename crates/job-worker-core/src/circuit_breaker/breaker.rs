use async_trait::async_trait;
use std::collections::VecDeque;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use super::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitMetrics, CircuitState,
    CircuitTransition,
};
use crate::Timestamp;

/// One recorded outcome inside the rolling window.
#[derive(Debug, Clone, Copy)]
struct Outcome {
    at: Timestamp,
    success: bool,
}

#[derive(Debug)]
struct InternalState {
    current_state: CircuitState,
    window: VecDeque<Outcome>,
    half_open_in_flight: bool,
    last_state_change: Timestamp,
    next_recovery_attempt: Option<Timestamp>,
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    rejected_requests: u64,
    total_response_time_ms: f64,
}

impl InternalState {
    fn new() -> Self {
        Self {
            current_state: CircuitState::Closed,
            window: VecDeque::new(),
            half_open_in_flight: false,
            last_state_change: Timestamp::now(),
            next_recovery_attempt: None,
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            rejected_requests: 0,
            total_response_time_ms: 0.0,
        }
    }

    fn trim_window(&mut self, window_ms: u64) {
        let cutoff =
            Timestamp::now().subtract_duration(chrono::Duration::milliseconds(window_ms as i64));
        while let Some(front) = self.window.front() {
            if front.at < cutoff {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }

    fn windowed_failures(&self) -> u32 {
        self.window.iter().filter(|o| !o.success).count() as u32
    }

    fn avg_response_time_ms(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.total_response_time_ms / self.total_requests as f64
        }
    }

    fn failure_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.failed_requests as f64 / self.total_requests as f64
        }
    }
}

/// Failure-rate circuit breaker wrapping a single operation shape `T, E`.
///
/// Internal state is guarded by an async `RwLock` so `call` can hold it
/// across the state-machine decision without blocking the executor thread.
/// State transitions are broadcast on an internal channel so the worker can
/// subscribe and react (suspend the pull loop, reset backoff) without
/// polling `state()`.
pub struct DefaultCircuitBreaker<T, E> {
    config: CircuitBreakerConfig,
    state: Arc<RwLock<InternalState>>,
    transitions: broadcast::Sender<CircuitTransition>,
    _marker: PhantomData<fn() -> (T, E)>,
}

impl<T, E> DefaultCircuitBreaker<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub fn new(config: CircuitBreakerConfig) -> Self {
        let (tx, _rx) = broadcast::channel(16);
        Self {
            config,
            state: Arc::new(RwLock::new(InternalState::new())),
            transitions: tx,
            _marker: PhantomData,
        }
    }

    /// Subscribe to state transition notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<CircuitTransition> {
        self.transitions.subscribe()
    }

    fn emit_transition(&self, state: CircuitState) {
        let _ = self.transitions.send(CircuitTransition {
            service_name: self.config.service_name.clone(),
            state,
            at: Timestamp::now(),
        });
    }

    fn should_attempt_recovery(&self, internal: &InternalState) -> bool {
        match internal.next_recovery_attempt {
            Some(next) => Timestamp::now() >= next,
            None => true,
        }
    }

    fn trip_circuit(&self, internal: &mut InternalState) {
        internal.current_state = CircuitState::Open;
        internal.last_state_change = Timestamp::now();
        internal.next_recovery_attempt = Some(
            Timestamp::now().add_seconds((self.config.reset_timeout_ms / 1000).max(1) as i64),
        );
        internal.half_open_in_flight = false;
        self.emit_transition(CircuitState::Open);
    }

    fn transition_to_half_open(&self, internal: &mut InternalState) {
        internal.current_state = CircuitState::HalfOpen;
        internal.last_state_change = Timestamp::now();
        internal.half_open_in_flight = false;
        self.emit_transition(CircuitState::HalfOpen);
    }

    fn close_circuit(&self, internal: &mut InternalState) {
        internal.current_state = CircuitState::Closed;
        internal.last_state_change = Timestamp::now();
        internal.next_recovery_attempt = None;
        internal.half_open_in_flight = false;
        internal.window.clear();
        self.emit_transition(CircuitState::Closed);
    }

    fn record_outcome(&self, internal: &mut InternalState, success: bool, elapsed_ms: f64) {
        internal.total_requests += 1;
        internal.total_response_time_ms += elapsed_ms;
        if success {
            internal.successful_requests += 1;
        } else {
            internal.failed_requests += 1;
        }
        internal.window.push_back(Outcome {
            at: Timestamp::now(),
            success,
        });
        internal.trim_window(self.config.rolling_count_timeout_ms);
    }
}

#[async_trait]
impl<T, E> CircuitBreaker<T, E> for DefaultCircuitBreaker<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    async fn call<F, Fut>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
    {
        if !self.config.enabled {
            return operation()
                .await
                .map_err(CircuitBreakerError::OperationFailed);
        }

        {
            let mut internal = self.state.write().await;
            match internal.current_state {
                CircuitState::Closed => {}
                CircuitState::Open => {
                    if self.should_attempt_recovery(&internal) {
                        self.transition_to_half_open(&mut internal);
                    } else {
                        internal.rejected_requests += 1;
                        return Err(CircuitBreakerError::CircuitOpen {
                            service_name: self.config.service_name.clone(),
                        });
                    }
                }
                CircuitState::HalfOpen => {
                    if internal.half_open_in_flight {
                        internal.rejected_requests += 1;
                        return Err(CircuitBreakerError::TooManyConcurrentRequests);
                    }
                    internal.half_open_in_flight = true;
                }
            }
        }

        let started = std::time::Instant::now();
        let outcome = match self.config.timeout_ms {
            Some(timeout_ms) => match tokio::time::timeout(
                std::time::Duration::from_millis(timeout_ms),
                operation(),
            )
            .await
            {
                Ok(result) => result.map_err(CircuitBreakerError::OperationFailed),
                Err(_) => Err(CircuitBreakerError::Timeout { timeout_ms }),
            },
            None => operation()
                .await
                .map_err(CircuitBreakerError::OperationFailed),
        };
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let mut internal = self.state.write().await;
        let success = outcome.is_ok();
        self.record_outcome(&mut internal, success, elapsed_ms);

        match internal.current_state {
            CircuitState::Closed => {
                let windowed_failures = internal.windowed_failures();
                let windowed_requests = internal.window.len() as u32;
                if windowed_requests >= self.config.volume_threshold {
                    let rate = windowed_failures as f64 / windowed_requests as f64 * 100.0;
                    if rate >= self.config.error_threshold_percentage {
                        self.trip_circuit(&mut internal);
                    }
                }
            }
            CircuitState::HalfOpen => {
                if success {
                    self.close_circuit(&mut internal);
                } else {
                    self.trip_circuit(&mut internal);
                }
            }
            CircuitState::Open => {
                // Unreachable: Open calls are rejected above before this point.
            }
        }

        outcome
    }

    fn state(&self) -> CircuitState {
        // `try_read` keeps this call synchronous; a contended lock means a
        // call is mid-transition, so Open is the fail-safe answer.
        match self.state.try_read() {
            Ok(internal) => internal.current_state,
            Err(_) => CircuitState::Open,
        }
    }

    fn metrics(&self) -> CircuitMetrics {
        match self.state.try_read() {
            Ok(internal) => CircuitMetrics {
                state: internal.current_state,
                total_requests: internal.total_requests,
                successful_requests: internal.successful_requests,
                failed_requests: internal.failed_requests,
                rejected_requests: internal.rejected_requests,
                windowed_requests: internal.window.len() as u32,
                windowed_failures: internal.windowed_failures(),
                last_state_change: internal.last_state_change,
                next_recovery_attempt: internal.next_recovery_attempt,
                failure_rate: internal.failure_rate(),
                avg_response_time_ms: internal.avg_response_time_ms(),
            },
            Err(_) => CircuitMetrics {
                state: CircuitState::Open,
                total_requests: 0,
                successful_requests: 0,
                failed_requests: 0,
                rejected_requests: 0,
                windowed_requests: 0,
                windowed_failures: 0,
                last_state_change: Timestamp::now(),
                next_recovery_attempt: None,
                failure_rate: 0.0,
                avg_response_time_ms: 0.0,
            },
        }
    }

    fn reset(&self) {
        let state = self.state.clone();
        let service_name = self.config.service_name.clone();
        let tx = self.transitions.clone();
        tokio::spawn(async move {
            let mut internal = state.write().await;
            internal.current_state = CircuitState::Closed;
            internal.window.clear();
            internal.next_recovery_attempt = None;
            internal.half_open_in_flight = false;
            internal.last_state_change = Timestamp::now();
            let _ = tx.send(CircuitTransition {
                service_name,
                state: CircuitState::Closed,
                at: Timestamp::now(),
            });
        });
    }
}

#[cfg(test)]
#[path = "breaker_tests.rs"]
mod tests;
