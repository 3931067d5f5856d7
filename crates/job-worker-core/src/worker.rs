//! The Worker runtime (§4.4): pull-dispatch-await loop bound to a single
//! `stage_type`, with a concurrency-bounded dispatcher, two independent
//! circuit breakers, and a backoff that paces empty or failing polls.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::{broadcast, Mutex as TokioMutex, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::api::ApiClient;
use crate::backoff::{BackoffOptions, ExponentialBackoff};
use crate::circuit_breaker::{
    dequeue_task_circuit_breaker_config, task_handler_circuit_breaker_config, CircuitBreaker,
    CircuitBreakerConfig, CircuitState, DefaultCircuitBreaker,
};
use crate::consumer::{Consumer, DefaultConsumer};
use crate::error::{ConfigurationError, ConsumerError, WorkerError};
use crate::events::{WorkerEvent, WorkerEventBus};
use crate::handler_context::{HandlerContext, NoOpLogger, WorkerLogger};
use crate::ids::TaskId;
use crate::model::Task;
use crate::producer::Producer;
use crate::trace::link_entity_contexts;

/// A task handler invocation, boxed so it can be stored in `WorkerConfig`
/// without a generic parameter leaking onto `Worker` (the source's plain
/// function value, §3 `handler`).
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), WorkerError>> + Send>>;

/// User task handler: receives the claimed task and its `HandlerContext`,
/// completes normally or returns an error (§3).
pub type HandlerFn = Arc<dyn Fn(Task, HandlerContext) -> HandlerFuture + Send + Sync>;

/// Validated Worker construction options (§6.2).
#[derive(Clone)]
pub struct WorkerConfig {
    pub(crate) stage_type: String,
    pub(crate) handler: HandlerFn,
    pub(crate) concurrency: usize,
    pub(crate) task_handler_circuit_breaker: CircuitBreakerConfig,
    pub(crate) dequeue_task_circuit_breaker: CircuitBreakerConfig,
    pub(crate) backoff_options: BackoffOptions,
    pub(crate) logger: Arc<dyn WorkerLogger>,
    pub(crate) api_client: Arc<dyn ApiClient>,
    pub(crate) producer: Arc<dyn Producer>,
}

impl WorkerConfig {
    pub fn builder() -> WorkerConfigBuilder {
        WorkerConfigBuilder::default()
    }
}

/// Builder for [`WorkerConfig`]. `stage_type`, `handler`, `backoff_options`,
/// `api_client`, and `producer` are required (§6.2); everything else has a
/// spec-mandated default.
#[derive(Default)]
pub struct WorkerConfigBuilder {
    stage_type: Option<String>,
    handler: Option<HandlerFn>,
    concurrency: Option<usize>,
    task_handler_circuit_breaker: Option<CircuitBreakerConfig>,
    dequeue_task_circuit_breaker: Option<CircuitBreakerConfig>,
    backoff_options: Option<BackoffOptions>,
    logger: Option<Arc<dyn WorkerLogger>>,
    api_client: Option<Arc<dyn ApiClient>>,
    producer: Option<Arc<dyn Producer>>,
}

impl WorkerConfigBuilder {
    pub fn stage_type(mut self, stage_type: impl Into<String>) -> Self {
        self.stage_type = Some(stage_type.into());
        self
    }

    /// Accepts a plain async closure `Fn(Task, HandlerContext) -> impl
    /// Future<Output = Result<(), WorkerError>>`, boxing it internally.
    pub fn handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Task, HandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), WorkerError>> + Send + 'static,
    {
        self.handler = Some(Arc::new(move |task, context| {
            Box::pin(handler(task, context)) as HandlerFuture
        }));
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    pub fn task_handler_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.task_handler_circuit_breaker = Some(config);
        self
    }

    pub fn dequeue_task_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.dequeue_task_circuit_breaker = Some(config);
        self
    }

    pub fn backoff_options(mut self, options: BackoffOptions) -> Self {
        self.backoff_options = Some(options);
        self
    }

    pub fn logger(mut self, logger: Arc<dyn WorkerLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn api_client(mut self, api_client: Arc<dyn ApiClient>) -> Self {
        self.api_client = Some(api_client);
        self
    }

    pub fn producer(mut self, producer: Arc<dyn Producer>) -> Self {
        self.producer = Some(producer);
        self
    }

    pub fn build(self) -> Result<WorkerConfig, ConfigurationError> {
        let stage_type = self.stage_type.ok_or_else(|| ConfigurationError::MissingField {
            field: "stage_type".to_string(),
        })?;
        let handler = self.handler.ok_or_else(|| ConfigurationError::MissingField {
            field: "handler".to_string(),
        })?;
        let backoff_options = self
            .backoff_options
            .ok_or_else(|| ConfigurationError::MissingField {
                field: "backoff_options".to_string(),
            })?;
        let api_client = self
            .api_client
            .ok_or_else(|| ConfigurationError::MissingField {
                field: "api_client".to_string(),
            })?;
        let producer = self.producer.ok_or_else(|| ConfigurationError::MissingField {
            field: "producer".to_string(),
        })?;

        Ok(WorkerConfig {
            stage_type,
            handler,
            concurrency: self.concurrency.unwrap_or(1),
            task_handler_circuit_breaker: self
                .task_handler_circuit_breaker
                .unwrap_or_else(task_handler_circuit_breaker_config),
            dequeue_task_circuit_breaker: self
                .dequeue_task_circuit_breaker
                .unwrap_or_else(dequeue_task_circuit_breaker_config),
            backoff_options,
            logger: self.logger.unwrap_or_else(|| Arc::new(NoOpLogger)),
            api_client,
            producer,
        })
    }
}

struct Inner {
    stage_type: String,
    handler: HandlerFn,
    concurrency: usize,
    logger: Arc<dyn WorkerLogger>,
    api_client: Arc<dyn ApiClient>,
    producer: Arc<dyn Producer>,
    consumer: Arc<dyn Consumer>,
    handler_breaker: Arc<DefaultCircuitBreaker<(), WorkerError>>,
    dequeue_breaker: Arc<DefaultCircuitBreaker<Option<Task>, ConsumerError>>,
    backoff: TokioMutex<ExponentialBackoff>,
    semaphore: Arc<Semaphore>,
    cancellation: CancellationToken,
    running: AtomicBool,
    events: WorkerEventBus,
    running_tasks: TokioMutex<Vec<JoinHandle<()>>>,
}

impl Inner {
    async fn sleep_backoff(&self) {
        let delay_ms = self.backoff.lock().await.next_delay();
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => {}
            () = self.cancellation.cancelled() => {}
        }
    }

    async fn reset_backoff(&self) {
        self.backoff.lock().await.reset();
    }

    async fn wait_for_handler_breaker_recovery(&self) {
        let mut transitions = self.handler_breaker.subscribe();
        let wait_for_recovery = async {
            loop {
                match transitions.recv().await {
                    Ok(transition) if !matches!(transition.state, CircuitState::Open) => return,
                    Ok(_) => continue,
                    Err(_) => return,
                }
            }
        };
        tokio::select! {
            () = wait_for_recovery => {}
            _ = tokio::time::sleep(Duration::from_secs(30)) => {}
            () = self.cancellation.cancelled() => {}
        }
    }

    /// Whether the pull loop should keep suspending on the handler breaker
    /// (Invariant 6: only while it is actually `OPEN`). Once `resetTimeout`
    /// has elapsed the breaker is due for a half-open probe, but that
    /// transition only happens lazily inside `call()` (breaker.rs), so the
    /// loop must let one dequeue/dispatch through here to give `call()` a
    /// chance to run and drive `Open -> HalfOpen` itself (§4.2, §4.4.4).
    fn handler_breaker_should_suspend(&self) -> bool {
        if self.handler_breaker.state() != CircuitState::Open {
            return false;
        }
        match self.handler_breaker.metrics().next_recovery_attempt {
            Some(next) => crate::Timestamp::now() < next,
            None => true,
        }
    }

    async fn run_pull_loop(self: Arc<Self>) {
        let mut consecutive_empty_polls: u64 = 0;

        while self.running.load(Ordering::SeqCst) {
            if self.handler_breaker_should_suspend() {
                self.wait_for_handler_breaker_recovery().await;
                continue;
            }

            let dequeue_result = self
                .dequeue_breaker
                .call(|| {
                    let consumer = Arc::clone(&self.consumer);
                    let stage_type = self.stage_type.clone();
                    async move { consumer.dequeue_task(&stage_type).await }
                })
                .await;

            let task = match dequeue_result {
                Err(error) => {
                    self.events.emit(WorkerEvent::Error {
                        location: "dequeue",
                        error: error.to_string(),
                        stage_type: self.stage_type.clone(),
                    });
                    self.sleep_backoff().await;
                    continue;
                }
                Ok(None) => {
                    consecutive_empty_polls += 1;
                    self.events.emit(WorkerEvent::QueueEmpty {
                        stage_type: self.stage_type.clone(),
                        consecutive_empty_polls,
                    });
                    self.sleep_backoff().await;
                    continue;
                }
                Ok(Some(task)) => {
                    consecutive_empty_polls = 0;
                    self.reset_backoff().await;
                    task
                }
            };

            let permit = tokio::select! {
                permit = Arc::clone(&self.semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                () = self.cancellation.cancelled() => break,
            };

            if !self.running.load(Ordering::SeqCst) {
                // Shutdown raced the slot acquisition; the server will
                // eventually time this task out, so it is not marked.
                drop(permit);
                continue;
            }

            let inner = Arc::clone(&self);
            let handle = tokio::spawn(async move { inner.execute_task(task, permit).await });
            self.running_tasks.lock().await.push(handle);
        }
    }

    async fn build_handler_context(&self, task: &Task) -> Result<HandlerContext, WorkerError> {
        let stage = self.api_client.get_stage(&task.stage_id).await?;
        let job = self.api_client.get_job(&stage.job_id).await?;

        let links = link_entity_contexts(
            (task.traceparent.as_deref(), task.tracestate.as_deref()),
            (stage.traceparent.as_deref(), None),
            (job.traceparent.as_deref(), None),
        );
        tracing::debug!(
            stage_type = %self.stage_type,
            task_id = %task.id,
            link_count = links.len(),
            "linked task execution span to ancestor trace contexts"
        );

        Ok(HandlerContext::new(
            self.cancellation.clone(),
            Arc::clone(&self.logger),
            Arc::clone(&self.producer),
            Arc::clone(&self.api_client),
            task.id.clone(),
            stage,
            job,
        ))
    }

    async fn execute_task(self: Arc<Self>, task: Task, _permit: OwnedSemaphorePermit) {
        let task_id = task.id.clone();
        let stage_type = self.stage_type.clone();
        let span = tracing::info_span!("task_execution", stage_type = %stage_type, task_id = %task_id);

        async move {
            self.events.emit(WorkerEvent::TaskStarted {
                task_id: task_id.clone(),
                stage_type: stage_type.clone(),
            });
            tracing::info!("task started");
            let started_at = std::time::Instant::now();

            let context = match self.build_handler_context(&task).await {
                Ok(context) => context,
                Err(error) => {
                    self.events.emit(WorkerEvent::TaskFailed {
                        task_id: task_id.clone(),
                        stage_type: stage_type.clone(),
                        error: error.to_string(),
                    });
                    self.settle_failed(&task_id).await;
                    return;
                }
            };

            let handler = Arc::clone(&self.handler);
            let handler_task = task.clone();
            let result = self
                .handler_breaker
                .call(move || async move { (handler)(handler_task, context).await })
                .await;

            match result {
                Ok(()) => {
                    let duration = started_at.elapsed();
                    if let Err(error) = self.consumer.mark_task_completed(&task_id).await {
                        self.events.emit(WorkerEvent::Error {
                            location: "markTaskCompleted",
                            error: error.to_string(),
                            stage_type: stage_type.clone(),
                        });
                    }
                    tracing::info!(duration_ms = duration.as_millis() as u64, "task completed");
                    self.events.emit(WorkerEvent::TaskCompleted {
                        task_id,
                        stage_type,
                        duration,
                    });
                }
                Err(breaker_error) => {
                    tracing::warn!(error = %breaker_error, "task failed");
                    self.events.emit(WorkerEvent::TaskFailed {
                        task_id: task_id.clone(),
                        stage_type: stage_type.clone(),
                        error: breaker_error.to_string(),
                    });
                    self.settle_failed(&task_id).await;
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn settle_failed(&self, task_id: &TaskId) {
        if let Err(error) = self.consumer.mark_task_failed(task_id).await {
            self.events.emit(WorkerEvent::Error {
                location: "markTaskFailed",
                error: error.to_string(),
                stage_type: self.stage_type.clone(),
            });
        }
    }

    fn spawn_breaker_watcher(
        inner: Arc<Self>,
        breaker: &'static str,
        mut transitions: broadcast::Receiver<crate::circuit_breaker::CircuitTransition>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    received = transitions.recv() => {
                        match received {
                            Ok(transition) => inner.on_breaker_transition(breaker, transition.state).await,
                            Err(broadcast::error::RecvError::Lagged(_)) => continue,
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                    () = inner.cancellation.cancelled() => break,
                }
            }
        })
    }

    async fn on_breaker_transition(&self, breaker: &'static str, state: CircuitState) {
        if matches!(state, CircuitState::Open) {
            tracing::warn!(stage_type = %self.stage_type, breaker, "circuit breaker opened");
            self.events.emit(WorkerEvent::CircuitBreakerOpened {
                breaker,
                stage_type: self.stage_type.clone(),
            });
        } else {
            tracing::info!(stage_type = %self.stage_type, breaker, ?state, "circuit breaker closed");
            self.events.emit(WorkerEvent::CircuitBreakerClosed {
                breaker,
                stage_type: self.stage_type.clone(),
            });
            // Invariant 5 / §4.4.4: the backoff counter resets exactly when
            // the *handler* breaker recovers, not the dequeue breaker — a
            // dequeue-breaker close during a server outage must not erase
            // backoff progress paced by repeated dequeue failures.
            if breaker == "task-handler" {
                self.reset_backoff().await;
            }
        }
    }
}

/// Owns a single `stage_type`'s pull-dispatch-await loop (§4.4).
///
/// Cloning a `Worker` shares the same underlying loop and event bus — there
/// is exactly one running loop per constructed `Worker`, regardless of how
/// many handles exist.
#[derive(Clone)]
pub struct Worker {
    inner: Arc<Inner>,
    loop_handle: Arc<StdMutex<Option<JoinHandle<()>>>>,
    watcher_handles: Arc<StdMutex<Vec<JoinHandle<()>>>>,
}

impl Worker {
    pub fn new(config: WorkerConfig) -> Self {
        let handler_breaker = Arc::new(DefaultCircuitBreaker::new(
            config.task_handler_circuit_breaker,
        ));
        let dequeue_breaker = Arc::new(DefaultCircuitBreaker::new(
            config.dequeue_task_circuit_breaker,
        ));
        let consumer: Arc<dyn Consumer> = Arc::new(DefaultConsumer::new(Arc::clone(&config.api_client)));

        let inner = Arc::new(Inner {
            stage_type: config.stage_type,
            handler: config.handler,
            concurrency: config.concurrency,
            logger: config.logger,
            api_client: config.api_client,
            producer: config.producer,
            consumer,
            handler_breaker,
            dequeue_breaker,
            backoff: TokioMutex::new(ExponentialBackoff::new(config.backoff_options)),
            semaphore: Arc::new(Semaphore::new(config.concurrency.max(1))),
            cancellation: CancellationToken::new(),
            running: AtomicBool::new(false),
            events: WorkerEventBus::new(),
            running_tasks: TokioMutex::new(Vec::new()),
        });

        Self {
            inner,
            loop_handle: Arc::new(StdMutex::new(None)),
            watcher_handles: Arc::new(StdMutex::new(Vec::new())),
        }
    }

    /// Register a listener for every event this worker emits (§4.5).
    pub fn on<F>(&self, listener: F) -> crate::events::ListenerId
    where
        F: Fn(&WorkerEvent) + Send + Sync + 'static,
    {
        self.inner.events.on(listener)
    }

    pub fn once<F>(&self, listener: F) -> crate::events::ListenerId
    where
        F: Fn(&WorkerEvent) + Send + Sync + 'static,
    {
        self.inner.events.once(listener)
    }

    pub fn off(&self, id: crate::events::ListenerId) {
        self.inner.events.off(id)
    }

    pub fn remove_all_listeners(&self) {
        self.inner.events.remove_all_listeners()
    }

    /// Begin the pull loop. A no-op if already running.
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut watchers = self.watcher_handles.lock().unwrap_or_else(|e| e.into_inner());
        watchers.push(Inner::spawn_breaker_watcher(
            Arc::clone(&self.inner),
            "task-handler",
            self.inner.handler_breaker.subscribe(),
        ));
        watchers.push(Inner::spawn_breaker_watcher(
            Arc::clone(&self.inner),
            "dequeue-task",
            self.inner.dequeue_breaker.subscribe(),
        ));
        drop(watchers);

        tracing::info!(stage_type = %self.inner.stage_type, concurrency = self.inner.concurrency, "worker started");
        self.inner.events.emit(WorkerEvent::Started {
            stage_type: self.inner.stage_type.clone(),
            concurrency: self.inner.concurrency,
        });

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move { inner.run_pull_loop().await });
        *self.loop_handle.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    /// Stop the worker (§4.4.3). Idempotent: a second call is a no-op.
    /// Does not return until every in-flight handler has settled.
    pub async fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }

        let running_count = self.inner.running_tasks.lock().await.len();
        tracing::info!(stage_type = %self.inner.stage_type, running_tasks = running_count, "worker stopping");
        self.inner.events.emit(WorkerEvent::Stopping {
            stage_type: self.inner.stage_type.clone(),
            running_tasks: running_count,
        });

        self.inner.cancellation.cancel();

        let loop_handle = self.loop_handle.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = loop_handle {
            let _ = handle.await;
        }

        let in_flight: Vec<JoinHandle<()>> = self.inner.running_tasks.lock().await.drain(..).collect();
        for handle in in_flight {
            let _ = handle.await;
        }

        let watchers: Vec<JoinHandle<()>> = self
            .watcher_handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for handle in watchers {
            handle.abort();
        }

        tracing::info!(stage_type = %self.inner.stage_type, "worker stopped");
        self.inner.events.emit(WorkerEvent::Stopped {
            stage_type: self.inner.stage_type.clone(),
        });
    }

    /// Current handler-breaker state, exposed for diagnostics and tests.
    pub fn handler_breaker_state(&self) -> CircuitState {
        self.inner.handler_breaker.state()
    }

    /// Current dequeue-breaker state, exposed for diagnostics and tests.
    pub fn dequeue_breaker_state(&self) -> CircuitState {
        self.inner.dequeue_breaker.state()
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
