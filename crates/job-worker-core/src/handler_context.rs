//! Per-task bundle (§3 `HandlerContext`) handed to the user's handler.
//!
//! The context is assembled once per dispatched task and does not outlive
//! the handler invocation: it carries the worker's shared cancellation
//! token, a logging capability, the producer handle, a scoped API client,
//! and snapshots of the task's stage and job fetched at dispatch time.

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::api::ApiClient;
use crate::error::APIError;
use crate::ids::{JobId, StageId, TaskId};
use crate::model::{Job, Stage};
use crate::producer::Producer;

/// Logging capability injected into the worker (§6.2 `logger`), so callers
/// can substitute a test double without the runtime depending on a concrete
/// logging backend. The default implementation forwards to `tracing`.
pub trait WorkerLogger: Send + Sync {
    fn debug(&self, message: &str);
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// Default logger: forwards each call straight into a `tracing` event at
/// the matching level, the way the rest of this crate and its sibling
/// crates thread `tracing::info!`/`warn!`/`error!` through business logic
/// rather than returning log lines as data.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl WorkerLogger for TracingLogger {
    fn debug(&self, message: &str) {
        tracing::debug!("{message}");
    }

    fn info(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!("{message}");
    }
}

/// A logger that discards everything (§6.2 default when no `logger` is
/// configured).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpLogger;

impl WorkerLogger for NoOpLogger {
    fn debug(&self, _message: &str) {}
    fn info(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
}

/// Per-task bundle constructed just before invoking the user handler
/// (§3 `HandlerContext`, §4.4.2 step 2). Not persisted; its lifetime ends
/// when the handler returns or throws.
#[derive(Clone)]
pub struct HandlerContext {
    /// Cancellation signal tied to the worker's lifetime; resolves once on
    /// `stop()` (§5, "Cancellation").
    pub signal: CancellationToken,
    pub logger: Arc<dyn WorkerLogger>,
    pub producer: Arc<dyn Producer>,
    pub api_client: Arc<dyn ApiClient>,
    /// Snapshot of the task's stage, fetched at dispatch time.
    pub stage: Stage,
    /// Snapshot of the stage's job, fetched at dispatch time.
    pub job: Job,

    task_id: TaskId,
    stage_id: StageId,
    job_id: JobId,
}

impl HandlerContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        signal: CancellationToken,
        logger: Arc<dyn WorkerLogger>,
        producer: Arc<dyn Producer>,
        api_client: Arc<dyn ApiClient>,
        task_id: TaskId,
        stage: Stage,
        job: Job,
    ) -> Self {
        let stage_id = stage.id.clone();
        let job_id = job.id.clone();
        Self {
            signal,
            logger,
            producer,
            api_client,
            stage,
            job,
            task_id,
            stage_id,
            job_id,
        }
    }

    /// Replace the current task's user metadata (`PATCH
    /// /tasks/{taskId}/user-metadata`), bound to the id captured at
    /// construction — the source's `updateTaskUserMetadata` closure.
    pub async fn update_task_user_metadata(&self, metadata: Value) -> Result<(), APIError> {
        self.api_client
            .update_task_user_metadata(&self.task_id, metadata)
            .await
    }

    /// Replace the current task's stage's user metadata, bound to the
    /// stage id captured at construction.
    pub async fn update_stage_user_metadata(&self, metadata: Value) -> Result<(), APIError> {
        self.api_client
            .update_stage_user_metadata(&self.stage_id, metadata)
            .await
    }

    /// Replace the current task's job's user metadata, bound to the job id
    /// captured at construction.
    pub async fn update_job_user_metadata(&self, metadata: Value) -> Result<(), APIError> {
        self.api_client
            .update_job_user_metadata(&self.job_id, metadata)
            .await
    }
}
