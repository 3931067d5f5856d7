//! Producer (§1, §13.3): creates follow-up Jobs/Stages/Tasks.
//!
//! The spec treats the Producer's internals as out of scope, specified only
//! by the interface the Worker threads into [`crate::handler_context::HandlerContext`].
//! This crate supplies that trait plus a minimal [`DefaultProducer`] wrapping
//! an [`ApiClient`] so `HandlerContext::producer` is a real, working handle
//! rather than a placeholder — batching, idempotency keys, and dedup are
//! explicitly left to a hypothetical standalone producer SDK.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::api::{ApiClient, CreateJobRequest, CreateStageRequest, CreateTaskRequest};
use crate::error::ProducerError;
use crate::ids::{JobId, StageId};
use crate::model::{Job, Priority, Stage, Task};
use crate::trace::current_traceparent;

/// Creates new work for the Job Manager to schedule. Implementations must
/// be thread/task-safe and retain no per-call mutable state (§5, "Shared
/// resources") since the same instance is shared across every
/// `HandlerContext` a worker builds.
#[async_trait]
pub trait Producer: Send + Sync {
    async fn create_job(
        &self,
        name: String,
        priority: Priority,
        data: Value,
    ) -> Result<Job, ProducerError>;

    async fn create_stage(
        &self,
        job_id: &JobId,
        stage_type: String,
        data: Value,
    ) -> Result<Stage, ProducerError>;

    async fn create_task(
        &self,
        stage_id: &StageId,
        data: Value,
        max_attempts: u32,
    ) -> Result<Task, ProducerError>;
}

/// Default [`Producer`] implementation: wraps an [`ApiClient`] and injects
/// the current trace context into each created entity (§4.6) so server-side
/// storage preserves the parent span.
pub struct DefaultProducer {
    api_client: Arc<dyn ApiClient>,
}

impl DefaultProducer {
    pub fn new(api_client: Arc<dyn ApiClient>) -> Self {
        Self { api_client }
    }
}

#[async_trait]
impl Producer for DefaultProducer {
    async fn create_job(
        &self,
        name: String,
        priority: Priority,
        data: Value,
    ) -> Result<Job, ProducerError> {
        if data.is_null() {
            return Err(ProducerError::EmptyTaskData);
        }
        self.api_client
            .create_job(CreateJobRequest {
                name,
                priority,
                data,
                traceparent: current_traceparent(),
            })
            .await
            .map_err(|cause| ProducerError::RequestFailed {
                cause: cause.to_string(),
            })
    }

    async fn create_stage(
        &self,
        job_id: &JobId,
        stage_type: String,
        data: Value,
    ) -> Result<Stage, ProducerError> {
        self.api_client
            .create_stage(
                job_id,
                CreateStageRequest {
                    stage_type,
                    data,
                    traceparent: current_traceparent(),
                },
            )
            .await
            .map_err(|cause| ProducerError::RequestFailed {
                cause: cause.to_string(),
            })
    }

    async fn create_task(
        &self,
        stage_id: &StageId,
        data: Value,
        max_attempts: u32,
    ) -> Result<Task, ProducerError> {
        if data.is_null() {
            return Err(ProducerError::EmptyTaskData);
        }
        self.api_client
            .create_task(
                stage_id,
                CreateTaskRequest {
                    data,
                    max_attempts,
                    traceparent: current_traceparent(),
                },
            )
            .await
            .map_err(|cause| ProducerError::RequestFailed {
                cause: cause.to_string(),
            })
    }
}

#[cfg(test)]
#[path = "producer_tests.rs"]
mod tests;
