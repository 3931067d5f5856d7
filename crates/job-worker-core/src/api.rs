//! The narrow subset of the Job Manager's HTTP+JSON control plane (§6.1)
//! that the Worker runtime consumes.
//!
//! This crate only defines the trait; the concrete `reqwest`-based
//! implementation lives in the `job-manager-client` crate so `job-worker-core`
//! stays free of a transport dependency and so tests can substitute a mock
//! (via `mockall`) or an in-memory fake.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::APIError;
use crate::ids::{JobId, StageId, TaskId};
use crate::model::{Job, Stage, Task, TaskOutcomeStatus};

/// Request body for `POST /jobs`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    pub name: String,
    pub priority: crate::model::Priority,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceparent: Option<String>,
}

/// Request body for `POST /jobs/{jobId}/stage`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStageRequest {
    #[serde(rename = "type")]
    pub stage_type: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceparent: Option<String>,
}

/// Request body for `POST /stages/{stageId}/tasks`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub max_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceparent: Option<String>,
}

/// Scoped client surface passed into `HandlerContext::api_client` and used
/// internally by [`crate::consumer::Consumer`] and [`crate::producer::Producer`].
///
/// Every operation maps directly onto a row in §6.1; status-code-to-error
/// mapping (404 vs. other non-success, `TASK_NOT_FOUND` vs. other API codes)
/// is the implementation's responsibility, not the caller's.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// `PATCH /stages/{stageType}/tasks/dequeue`. `Ok(None)` is the
    /// non-error "no task available" outcome (404 `TASK_NOT_FOUND`); any
    /// other failure is `Err`.
    async fn dequeue_task(&self, stage_type: &str) -> Result<Option<Task>, APIError>;

    /// `GET /tasks/{taskId}`.
    async fn get_task(&self, task_id: &TaskId) -> Result<Task, APIError>;

    /// `PUT /tasks/{taskId}/status`.
    async fn update_task_status(
        &self,
        task_id: &TaskId,
        status: TaskOutcomeStatus,
    ) -> Result<(), APIError>;

    /// `GET /stages/{stageId}`.
    async fn get_stage(&self, stage_id: &StageId) -> Result<Stage, APIError>;

    /// `GET /jobs/{jobId}`.
    async fn get_job(&self, job_id: &JobId) -> Result<Job, APIError>;

    /// `PATCH /jobs/{jobId}/user-metadata`.
    async fn update_job_user_metadata(&self, job_id: &JobId, metadata: Value)
        -> Result<(), APIError>;

    /// `PATCH /stages/{stageId}/user-metadata`.
    async fn update_stage_user_metadata(
        &self,
        stage_id: &StageId,
        metadata: Value,
    ) -> Result<(), APIError>;

    /// `PATCH /tasks/{taskId}/user-metadata`.
    async fn update_task_user_metadata(
        &self,
        task_id: &TaskId,
        metadata: Value,
    ) -> Result<(), APIError>;

    /// `POST /jobs`. Producer-path operation (§13.3).
    async fn create_job(&self, request: CreateJobRequest) -> Result<Job, APIError>;

    /// `POST /jobs/{jobId}/stage`. Producer-path operation.
    async fn create_stage(
        &self,
        job_id: &JobId,
        request: CreateStageRequest,
    ) -> Result<Stage, APIError>;

    /// `POST /stages/{stageId}/tasks`. Producer-path operation.
    async fn create_task(
        &self,
        stage_id: &StageId,
        request: CreateTaskRequest,
    ) -> Result<Task, APIError>;
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
