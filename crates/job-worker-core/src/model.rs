//! Domain model: the Job → Stage → Task hierarchy as observed by the
//! consumer side of the system. The server owns the full lifecycle; these
//! types describe the shapes the worker reads off the wire (§3).

use serde::{Deserialize, Serialize};

use crate::ids::{JobId, StageId, TaskId, Timestamp};

/// Task lifecycle status as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Created,
    Pending,
    InProgress,
    Completed,
    Failed,
    Retried,
}

/// Job/stage priority, carried through to scheduling decisions made by the
/// server; the worker treats it as opaque context on `Job`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

/// A unit of work claimed from the server. `data` and `user_metadata` are
/// intentionally untyped (`serde_json::Value`): the payload shape is owned
/// by the stage type, not by this crate (§9, polymorphic `stageType`
/// design note — this is the opaque-JSON fallback).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub stage_id: StageId,
    pub status: TaskStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_metadata: Option<serde_json::Value>,
    pub creation_time: Timestamp,
    pub update_time: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceparent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracestate: Option<String>,
}

impl Task {
    /// The local precondition the consumer enforces before reporting an
    /// outcome: the last-observed status must be `IN_PROGRESS` (§4.3).
    pub fn is_in_progress(&self) -> bool {
        matches!(self.status, TaskStatus::InProgress)
    }
}

/// A stage within a job, grouping tasks of one `stage_type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub id: StageId,
    pub job_id: JobId,
    #[serde(rename = "type")]
    pub stage_type: String,
    pub status: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_metadata: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceparent: Option<String>,
}

/// The top-level unit of work a stage belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub priority: Priority,
    pub status: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_metadata: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceparent: Option<String>,
}

/// Body sent on a task status update (§6.1, `PUT /tasks/{taskId}/status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskOutcomeStatus {
    Completed,
    Failed,
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
