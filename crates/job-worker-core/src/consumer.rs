//! Task acquisition and outcome reporting (§4.3).

use std::sync::Arc;

use async_trait::async_trait;

use crate::api::ApiClient;
use crate::error::{APIError, ConsumerError};
use crate::ids::TaskId;
use crate::model::{Task, TaskOutcomeStatus};

/// Claims tasks for a stage type and reports their outcome back to the
/// server. The `Worker`'s pull loop is the only caller; this trait exists so
/// the loop can be tested against a fake without a real `ApiClient`.
#[async_trait]
pub trait Consumer: Send + Sync {
    async fn dequeue_task(&self, stage_type: &str) -> Result<Option<Task>, ConsumerError>;
    async fn mark_task_completed(&self, task_id: &TaskId) -> Result<(), ConsumerError>;
    async fn mark_task_failed(&self, task_id: &TaskId) -> Result<(), ConsumerError>;
}

/// Default [`Consumer`], backed directly by an [`ApiClient`].
pub struct DefaultConsumer {
    api_client: Arc<dyn ApiClient>,
}

impl DefaultConsumer {
    pub fn new(api_client: Arc<dyn ApiClient>) -> Self {
        Self { api_client }
    }

    async fn mark_task(
        &self,
        task_id: &TaskId,
        outcome: TaskOutcomeStatus,
    ) -> Result<(), ConsumerError> {
        let task = self
            .api_client
            .get_task(task_id)
            .await
            .map_err(|cause| ConsumerError::RetrieveFailed {
                cause: cause.to_string(),
            })?;

        if !task.is_in_progress() {
            return Err(ConsumerError::IllegalLocalTransition {
                observed: task.status,
            });
        }

        self.api_client
            .update_task_status(task_id, outcome)
            .await
            .map_err(|cause: APIError| ConsumerError::StatusUpdateFailed {
                cause: cause.to_string(),
            })
    }
}

#[async_trait]
impl Consumer for DefaultConsumer {
    async fn dequeue_task(&self, stage_type: &str) -> Result<Option<Task>, ConsumerError> {
        self.api_client
            .dequeue_task(stage_type)
            .await
            .map_err(|cause| ConsumerError::RequestFailed {
                cause: cause.to_string(),
            })
    }

    async fn mark_task_completed(&self, task_id: &TaskId) -> Result<(), ConsumerError> {
        self.mark_task(task_id, TaskOutcomeStatus::Completed).await
    }

    async fn mark_task_failed(&self, task_id: &TaskId) -> Result<(), ConsumerError> {
        self.mark_task(task_id, TaskOutcomeStatus::Failed).await
    }
}

#[cfg(test)]
#[path = "consumer_tests.rs"]
mod tests;
