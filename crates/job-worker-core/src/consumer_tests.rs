use super::*;
use std::sync::Mutex as StdMutex;

use serde_json::Value;

use crate::api::{CreateJobRequest, CreateStageRequest, CreateTaskRequest};
use crate::ids::{JobId, StageId, Timestamp};
use crate::model::{Job, Stage, TaskStatus};

struct FakeApiClient {
    task: StdMutex<Option<Task>>,
    dequeue_result: StdMutex<Option<Result<Option<Task>, APIError>>>,
    status_update_result: StdMutex<Option<Result<(), APIError>>>,
    update_calls: StdMutex<Vec<TaskOutcomeStatus>>,
}

impl FakeApiClient {
    fn with_task(task: Task) -> Self {
        Self {
            task: StdMutex::new(Some(task)),
            dequeue_result: StdMutex::new(None),
            status_update_result: StdMutex::new(None),
            update_calls: StdMutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ApiClient for FakeApiClient {
    async fn dequeue_task(&self, _stage_type: &str) -> Result<Option<Task>, APIError> {
        self.dequeue_result
            .lock()
            .unwrap()
            .take()
            .unwrap_or(Ok(None))
    }

    async fn get_task(&self, _task_id: &TaskId) -> Result<Task, APIError> {
        self.task.lock().unwrap().clone().ok_or_else(|| APIError {
            status_code: 404,
            api_error_code: None,
            message: "task not found".to_string(),
        })
    }

    async fn update_task_status(
        &self,
        _task_id: &TaskId,
        status: TaskOutcomeStatus,
    ) -> Result<(), APIError> {
        self.update_calls.lock().unwrap().push(status);
        self.status_update_result
            .lock()
            .unwrap()
            .take()
            .unwrap_or(Ok(()))
    }

    async fn get_stage(&self, _stage_id: &StageId) -> Result<Stage, APIError> {
        unimplemented!("not exercised by consumer tests")
    }

    async fn get_job(&self, _job_id: &JobId) -> Result<Job, APIError> {
        unimplemented!("not exercised by consumer tests")
    }

    async fn update_job_user_metadata(
        &self,
        _job_id: &JobId,
        _metadata: Value,
    ) -> Result<(), APIError> {
        unimplemented!("not exercised by consumer tests")
    }

    async fn update_stage_user_metadata(
        &self,
        _stage_id: &StageId,
        _metadata: Value,
    ) -> Result<(), APIError> {
        unimplemented!("not exercised by consumer tests")
    }

    async fn update_task_user_metadata(
        &self,
        _task_id: &TaskId,
        _metadata: Value,
    ) -> Result<(), APIError> {
        unimplemented!("not exercised by consumer tests")
    }

    async fn create_job(&self, _request: CreateJobRequest) -> Result<Job, APIError> {
        unimplemented!("not exercised by consumer tests")
    }

    async fn create_stage(
        &self,
        _job_id: &JobId,
        _request: CreateStageRequest,
    ) -> Result<Stage, APIError> {
        unimplemented!("not exercised by consumer tests")
    }

    async fn create_task(
        &self,
        _stage_id: &StageId,
        _request: CreateTaskRequest,
    ) -> Result<Task, APIError> {
        unimplemented!("not exercised by consumer tests")
    }
}

fn task_with_status(status: TaskStatus) -> Task {
    Task {
        id: TaskId::new("task-1").unwrap(),
        stage_id: StageId::new("stage-1").unwrap(),
        status,
        attempts: 1,
        max_attempts: 3,
        data: Value::Null,
        user_metadata: None,
        creation_time: Timestamp::now(),
        update_time: Timestamp::now(),
        traceparent: None,
        tracestate: None,
    }
}

#[tokio::test]
async fn mark_task_completed_updates_status_when_task_is_in_progress() {
    let client = Arc::new(FakeApiClient::with_task(task_with_status(
        TaskStatus::InProgress,
    )));
    let consumer = DefaultConsumer::new(client.clone());

    consumer
        .mark_task_completed(&TaskId::new("task-1").unwrap())
        .await
        .expect("mark_task_completed should succeed");

    assert_eq!(
        client.update_calls.lock().unwrap().as_slice(),
        [TaskOutcomeStatus::Completed]
    );
}

#[tokio::test]
async fn mark_task_failed_updates_status_when_task_is_in_progress() {
    let client = Arc::new(FakeApiClient::with_task(task_with_status(
        TaskStatus::InProgress,
    )));
    let consumer = DefaultConsumer::new(client.clone());

    consumer
        .mark_task_failed(&TaskId::new("task-1").unwrap())
        .await
        .expect("mark_task_failed should succeed");

    assert_eq!(
        client.update_calls.lock().unwrap().as_slice(),
        [TaskOutcomeStatus::Failed]
    );
}

#[tokio::test]
async fn mark_task_completed_fails_locally_without_a_write_when_not_in_progress() {
    let client = Arc::new(FakeApiClient::with_task(task_with_status(
        TaskStatus::Completed,
    )));
    let consumer = DefaultConsumer::new(client.clone());

    let result = consumer
        .mark_task_completed(&TaskId::new("task-1").unwrap())
        .await;

    assert!(matches!(
        result,
        Err(ConsumerError::IllegalLocalTransition {
            observed: TaskStatus::Completed
        })
    ));
    assert!(client.update_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn mark_task_completed_surfaces_retrieve_failure() {
    let client = Arc::new(FakeApiClient {
        task: StdMutex::new(None),
        dequeue_result: StdMutex::new(None),
        status_update_result: StdMutex::new(None),
        update_calls: StdMutex::new(Vec::new()),
    });
    let consumer = DefaultConsumer::new(client.clone());

    let result = consumer
        .mark_task_completed(&TaskId::new("task-1").unwrap())
        .await;

    assert!(matches!(result, Err(ConsumerError::RetrieveFailed { .. })));
}

#[tokio::test]
async fn mark_task_completed_surfaces_status_update_failure() {
    let client = Arc::new(FakeApiClient::with_task(task_with_status(
        TaskStatus::InProgress,
    )));
    *client.status_update_result.lock().unwrap() = Some(Err(APIError {
        status_code: 400,
        api_error_code: Some(crate::error::ApiErrorCode::IllegalTaskStatusTransition),
        message: "already settled".to_string(),
    }));
    let consumer = DefaultConsumer::new(client.clone());

    let result = consumer
        .mark_task_completed(&TaskId::new("task-1").unwrap())
        .await;

    assert!(matches!(result, Err(ConsumerError::StatusUpdateFailed { .. })));
}

#[tokio::test]
async fn dequeue_task_maps_no_task_available_to_none() {
    let client = Arc::new(FakeApiClient::with_task(task_with_status(
        TaskStatus::InProgress,
    )));
    *client.dequeue_result.lock().unwrap() = Some(Ok(None));
    let consumer = DefaultConsumer::new(client);

    let result = consumer.dequeue_task("image-resize").await;

    assert!(matches!(result, Ok(None)));
}

#[tokio::test]
async fn dequeue_task_wraps_api_failures_as_request_failed() {
    let client = Arc::new(FakeApiClient::with_task(task_with_status(
        TaskStatus::InProgress,
    )));
    *client.dequeue_result.lock().unwrap() = Some(Err(APIError {
        status_code: 500,
        api_error_code: None,
        message: "boom".to_string(),
    }));
    let consumer = DefaultConsumer::new(client);

    let result = consumer.dequeue_task("image-resize").await;

    assert!(matches!(result, Err(ConsumerError::RequestFailed { .. })));
}
