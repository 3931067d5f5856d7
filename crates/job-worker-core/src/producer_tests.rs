use super::*;
use std::sync::Mutex as StdMutex;

use serde_json::json;

use crate::error::APIError;
use crate::ids::{TaskId, Timestamp};
use crate::model::{TaskOutcomeStatus, TaskStatus};

#[derive(Default)]
struct RecordingApiClient {
    created_jobs: StdMutex<Vec<CreateJobRequest>>,
}

#[async_trait]
impl ApiClient for RecordingApiClient {
    async fn dequeue_task(&self, _stage_type: &str) -> Result<Option<Task>, APIError> {
        unimplemented!("not exercised by producer tests")
    }

    async fn get_task(&self, _task_id: &TaskId) -> Result<Task, APIError> {
        unimplemented!("not exercised by producer tests")
    }

    async fn update_task_status(
        &self,
        _task_id: &TaskId,
        _status: TaskOutcomeStatus,
    ) -> Result<(), APIError> {
        unimplemented!("not exercised by producer tests")
    }

    async fn get_stage(&self, _stage_id: &StageId) -> Result<Stage, APIError> {
        unimplemented!("not exercised by producer tests")
    }

    async fn get_job(&self, _job_id: &JobId) -> Result<Job, APIError> {
        unimplemented!("not exercised by producer tests")
    }

    async fn update_job_user_metadata(
        &self,
        _job_id: &JobId,
        _metadata: Value,
    ) -> Result<(), APIError> {
        unimplemented!("not exercised by producer tests")
    }

    async fn update_stage_user_metadata(
        &self,
        _stage_id: &StageId,
        _metadata: Value,
    ) -> Result<(), APIError> {
        unimplemented!("not exercised by producer tests")
    }

    async fn update_task_user_metadata(
        &self,
        _task_id: &TaskId,
        _metadata: Value,
    ) -> Result<(), APIError> {
        unimplemented!("not exercised by producer tests")
    }

    async fn create_job(&self, request: CreateJobRequest) -> Result<Job, APIError> {
        self.created_jobs.lock().unwrap().push(request.clone());
        Ok(Job {
            id: JobId::new("job-1").unwrap(),
            name: request.name,
            priority: request.priority,
            status: "CREATED".to_string(),
            data: request.data,
            user_metadata: None,
            traceparent: request.traceparent,
        })
    }

    async fn create_stage(
        &self,
        job_id: &JobId,
        request: CreateStageRequest,
    ) -> Result<Stage, APIError> {
        Ok(Stage {
            id: StageId::new("stage-1").unwrap(),
            job_id: job_id.clone(),
            stage_type: request.stage_type,
            status: "CREATED".to_string(),
            data: request.data,
            user_metadata: None,
            traceparent: request.traceparent,
        })
    }

    async fn create_task(
        &self,
        stage_id: &StageId,
        request: CreateTaskRequest,
    ) -> Result<Task, APIError> {
        Ok(Task {
            id: TaskId::new("task-1").unwrap(),
            stage_id: stage_id.clone(),
            status: TaskStatus::Created,
            attempts: 0,
            max_attempts: request.max_attempts,
            data: request.data,
            user_metadata: None,
            creation_time: Timestamp::now(),
            update_time: Timestamp::now(),
            traceparent: request.traceparent,
            tracestate: None,
        })
    }
}

#[tokio::test]
async fn create_job_rejects_null_data() {
    let producer = DefaultProducer::new(Arc::new(RecordingApiClient::default()));

    let result = producer
        .create_job("demo".to_string(), Priority::Medium, Value::Null)
        .await;

    assert!(matches!(result, Err(ProducerError::EmptyTaskData)));
}

#[tokio::test]
async fn create_job_forwards_request_to_the_api_client() {
    let producer = DefaultProducer::new(Arc::new(RecordingApiClient::default()));

    let job = producer
        .create_job("demo".to_string(), Priority::High, json!({"k": "v"}))
        .await
        .expect("create_job should succeed");

    assert_eq!(job.name, "demo");
    assert_eq!(job.priority, Priority::High);
}

#[tokio::test]
async fn create_task_rejects_null_data() {
    let producer = DefaultProducer::new(Arc::new(RecordingApiClient::default()));

    let result = producer
        .create_task(&StageId::new("stage-1").unwrap(), Value::Null, 3)
        .await;

    assert!(matches!(result, Err(ProducerError::EmptyTaskData)));
}

#[tokio::test]
async fn create_task_forwards_max_attempts() {
    let producer = DefaultProducer::new(Arc::new(RecordingApiClient::default()));

    let task = producer
        .create_task(&StageId::new("stage-1").unwrap(), json!({"k": "v"}), 5)
        .await
        .expect("create_task should succeed");

    assert_eq!(task.max_attempts, 5);
}
