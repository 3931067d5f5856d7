//! Exercises the generated `MockApiClient` directly, the way the rest of
//! the crate prefers a small hand-written fake but reaches for `mockall`
//! when a test only cares about one or two calls in isolation.

use super::*;
use crate::error::ApiErrorCode;
use crate::ids::{StageId, TaskId, Timestamp};
use crate::model::TaskStatus;

fn fixture_task() -> Task {
    Task {
        id: TaskId::new("task-1").unwrap(),
        stage_id: StageId::new("stage-1").unwrap(),
        status: TaskStatus::InProgress,
        attempts: 1,
        max_attempts: 3,
        data: serde_json::Value::Null,
        user_metadata: None,
        creation_time: Timestamp::now(),
        update_time: Timestamp::now(),
        traceparent: None,
        tracestate: None,
    }
}

#[tokio::test]
async fn mock_dequeue_task_returns_the_configured_task() {
    let task = fixture_task();
    let expected_id = task.id.clone();

    let mut mock = MockApiClient::new();
    mock.expect_dequeue_task()
        .withf(|stage_type: &str| stage_type == "image-resize")
        .returning(move |_| Ok(Some(task.clone())));

    let result = mock.dequeue_task("image-resize").await.unwrap();
    assert_eq!(result.map(|t| t.id), Some(expected_id));
}

#[tokio::test]
async fn mock_get_stage_surfaces_a_not_found_api_error() {
    let mut mock = MockApiClient::new();
    mock.expect_get_stage().returning(|_| {
        Err(APIError {
            status_code: 404,
            api_error_code: Some(ApiErrorCode::Unknown("STAGE_NOT_FOUND".to_string())),
            message: "no such stage".to_string(),
        })
    });

    let result = mock.get_stage(&StageId::new("missing").unwrap()).await;
    let error = result.expect_err("stage lookup should fail");
    assert_eq!(error.status_code, 404);
}

#[tokio::test]
async fn mock_update_task_status_records_the_call() {
    let mut mock = MockApiClient::new();
    mock.expect_update_task_status()
        .times(1)
        .withf(|_task_id: &TaskId, status: &TaskOutcomeStatus| {
            *status == TaskOutcomeStatus::Completed
        })
        .returning(|_, _| Ok(()));

    mock.update_task_status(&TaskId::new("task-1").unwrap(), TaskOutcomeStatus::Completed)
        .await
        .expect("status update should succeed");
}
