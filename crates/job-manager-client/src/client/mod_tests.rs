use std::time::Duration;

use job_worker_core::api::ApiClient;
use job_worker_core::{ApiErrorCode, TaskId, TaskOutcomeStatus};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;

fn fast_retry_config(base_url: String) -> ClientConfig {
    ClientConfig {
        base_url,
        retry_policy: RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(5)),
        ..ClientConfig::default()
    }
}

fn task_body() -> serde_json::Value {
    serde_json::json!({
        "id": "t1",
        "stageId": "s1",
        "status": "IN_PROGRESS",
        "attempts": 0,
        "maxAttempts": 3,
        "data": {},
        "creationTime": "2026-01-01T00:00:00Z",
        "updateTime": "2026-01-01T00:00:00Z"
    })
}

#[tokio::test]
async fn dequeue_returns_task_on_200() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/stages/image-resize/tasks/dequeue"))
        .respond_with(ResponseTemplate::new(200).set_body_json(task_body()))
        .mount(&server)
        .await;

    let client = JobManagerClient::new(fast_retry_config(server.uri())).unwrap();
    let task = client.dequeue_task("image-resize").await.unwrap();
    assert!(task.is_some());
    assert_eq!(task.unwrap().id.as_str(), "t1");
}

#[tokio::test]
async fn dequeue_returns_none_on_404() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/stages/image-resize/tasks/dequeue"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(serde_json::json!({"code": "TASK_NOT_FOUND", "message": "empty"})),
        )
        .mount(&server)
        .await;

    let client = JobManagerClient::new(fast_retry_config(server.uri())).unwrap();
    let task = client.dequeue_task("image-resize").await.unwrap();
    assert!(task.is_none());
}

#[tokio::test]
async fn dequeue_surfaces_other_errors() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/stages/image-resize/tasks/dequeue"))
        .respond_with(ResponseTemplate::new(400).set_body_json(
            serde_json::json!({"code": "VALIDATION_ERROR", "message": "bad stage type"}),
        ))
        .mount(&server)
        .await;

    let client = JobManagerClient::new(fast_retry_config(server.uri())).unwrap();
    let error = client.dequeue_task("image-resize").await.unwrap_err();
    assert_eq!(error.status_code, 400);
    assert_eq!(error.api_error_code, Some(ApiErrorCode::ValidationError));
}

#[tokio::test]
async fn transient_5xx_is_retried_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tasks/t1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tasks/t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(task_body()))
        .mount(&server)
        .await;

    let client = JobManagerClient::new(fast_retry_config(server.uri())).unwrap();
    let task_id = TaskId::new("t1").unwrap();
    let task = client.get_task(&task_id).await.unwrap();
    assert_eq!(task.id.as_str(), "t1");
}

#[tokio::test]
async fn update_task_status_sends_expected_body() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/tasks/t1/status"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = JobManagerClient::new(fast_retry_config(server.uri())).unwrap();
    let task_id = TaskId::new("t1").unwrap();
    client
        .update_task_status(&task_id, TaskOutcomeStatus::Completed)
        .await
        .unwrap();
}

#[test]
fn rejects_invalid_base_url() {
    let result = JobManagerClient::builder("not a url").build();
    assert!(result.is_err());
}
