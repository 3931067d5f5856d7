//! `reqwest`-based implementation of [`job_worker_core::api::ApiClient`]
//! against the Job Manager's HTTP+JSON control plane (§6.1, §13.1).
//!
//! Built the way the teacher's `GitHubClient` is: a `ClientConfig`/builder
//! pair, a shared `reqwest::Client`, one method per wire operation, and a
//! [`RetryPolicy`] applied around transient failures before the caller ever
//! sees an error. This retry layer is distinct from, and sits underneath,
//! the Worker's own circuit breakers (`job_worker_core::circuit_breaker`):
//! it smooths over a single flaky call, the breakers reason about sustained
//! failure rate across many calls.

mod retry;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use job_worker_core::api::{ApiClient, CreateJobRequest, CreateStageRequest, CreateTaskRequest};
use job_worker_core::{APIError, Job, JobId, Stage, StageId, Task, TaskId, TaskOutcomeStatus};

pub use retry::{is_transient_status, RetryPolicy};

use crate::error::{api_error_from_response, api_error_from_transport, ClientError};

/// Configuration for [`JobManagerClient`] (§13.1, §12 "ambient stack —
/// configuration").
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the Job Manager control plane, e.g. `https://jobs.example.com`.
    pub base_url: String,
    /// User agent string sent with every request.
    pub user_agent: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retry policy applied to transient failures (5xx, 429, transport errors).
    pub retry_policy: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            user_agent: "job-manager-client/0.1.0".to_string(),
            timeout: Duration::from_secs(30),
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl ClientConfig {
    pub fn builder(base_url: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder::new(base_url)
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }
}

/// Builder for [`ClientConfig`], mirroring the teacher's
/// `ClientConfigBuilder`/`GitHubClientBuilder` shape.
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    fn new(base_url: impl Into<String>) -> Self {
        Self {
            config: ClientConfig {
                base_url: base_url.into(),
                ..ClientConfig::default()
            },
        }
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.config.retry_policy = retry_policy;
        self
    }

    pub fn build(self) -> Result<JobManagerClient, ClientError> {
        JobManagerClient::new(self.config)
    }
}

/// Typed HTTP client over the narrow slice of the Job Manager's OpenAPI
/// surface the Worker runtime consumes (§6.1).
#[derive(Clone)]
pub struct JobManagerClient {
    http_client: reqwest::Client,
    config: ClientConfig,
}

impl JobManagerClient {
    pub fn builder(base_url: impl Into<String>) -> ClientConfigBuilder {
        ClientConfig::builder(base_url)
    }

    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        if url::Url::parse(&config.base_url).is_err() {
            return Err(ClientError::InvalidUrl {
                value: config.base_url.clone(),
            });
        }

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ClientError::InvalidUrl {
                value: format!("failed to build http client: {e}"),
            })?;

        Ok(Self { http_client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Issue `method url`, optionally with a JSON `body`, retrying transient
    /// failures per `self.config.retry_policy` before handing the final
    /// outcome back as an [`APIError`] (non-2xx or transport failure).
    async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, APIError> {
        let mut attempt = 0;
        loop {
            let mut builder = self.http_client.request(method.clone(), url);
            if let Some(body) = body {
                builder = builder.json(body);
            }

            match builder.send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status().as_u16();
                    if is_transient_status(status) && self.config.retry_policy.should_retry(attempt)
                    {
                        tracing::debug!(url, status, attempt, "retrying transient API failure");
                        tokio::time::sleep(self.config.retry_policy.calculate_delay(attempt + 1))
                            .await;
                        attempt += 1;
                        continue;
                    }
                    let text = response.text().await.unwrap_or_default();
                    return Err(api_error_from_response(status, &text));
                }
                Err(error) => {
                    if self.config.retry_policy.should_retry(attempt) {
                        tracing::debug!(url, attempt, error = %error, "retrying after transport failure");
                        tokio::time::sleep(self.config.retry_policy.calculate_delay(attempt + 1))
                            .await;
                        attempt += 1;
                        continue;
                    }
                    return Err(api_error_from_transport(&error));
                }
            }
        }
    }

    async fn request_json<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<T, APIError> {
        let response = self.request(method, url, body).await?;
        response.json::<T>().await.map_err(|e| APIError {
            status_code: 200,
            api_error_code: None,
            message: format!("failed to parse response body: {e}"),
        })
    }
}

#[async_trait]
impl ApiClient for JobManagerClient {
    async fn dequeue_task(&self, stage_type: &str) -> Result<Option<Task>, APIError> {
        let url = self.url(&format!("/stages/{stage_type}/tasks/dequeue"));
        match self
            .request_json::<Task>(Method::PATCH, &url, None)
            .await
        {
            Ok(task) => Ok(Some(task)),
            Err(error) if error.status_code == 404 => Ok(None),
            Err(error) => Err(error),
        }
    }

    async fn get_task(&self, task_id: &TaskId) -> Result<Task, APIError> {
        let url = self.url(&format!("/tasks/{task_id}"));
        self.request_json(Method::GET, &url, None).await
    }

    async fn update_task_status(
        &self,
        task_id: &TaskId,
        status: TaskOutcomeStatus,
    ) -> Result<(), APIError> {
        let url = self.url(&format!("/tasks/{task_id}/status"));
        let body = serde_json::json!({ "status": status });
        self.request(Method::PUT, &url, Some(&body)).await?;
        Ok(())
    }

    async fn get_stage(&self, stage_id: &StageId) -> Result<Stage, APIError> {
        let url = self.url(&format!("/stages/{stage_id}"));
        self.request_json(Method::GET, &url, None).await
    }

    async fn get_job(&self, job_id: &JobId) -> Result<Job, APIError> {
        let url = self.url(&format!("/jobs/{job_id}"));
        self.request_json(Method::GET, &url, None).await
    }

    async fn update_job_user_metadata(
        &self,
        job_id: &JobId,
        metadata: Value,
    ) -> Result<(), APIError> {
        let url = self.url(&format!("/jobs/{job_id}/user-metadata"));
        self.request(Method::PATCH, &url, Some(&metadata)).await?;
        Ok(())
    }

    async fn update_stage_user_metadata(
        &self,
        stage_id: &StageId,
        metadata: Value,
    ) -> Result<(), APIError> {
        let url = self.url(&format!("/stages/{stage_id}/user-metadata"));
        self.request(Method::PATCH, &url, Some(&metadata)).await?;
        Ok(())
    }

    async fn update_task_user_metadata(
        &self,
        task_id: &TaskId,
        metadata: Value,
    ) -> Result<(), APIError> {
        let url = self.url(&format!("/tasks/{task_id}/user-metadata"));
        self.request(Method::PATCH, &url, Some(&metadata)).await?;
        Ok(())
    }

    async fn create_job(&self, request: CreateJobRequest) -> Result<Job, APIError> {
        let url = self.url("/jobs");
        let body = serde_json::to_value(&request).map_err(|e| APIError {
            status_code: 0,
            api_error_code: None,
            message: format!("failed to serialize request: {e}"),
        })?;
        self.request_json(Method::POST, &url, Some(&body)).await
    }

    async fn create_stage(
        &self,
        job_id: &JobId,
        request: CreateStageRequest,
    ) -> Result<Stage, APIError> {
        let url = self.url(&format!("/jobs/{job_id}/stage"));
        let body = serde_json::to_value(&request).map_err(|e| APIError {
            status_code: 0,
            api_error_code: None,
            message: format!("failed to serialize request: {e}"),
        })?;
        self.request_json(Method::POST, &url, Some(&body)).await
    }

    async fn create_task(
        &self,
        stage_id: &StageId,
        request: CreateTaskRequest,
    ) -> Result<Task, APIError> {
        let url = self.url(&format!("/stages/{stage_id}/tasks"));
        let body = serde_json::to_value(&request).map_err(|e| APIError {
            status_code: 0,
            api_error_code: None,
            message: format!("failed to serialize request: {e}"),
        })?;
        self.request_json(Method::POST, &url, Some(&body)).await
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
