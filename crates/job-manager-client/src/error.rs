//! Translation from `reqwest`/HTTP failures into the `job-worker-core`
//! error taxonomy (§7), plus this crate's own construction-time errors.

use job_worker_core::{APIError, ApiErrorCode, NetworkError};
use serde::Deserialize;
use thiserror::Error;

/// Construction-time failure building a [`crate::JobManagerClient`].
#[derive(Debug, Error, Clone)]
pub enum ClientError {
    #[error("invalid base URL: {value}")]
    InvalidUrl { value: String },
}

/// Shape of the Job Manager's structured error body, when present.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn parse_api_error_code(code: &str) -> ApiErrorCode {
    match code {
        "TASK_NOT_FOUND" => ApiErrorCode::TaskNotFound,
        "ILLEGAL_TASK_STATUS_TRANSITION" => ApiErrorCode::IllegalTaskStatusTransition,
        "VALIDATION_ERROR" => ApiErrorCode::ValidationError,
        other => ApiErrorCode::Unknown(other.to_string()),
    }
}

/// Build an [`APIError`] from a non-success HTTP response's status and body.
///
/// The Job Manager's structured error body is `{"code": "...",
/// "message": "..."}`; a response that isn't that shape still yields an
/// `APIError` with `api_error_code: None` and the raw body as `message`.
pub fn api_error_from_response(status_code: u16, body: &str) -> APIError {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => APIError {
            status_code,
            api_error_code: parsed.code.as_deref().map(parse_api_error_code),
            message: parsed.message.unwrap_or_else(|| body.to_string()),
        },
        Err(_) => APIError {
            status_code,
            api_error_code: None,
            message: if body.is_empty() {
                "<empty body>".to_string()
            } else {
                body.to_string()
            },
        },
    }
}

/// Classify a transport-level `reqwest::Error` (one that never produced an
/// HTTP response) into the domain [`NetworkError`] taxonomy.
pub fn network_error_from_reqwest(error: &reqwest::Error) -> NetworkError {
    if error.is_timeout() {
        NetworkError::Timeout
    } else if error.is_connect() {
        NetworkError::ConnectionRefused
    } else if error.is_request() {
        NetworkError::Unknown {
            message: error.to_string(),
        }
    } else {
        NetworkError::Unknown {
            message: error.to_string(),
        }
    }
}

/// Turn a transport-level failure into an [`APIError`] so every
/// [`crate::JobManagerClient`] method can return the single `APIError` type
/// the `ApiClient` trait expects, with status `0` marking "never reached the
/// server" the way the teacher's `ApiError::HttpClientError` folds transport
/// failures into the same enum as structured API errors.
pub fn api_error_from_transport(error: &reqwest::Error) -> APIError {
    let network = network_error_from_reqwest(error);
    APIError {
        status_code: 0,
        api_error_code: None,
        message: network.to_string(),
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
