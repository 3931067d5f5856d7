//! Error taxonomy (§7). Every variant classifies whether it is transient
//! (worth retrying/backing off) so callers do not need to re-derive that
//! judgment at each call site, the same shape as the teacher's
//! `AuthError`/`ApiError::is_transient`.

use thiserror::Error;

/// Transport-layer failure reaching the Job Manager.
#[derive(Debug, Error, Clone)]
pub enum NetworkError {
    #[error("connection refused")]
    ConnectionRefused,
    #[error("request timed out")]
    Timeout,
    #[error("request cancelled")]
    Cancelled,
    #[error("request aborted: {reason}")]
    Aborted { reason: String },
    #[error("host unreachable")]
    HostUnreachable,
    #[error("dns resolution failed")]
    Dns,
    #[error("tls handshake failed")]
    Tls,
    #[error("unknown transport error: {message}")]
    Unknown { message: String },
}

impl NetworkError {
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Cancelled | Self::Aborted { .. })
    }
}

/// Server-issued error code, carried alongside the HTTP status when the
/// response body is structured JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiErrorCode {
    TaskNotFound,
    IllegalTaskStatusTransition,
    ValidationError,
    Unknown(String),
}

/// The Job Manager responded, but with a failure.
#[derive(Debug, Error, Clone)]
#[error("api error (status {status_code}{0}): {message}", self.code_suffix())]
pub struct APIError {
    pub status_code: u16,
    pub api_error_code: Option<ApiErrorCode>,
    pub message: String,
}

impl APIError {
    fn code_suffix(&self) -> String {
        match &self.api_error_code {
            Some(ApiErrorCode::TaskNotFound) => ", code=TASK_NOT_FOUND".to_string(),
            Some(ApiErrorCode::IllegalTaskStatusTransition) => {
                ", code=ILLEGAL_TASK_STATUS_TRANSITION".to_string()
            }
            Some(ApiErrorCode::ValidationError) => ", code=VALIDATION_ERROR".to_string(),
            Some(ApiErrorCode::Unknown(code)) => format!(", code={code}"),
            None => String::new(),
        }
    }

    /// 5xx and 429 are worth retrying; 4xx (other than 429) indicate a
    /// client-side or state-transition problem that retrying won't fix.
    pub fn is_transient(&self) -> bool {
        self.status_code == 429 || self.status_code >= 500
    }
}

/// Construction-time configuration failure.
#[derive(Debug, Error, Clone)]
pub enum ConfigurationError {
    #[error("invalid URL: {value}")]
    InvalidUrl { value: String },
    #[error("missing required field: {field}")]
    MissingField { field: String },
    #[error("invalid retry policy: {message}")]
    InvalidRetryPolicy { message: String },
}

/// Errors from [`crate::consumer::Consumer`] operations.
#[derive(Debug, Error, Clone)]
pub enum ConsumerError {
    #[error("dequeue request failed: {cause}")]
    RequestFailed { cause: String },

    #[error("failed to retrieve task before reporting outcome: {cause}")]
    RetrieveFailed { cause: String },

    #[error("status update failed: {cause}")]
    StatusUpdateFailed { cause: String },

    #[error(
        "illegal local transition: task status is {observed:?}, expected IN_PROGRESS"
    )]
    IllegalLocalTransition { observed: crate::model::TaskStatus },
}

impl ConsumerError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RequestFailed { .. } | Self::RetrieveFailed { .. })
    }
}

/// Errors from [`crate::producer::Producer`] operations.
#[derive(Debug, Error, Clone)]
pub enum ProducerError {
    #[error("create request failed: {cause}")]
    RequestFailed { cause: String },

    #[error("task data must not be empty")]
    EmptyTaskData,

    #[error("stage type mismatch: expected {expected}, got {actual}")]
    StageTypeMismatch { expected: String, actual: String },

    #[error("failed to extract trace context: {message}")]
    TraceContextExtractFailed { message: String },
}

impl ProducerError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RequestFailed { .. })
    }
}

/// Aggregate error surfaced at the boundaries of this crate (construction,
/// and anywhere that needs one error type across the taxonomy).
#[derive(Debug, Error, Clone)]
pub enum WorkerError {
    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Api(#[from] APIError),

    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("consumer error: {0}")]
    Consumer(#[from] ConsumerError),

    #[error("producer error: {0}")]
    Producer(#[from] ProducerError),
}

impl WorkerError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(e) => e.is_transient(),
            Self::Api(e) => e.is_transient(),
            Self::Configuration(_) => false,
            Self::Consumer(e) => e.is_transient(),
            Self::Producer(e) => e.is_transient(),
        }
    }
}

/// Error produced while parsing a server-issued string into a branded type.
#[derive(Debug, Error, Clone)]
pub enum ParseError {
    #[error("invalid format: expected {expected}, got '{actual}'")]
    InvalidFormat { expected: String, actual: String },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
