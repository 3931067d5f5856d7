//! # job-worker-core
//!
//! Consumer-side Worker runtime for the Job Manager orchestration SDK.
//!
//! A [`worker::Worker`] owns a single `stage_type` for its entire lifetime
//! and runs a pull-dispatch-await loop: it dequeues a [`model::Task`] via a
//! [`consumer::Consumer`], builds a [`handler_context::HandlerContext`] from
//! the task's stage and job, runs the caller's handler under a
//! [`circuit_breaker::CircuitBreaker`], and reports the outcome back to the
//! server. A second, independent breaker guards the dequeue call itself, and
//! an [`backoff::ExponentialBackoff`] paces empty or failing polls.
//!
//! ## Architecture
//!
//! This crate defines the domain model and the pull loop against trait
//! abstractions ([`api::ApiClient`], [`producer::Producer`],
//! [`handler_context::WorkerLogger`]); the HTTP implementation of
//! `ApiClient` lives in the sibling `job-manager-client` crate so this crate
//! never depends on a concrete transport.
//!
//! ```rust,no_run
//! use job_worker_core::worker::{Worker, WorkerConfig};
//! use job_worker_core::backoff::BackoffOptions;
//!
//! # async fn example(
//! #     api_client: std::sync::Arc<dyn job_worker_core::api::ApiClient>,
//! #     producer: std::sync::Arc<dyn job_worker_core::producer::Producer>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let config = WorkerConfig::builder()
//!     .stage_type("image-resize")
//!     .api_client(api_client)
//!     .producer(producer)
//!     .backoff_options(BackoffOptions::default())
//!     .handler(|_task, _ctx| async move { Ok(()) })
//!     .build()?;
//!
//! let worker = Worker::new(config);
//! worker.start();
//! worker.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod backoff;
pub mod circuit_breaker;
pub mod consumer;
pub mod error;
pub mod events;
pub mod handler_context;
pub mod ids;
pub mod model;
pub mod producer;
pub mod trace;
pub mod worker;

pub use backoff::{BackoffOptions, ExponentialBackoff};
pub use error::{
    APIError, ApiErrorCode, ConfigurationError, ConsumerError, NetworkError, ParseError,
    ProducerError, WorkerError,
};
pub use events::{EventListener, ListenerId, WorkerEvent, WorkerEventBus};
pub use ids::{JobId, StageId, TaskId, Timestamp};
pub use model::{Job, Priority, Stage, Task, TaskOutcomeStatus, TaskStatus};
pub use worker::{Worker, WorkerConfig, WorkerConfigBuilder};
