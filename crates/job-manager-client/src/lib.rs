//! # job-manager-client
//!
//! `reqwest`-based implementation of [`job_worker_core::api::ApiClient`]
//! against the Job Manager's HTTP+JSON control plane (§6.1).
//!
//! This crate is deliberately narrow: it implements exactly the operations
//! the Worker runtime and its `Producer`/`Consumer` collaborators consume,
//! not the full OpenAPI surface (§1, "supporting collaborators ...
//! specified only by the interfaces the core consumes"). A retry layer
//! (`client::RetryPolicy`) smooths over transient failures (5xx, 429,
//! transport errors) underneath the Worker's own circuit breakers.
//!
//! ```rust,no_run
//! use job_manager_client::{ClientConfig, JobManagerClient};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = JobManagerClient::builder("https://jobs.example.com")
//!     .timeout(std::time::Duration::from_secs(10))
//!     .build()?;
//! # let _ = client;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;

pub use client::{ClientConfig, ClientConfigBuilder, JobManagerClient, RetryPolicy};
pub use error::ClientError;
