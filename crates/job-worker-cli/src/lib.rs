//! # job-worker-cli
//!
//! Demo/integration binary (§13.4): wires a [`job_worker_core::worker::Worker`]
//! up against a real [`job_manager_client::JobManagerClient`] and runs it
//! until interrupted. There is no HTTP listener here — the control plane
//! this binary talks to is out of scope for this crate, it is only ever a
//! client of it.
//!
//! Configuration is layered the way `queue-keeper-service`'s `ServiceConfig`
//! is framed to load (defaults, then an optional file, then environment
//! variables under the `JOB_WORKER_` prefix), with explicit CLI flags taking
//! the final word.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use job_manager_client::{ClientError, JobManagerClient};
use job_worker_core::api::ApiClient;
use job_worker_core::producer::{DefaultProducer, Producer};
use job_worker_core::{BackoffOptions, ConfigurationError, Worker, WorkerConfig, WorkerEvent};

/// Command-line arguments. Anything left `None` falls through to the
/// layered [`CliConfig`] load.
#[derive(Debug, Parser)]
#[command(
    name = "job-worker-cli",
    about = "Runs a Worker against a Job Manager deployment"
)]
pub struct Cli {
    /// Path to an optional TOML/JSON/YAML config file.
    #[arg(long, env = "JOB_WORKER_CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Stage type this worker claims tasks for.
    #[arg(long)]
    pub stage_type: Option<String>,

    /// Base URL of the Job Manager control plane.
    #[arg(long)]
    pub api_base_url: Option<String>,

    /// Maximum number of tasks processed concurrently.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Emit structured JSON logs instead of the default human-readable format.
    #[arg(long)]
    pub json_logs: bool,
}

/// Layered runtime configuration (§12, "the demo binary additionally loads
/// environment-sourced overrides via the `config` crate").
#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
    pub stage_type: String,
    pub api_base_url: String,
    pub concurrency: usize,
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            stage_type: "demo-stage".to_string(),
            api_base_url: "http://localhost:8080".to_string(),
            concurrency: 4,
            json_logs: false,
        }
    }
}

/// Errors surfaced by [`run_cli`]; `main` maps each variant onto a distinct
/// process exit code.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] config::ConfigError),

    #[error("invalid worker configuration: {0}")]
    WorkerConfiguration(#[from] ConfigurationError),

    #[error("failed to construct job manager client: {0}")]
    Client(#[from] ClientError),
}

/// Build a [`CliConfig`] from defaults, an optional file, environment
/// variables (`JOB_WORKER_*`), and finally any explicit CLI flags.
pub fn load_config(cli: &Cli) -> Result<CliConfig, config::ConfigError> {
    let defaults = CliConfig::default();

    let mut builder = config::Config::builder()
        .set_default("stage_type", defaults.stage_type.clone())?
        .set_default("api_base_url", defaults.api_base_url.clone())?
        .set_default("concurrency", defaults.concurrency as i64)?
        .set_default("json_logs", defaults.json_logs)?;

    if let Some(path) = &cli.config_file {
        builder = builder.add_source(config::File::from(path.as_path()).required(false));
    }

    // No `.separator(...)`: env var names map straight onto the flat,
    // snake_case field names above (`JOB_WORKER_STAGE_TYPE` -> `stage_type`),
    // rather than being split into a nested table.
    builder = builder.add_source(
        config::Environment::with_prefix("JOB_WORKER").try_parsing(true),
    );

    let mut loaded: CliConfig = builder.build()?.try_deserialize()?;

    if let Some(stage_type) = &cli.stage_type {
        loaded.stage_type = stage_type.clone();
    }
    if let Some(api_base_url) = &cli.api_base_url {
        loaded.api_base_url = api_base_url.clone();
    }
    if let Some(concurrency) = cli.concurrency {
        loaded.concurrency = concurrency;
    }
    if cli.json_logs {
        loaded.json_logs = true;
    }

    Ok(loaded)
}

fn init_tracing(json_logs: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "job_worker_cli=info,job_worker_core=info,job_manager_client=info".into());

    let registry = tracing_subscriber::registry().with(env_filter);
    if json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// The handler run for every dequeued task. It logs the claim, tags the
/// task with the worker that handled it, and otherwise does nothing —
/// standing in for whatever business logic a real stage_type would run.
async fn demo_handler(
    task: job_worker_core::Task,
    ctx: job_worker_core::handler_context::HandlerContext,
) -> Result<(), job_worker_core::WorkerError> {
    ctx.logger.info(&format!(
        "processing task {} (stage {}, job {})",
        task.id, ctx.stage.stage_type, ctx.job.name
    ));

    ctx.update_task_user_metadata(serde_json::json!({ "handledBy": "job-worker-cli" }))
        .await?;

    Ok(())
}

fn log_event(event: &WorkerEvent) {
    match event {
        WorkerEvent::Started { stage_type, concurrency } => {
            info!(stage_type, concurrency, "worker started");
        }
        WorkerEvent::Stopping { stage_type, running_tasks } => {
            info!(stage_type, running_tasks, "worker stopping");
        }
        WorkerEvent::Stopped { stage_type } => {
            info!(stage_type, "worker stopped");
        }
        WorkerEvent::TaskStarted { task_id, stage_type } => {
            info!(%task_id, stage_type, "task started");
        }
        WorkerEvent::TaskCompleted { task_id, stage_type, duration } => {
            info!(%task_id, stage_type, ?duration, "task completed");
        }
        WorkerEvent::TaskFailed { task_id, stage_type, error } => {
            error!(%task_id, stage_type, error, "task failed");
        }
        WorkerEvent::Error { location, error, stage_type } => {
            error!(location, error, stage_type, "worker error");
        }
        WorkerEvent::CircuitBreakerOpened { breaker, stage_type } => {
            error!(breaker, stage_type, "circuit breaker opened");
        }
        WorkerEvent::CircuitBreakerClosed { breaker, stage_type } => {
            info!(breaker, stage_type, "circuit breaker closed");
        }
        WorkerEvent::QueueEmpty { stage_type, consecutive_empty_polls } => {
            tracing::debug!(stage_type, consecutive_empty_polls, "queue empty");
        }
    }
}

/// Parse arguments, load configuration, build a [`Worker`], and run it
/// until `ctrl_c` is received.
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = load_config(&cli)?;
    info!(
        stage_type = %config.stage_type,
        api_base_url = %config.api_base_url,
        concurrency = config.concurrency,
        "loaded worker configuration"
    );

    let api_client: Arc<dyn ApiClient> = Arc::new(
        JobManagerClient::builder(config.api_base_url.clone())
            .timeout(Duration::from_secs(30))
            .build()?,
    );
    let producer: Arc<dyn Producer> = Arc::new(DefaultProducer::new(api_client.clone()));

    let worker_config = WorkerConfig::builder()
        .stage_type(config.stage_type.clone())
        .concurrency(config.concurrency)
        .api_client(api_client)
        .producer(producer)
        .backoff_options(BackoffOptions::default())
        .handler(demo_handler)
        .build()?;

    let worker = Worker::new(worker_config);
    worker.on(log_event);
    worker.start();

    if let Err(error) = tokio::signal::ctrl_c().await {
        error!(%error, "failed to listen for ctrl_c, shutting down anyway");
    } else {
        info!("received ctrl_c, shutting down");
    }

    worker.stop().await;
    Ok(())
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
