use job_worker_cli::{run_cli, CliError};
use tracing::error;

#[tokio::main]
async fn main() {
    if let Err(e) = run_cli().await {
        error!("job-worker-cli error: {}", e);

        let exit_code = match e {
            CliError::Configuration(_) => 1,
            CliError::WorkerConfiguration(_) => 2,
            CliError::Client(_) => 3,
        };

        std::process::exit(exit_code);
    }
}
