use clap::Parser;
use sparza_pipeline::run_log::RunPaths;
use sparza_worker::cli::Cli;
use sparza_worker::config::WorkerConfig;
use sparza_worker::{commands, logging, shutdown};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = WorkerConfig::from_env()?;

    let paths = RunPaths::new(
        &config.log_dir,
        cli.command.name(),
        cli.command.scope(),
        chrono::Utc::now(),
    );
    logging::init_tracing(Some(&paths.log), config.json_logs)?;

    tracing::info!(
        command = cli.command.name(),
        scope = cli.command.scope(),
        log = %paths.log.display(),
        "Worker starting",
    );

    let cancel = CancellationToken::new();
    if cli.command.is_cancellable() {
        shutdown::cancel_on_signal(cancel.clone());
    }

    let result = commands::execute(cli.command, &config, paths, cancel).await;
    if let Err(e) = &result {
        tracing::error!(error = format!("{e:#}"), "Job failed");
    }
    result
}
