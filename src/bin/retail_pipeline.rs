//! # Retail Pipeline Daemon
//!
//! Runs the retail pipeline on its cron cadence until interrupted, or triggers
//! a single run on demand.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use retail_pipeline::config::loader::CONFIG_PATH_ENV;
use retail_pipeline::config::ConfigManager;
use retail_pipeline::constants::PIPELINE_TAGS;
use retail_pipeline::loader::PgWarehouse;
use retail_pipeline::logging::init_structured_logging;
use retail_pipeline::orchestration::{build_retail_graph, RunScheduler, TaskGraphExecutor};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "retail-pipeline")]
#[command(about = "Scheduled retail warehouse load and transform pipeline")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file (default: config/retail-pipeline.toml when present)
    #[arg(short, long, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fire runs on the configured cadence until Ctrl-C (default)
    Serve,
    /// Run the pipeline once, now
    Trigger,
    /// Load and validate the configuration, then exit
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_structured_logging();
    let cli = Cli::parse();

    let manager = ConfigManager::load_from_file(cli.config.clone())
        .context("Failed to load pipeline configuration")?;
    let config = manager.config();

    if matches!(cli.command, Some(Commands::Validate)) {
        info!(environment = %manager.environment(), "Configuration is valid");
        return Ok(());
    }

    let warehouse = PgWarehouse::new(
        config.warehouse.database_url.clone(),
        config.warehouse.connect_timeout(),
    );
    let graph = build_retail_graph(config, warehouse).context("Invalid task graph")?;
    let executor = Arc::new(TaskGraphExecutor::new(config.pipeline_id.clone(), graph));

    info!(
        pipeline_id = %config.pipeline_id,
        tags = ?PIPELINE_TAGS,
        steps = executor.graph().len(),
        "Pipeline assembled"
    );

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Trigger => {
            let summary = executor.trigger(Utc::now()).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            if let Some(failure) = summary.failure {
                bail!(
                    "pipeline run {} failed at step {} after {} attempts: {}",
                    summary.run_id,
                    failure.step_id,
                    failure.attempts,
                    failure.error
                );
            }
            Ok(())
        }
        Commands::Serve => {
            let start_boundary = config.schedule.start_boundary()?;
            let scheduler =
                RunScheduler::new(&config.schedule.cron, start_boundary, Arc::clone(&executor))?;

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let scheduler_handle = tokio::spawn(scheduler.run(shutdown_rx));

            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for shutdown signal")?;
            info!("Shutdown requested, waiting for any in-flight run");
            let _ = shutdown_tx.send(true);

            match scheduler_handle.await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => {
                    error!(error = %e, "Scheduler stopped with an error");
                    Err(e.into())
                }
                Err(e) => Err(e.into()),
            }
        }
        Commands::Validate => Ok(()),
    }
}
