//! choreboard CLI entry point

use anyhow::{Context, Result};
use choreboard::config::cli::{Cli, ExecutionMode};
use choreboard::config::{self, Config};
use choreboard::distributed::{run_standalone, Coordinator, Worker};
use choreboard::util::SessionLog;
use std::sync::Arc;

fn main() -> Result<()> {
    println!("choreboard v{}", env!("CARGO_PKG_VERSION"));
    println!();

    // Parse CLI arguments
    let cli = Cli::parse_args();
    cli.validate()?;

    let config = build_config(&cli)?;
    config::validator::validate_config(&config)
        .context("Configuration validation failed")?;

    let log = Arc::new(SessionLog::open(
        config.output.log_file.as_deref(),
        config.output.debug,
    )?);
    if config.output.debug {
        log.debug(format!("{}", config));
    }

    let config = Arc::new(config);
    let result = match cli.mode {
        ExecutionMode::Standalone => run_standalone_mode(config, log.clone()),
        ExecutionMode::Coordinator => run_coordinator(config, log.clone()),
        ExecutionMode::Worker => run_worker(config, log.clone()),
    };

    if let Err(e) = log.finish() {
        eprintln!("Warning: {:#}", e);
    }

    result
}

/// Load the config file when given, then apply CLI overrides
fn build_config(cli: &Cli) -> Result<Config> {
    match cli.config {
        Some(ref path) => {
            let file_config = config::toml::parse_toml_file(path)?;
            config::toml::merge_cli_with_config(cli, file_config)
        }
        None => config::toml::config_from_cli(cli),
    }
}

/// Coordinator mode: own the table and wait for remote workers
fn run_coordinator(config: Arc<Config>, log: Arc<SessionLog>) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    runtime.block_on(async {
        let mut coordinator = Coordinator::bind(config.clone(), log.clone()).await?;
        coordinator.accept_workers(config.session.workers).await?;
        coordinator.run().await?;
        Ok(())
    })
}

/// Worker mode: join a remote coordinator
fn run_worker(config: Arc<Config>, log: Arc<SessionLog>) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    runtime.block_on(async {
        let address = config.session.address();
        match Worker::connect(&address, &config, log.clone()).await? {
            Some(worker) => {
                let summary = worker.run().await;
                log.line(format!(
                    "{} completed {} jobs worth {} in total",
                    summary.name,
                    summary.completed.len(),
                    summary.total_value
                ));
            }
            None => log.line("No place in this session"),
        }
        Ok(())
    })
}

/// Standalone mode: coordinator and workers in this process
fn run_standalone_mode(config: Arc<Config>, log: Arc<SessionLog>) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()
        .context("Failed to create tokio runtime")?;

    let outcome = runtime.block_on(run_standalone(config, log.clone()))?;

    log.line("");
    for summary in &outcome.workers {
        log.line(format!(
            "  {:<8} {:<18} {:>3} jobs done, value {}, {}",
            summary.name,
            summary.mood.to_string(),
            summary.completed.len(),
            summary.total_value,
            summary.exit
        ));
    }

    Ok(())
}
