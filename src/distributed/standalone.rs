//! Standalone mode
//!
//! Runs the coordinator and every worker in one process. Workers are separate
//! tasks that talk to the coordinator over loopback TCP exactly as remote
//! workers would; nothing else is shared.

use crate::config::Config;
use crate::distributed::coordinator::Coordinator;
use crate::distributed::worker::{Worker, WorkerSummary};
use crate::output::SessionReport;
use crate::util::SessionLog;
use anyhow::{Context, Result};
use std::sync::Arc;

/// Everything a standalone session produced
#[derive(Debug, Clone)]
pub struct StandaloneOutcome {
    pub report: SessionReport,
    /// Worker summaries, ordered by worker id
    pub workers: Vec<WorkerSummary>,
}

/// Run a full session in-process
pub async fn run_standalone(config: Arc<Config>, log: Arc<SessionLog>) -> Result<StandaloneOutcome> {
    let mut coordinator = Coordinator::bind(config.clone(), log.clone()).await?;
    let address = coordinator.local_addr()?.to_string();
    log.debug(format!("Standalone coordinator listening on {}", address));

    let mut handles = Vec::with_capacity(config.session.workers);
    for _ in 0..config.session.workers {
        handles.push(tokio::spawn(run_worker(
            address.clone(),
            config.clone(),
            log.clone(),
        )));
    }

    coordinator.accept_workers(config.session.workers).await?;
    let report = coordinator.run().await?;

    let mut workers = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await.context("Worker task panicked")? {
            Ok(Some(summary)) => workers.push(summary),
            Ok(None) => {}
            Err(e) => log.warn(format!("Worker failed: {:#}", e)),
        }
    }
    workers.sort_by_key(|summary| summary.id);

    Ok(StandaloneOutcome { report, workers })
}

async fn run_worker(
    address: String,
    config: Arc<Config>,
    log: Arc<SessionLog>,
) -> Result<Option<WorkerSummary>> {
    match Worker::connect(&address, &config, log).await? {
        Some(worker) => Ok(Some(worker.run().await)),
        None => Ok(None),
    }
}
