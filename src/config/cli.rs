//! CLI argument parsing using clap

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExecutionMode {
    /// Coordinator and workers in one process
    Standalone,
    /// Run the coordinator: own the job table and wait for workers
    Coordinator,
    /// Run one worker against a remote coordinator
    Worker,
}

/// Worker mood
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MoodArg {
    /// Only jobs with heavy < 3
    AvoidHeavy,
    /// Only jobs with dirty < 3
    AvoidDirty,
    /// Only jobs with slow < 3
    AvoidSlow,
    /// Any job, scanning from the last slot
    Cooperative,
    /// Only jobs worth more than 40
    PreferHighValue,
}

/// choreboard - coordinator/worker job-table simulation
#[derive(Parser, Debug)]
#[command(name = "choreboard")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Execution mode: standalone, coordinator, or worker
    #[arg(long, value_enum, default_value = "standalone")]
    pub mode: ExecutionMode,

    /// TOML configuration file
    #[arg(short = 'c', long, env = "CHOREBOARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Coordinator host
    #[arg(long)]
    pub host: Option<String>,

    /// Coordinator port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Number of workers (1-4)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Session duration (e.g., 21s, 500ms, 2m)
    #[arg(short = 'd', long)]
    pub duration: Option<String>,

    /// Coordinator wait timeout per tick (e.g., 1000ms)
    #[arg(long)]
    pub tick: Option<String>,

    /// Simulated work time per point of slow (e.g., 1000ms)
    #[arg(long)]
    pub work_unit: Option<String>,

    /// Bonus added to the winner's total
    #[arg(long)]
    pub bonus: Option<u32>,

    /// Force a worker mood instead of drawing one at random
    #[arg(long, value_enum)]
    pub mood: Option<MoodArg>,

    /// Seed for job generation and mood selection
    #[arg(long)]
    pub seed: Option<u64>,

    /// Return a disconnected worker's jobs to the pool
    #[arg(long)]
    pub reclaim_on_disconnect: bool,

    /// Session log file (written in addition to stdout)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Write the session report as JSON
    #[arg(long)]
    pub json_report: Option<PathBuf>,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate CLI arguments
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(workers) = self.workers {
            if workers == 0 {
                anyhow::bail!("workers must be at least 1");
            }
        }

        if self.mode == ExecutionMode::Worker && self.workers.is_some() {
            anyhow::bail!("--workers only applies to coordinator and standalone modes");
        }

        Ok(())
    }
}
