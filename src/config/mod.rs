//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.

pub mod cli;
pub mod toml;
pub mod validator;

use crate::distributed::mood::Mood;
use crate::job::WorkerId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Hard cap on connected workers per session
pub const MAX_WORKERS: usize = 4;

/// Complete session configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Coordinator session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Host the coordinator binds to and workers connect to
    #[serde(default = "default_host")]
    pub host: String,
    /// TCP port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Number of workers the coordinator waits for (1-4)
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Session length in milliseconds
    #[serde(default = "default_duration_ms")]
    pub duration_ms: u64,
    /// Multiplex wait bound in milliseconds
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Value added to the winner's total
    #[serde(default = "default_bonus")]
    pub bonus: u32,
    /// Display names, indexed by worker id
    #[serde(default = "default_names")]
    pub names: Vec<String>,
    /// Return a disconnected worker's Working jobs to the pool
    #[serde(default)]
    pub reclaim_on_disconnect: bool,
    /// Seed for job generation and mood selection
    pub seed: Option<u64>,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    1099
}

fn default_workers() -> usize {
    MAX_WORKERS
}

fn default_duration_ms() -> u64 {
    21_000
}

fn default_tick_ms() -> u64 {
    1_000
}

fn default_bonus() -> u32 {
    5
}

fn default_names() -> Vec<String> {
    ["Ali", "Cory", "Lee", "Pat"].iter().map(|s| s.to_string()).collect()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: default_workers(),
            duration_ms: default_duration_ms(),
            tick_ms: default_tick_ms(),
            bonus: default_bonus(),
            names: default_names(),
            reclaim_on_disconnect: false,
            seed: None,
        }
    }
}

impl SessionConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// `host:port` address string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Display name for a worker id
    pub fn worker_name(&self, worker: WorkerId) -> String {
        self.names
            .get(worker as usize)
            .cloned()
            .unwrap_or_else(|| format!("worker-{}", worker))
    }
}

/// Worker behavior settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Force a mood instead of drawing one at random
    pub mood: Option<Mood>,
    /// Simulated work time per point of `slow`, in milliseconds
    #[serde(default = "default_work_unit_ms")]
    pub work_unit_ms: u64,
}

fn default_work_unit_ms() -> u64 {
    1_000
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            mood: None,
            work_unit_ms: default_work_unit_ms(),
        }
    }
}

impl WorkerConfig {
    pub fn work_unit(&self) -> Duration {
        Duration::from_millis(self.work_unit_ms)
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Session log file (in addition to stdout)
    pub log_file: Option<PathBuf>,
    /// JSON report file
    pub json_report: Option<PathBuf>,
    /// Enable debug output
    #[serde(default)]
    pub debug: bool,
}

/// Parse a duration string ("21s", "500ms", "2m") to milliseconds
///
/// A bare number is taken as milliseconds.
pub fn parse_duration_ms(s: &str) -> anyhow::Result<u64> {
    let s = s.trim();
    if s.is_empty() {
        anyhow::bail!("Empty duration string");
    }

    let (num_str, unit) = if let Some(num) = s.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = s.strip_suffix('s') {
        (num, "s")
    } else if let Some(num) = s.strip_suffix('m') {
        (num, "m")
    } else {
        (s, "ms")
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid number in duration: {}", num_str))?;

    let scale: u64 = match unit {
        "ms" => 1,
        "s" => 1_000,
        "m" => 60_000,
        _ => anyhow::bail!("Invalid duration unit: {}. Use ms, s, or m", unit),
    };

    num.checked_mul(scale)
        .ok_or_else(|| anyhow::anyhow!("Duration too large: {}", s))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Configuration:")?;
        writeln!(f, "  Session: {}", self.session)?;
        writeln!(f, "  Worker: {}", self.worker)?;
        write!(f, "  Output: {}", self.output)
    }
}

impl fmt::Display for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {} workers, duration={}ms, tick={}ms, bonus={}",
            self.address(), self.workers, self.duration_ms, self.tick_ms, self.bonus
        )?;
        if self.reclaim_on_disconnect {
            write!(f, ", reclaim_on_disconnect")?;
        }
        if let Some(seed) = self.seed {
            write!(f, ", seed={}", seed)?;
        }
        Ok(())
    }
}

impl fmt::Display for WorkerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mood {
            Some(mood) => write!(f, "mood={}", mood)?,
            None => write!(f, "mood=random")?,
        }
        write!(f, ", work_unit={}ms", self.work_unit_ms)
    }
}

impl fmt::Display for OutputConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.log_file {
            Some(path) => write!(f, "log={}", path.display())?,
            None => write!(f, "log=stdout")?,
        }
        if let Some(path) = &self.json_report {
            write!(f, ", json={}", path.display())?;
        }
        if self.debug {
            write!(f, ", debug")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.session.address(), "localhost:1099");
        assert_eq!(config.session.workers, 4);
        assert_eq!(config.session.duration(), Duration::from_secs(21));
        assert_eq!(config.session.tick(), Duration::from_millis(1000));
        assert_eq!(config.session.bonus, 5);
        assert!(!config.session.reclaim_on_disconnect);
        assert_eq!(config.worker.work_unit(), Duration::from_secs(1));
        assert!(config.worker.mood.is_none());
    }

    #[test]
    fn test_worker_name() {
        let session = SessionConfig::default();
        assert_eq!(session.worker_name(0), "Ali");
        assert_eq!(session.worker_name(3), "Pat");
        assert_eq!(session.worker_name(7), "worker-7");
    }

    #[test]
    fn test_parse_duration_ms() {
        assert_eq!(parse_duration_ms("21s").unwrap(), 21_000);
        assert_eq!(parse_duration_ms("500ms").unwrap(), 500);
        assert_eq!(parse_duration_ms("2m").unwrap(), 120_000);
        assert_eq!(parse_duration_ms("250").unwrap(), 250);
        assert!(parse_duration_ms("").is_err());
        assert!(parse_duration_ms("fast").is_err());
    }

    #[test]
    fn test_parse_duration_ms_overflow() {
        assert!(parse_duration_ms("999999999999999999m").is_err());
        assert!(parse_duration_ms("18446744073709552s").is_err());
        assert_eq!(parse_duration_ms("18446744073709551615").unwrap(), u64::MAX);
    }

    #[test]
    fn test_display() {
        let text = Config::default().to_string();
        assert!(text.contains("localhost:1099"));
        assert!(text.contains("mood=random"));
    }
}
