//! JSON output formatting
//!
//! Writes the end-of-session report together with the session parameters
//! that produced it.

use super::SessionReport;
use crate::util::time::format_duration;
use crate::Result;
use anyhow::Context;
use serde::Serialize;
use std::fs::File;
use std::path::Path;
use std::time::Duration;

/// Duration with both milliseconds and human-readable format
#[derive(Debug, Clone, Serialize)]
pub struct JsonDuration {
    pub millis: u64,
    pub human: String,
}

impl JsonDuration {
    pub fn from_duration(d: Duration) -> Self {
        Self {
            millis: d.as_millis() as u64,
            human: format_duration(d),
        }
    }
}

/// Top-level JSON document
#[derive(Debug, Clone, Serialize)]
pub struct JsonSessionOutput {
    /// RFC 3339 timestamp of when the report was written
    pub generated_at: String,
    pub duration: JsonDuration,
    pub workers: usize,
    #[serde(flatten)]
    pub report: SessionReport,
}

impl JsonSessionOutput {
    pub fn new(report: SessionReport, duration: Duration, workers: usize) -> Self {
        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            duration: JsonDuration::from_duration(duration),
            workers,
            report,
        }
    }
}

/// Write the JSON report to a file
pub fn write_json_report(
    output_path: &Path,
    output: &JsonSessionOutput,
    pretty: bool,
) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create JSON report: {}", output_path.display()))?;

    if pretty {
        serde_json::to_writer_pretty(file, output)?;
    } else {
        serde_json::to_writer(file, output)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{Job, Ledger};
    use tempfile::TempDir;

    #[test]
    fn test_write_json_report() {
        let mut ledger = Ledger::new();
        let mut job = Job::new(3, 2, 2, 2).unwrap();
        job.claim(1).unwrap();
        job.complete(1).unwrap();
        ledger.record(job);
        let report = SessionReport::tally(&ledger, |id| format!("worker-{}", id), 5);

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("report.json");
        let output = JsonSessionOutput::new(report, Duration::from_secs(21), 2);
        write_json_report(&path, &output, true).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["workers"], 2);
        assert_eq!(value["duration"]["millis"], 21000);
        assert_eq!(value["bonus"], 5);
        assert_eq!(value["credits"][0]["slot"], 3);
        assert_eq!(value["credits"][0]["value"], 8);
        assert_eq!(value["winner"]["name"], "worker-1");
        assert_eq!(value["winner"]["total_value"], 13);
    }

    #[test]
    fn test_write_json_report_bad_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing").join("report.json");
        let report = SessionReport::tally(&Ledger::new(), |id| id.to_string(), 5);
        let output = JsonSessionOutput::new(report, Duration::from_secs(1), 0);
        assert!(write_json_report(&path, &output, false).is_err());
    }
}
