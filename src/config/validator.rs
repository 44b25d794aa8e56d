//! Configuration validation

use super::*;
use anyhow::Result;

/// Validate complete configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_session(&config.session)?;
    validate_worker(&config.worker)?;
    validate_output(&config.output)?;

    Ok(())
}

/// Validate session configuration
pub fn validate_session(session: &SessionConfig) -> Result<()> {
    if session.host.trim().is_empty() {
        anyhow::bail!("host must not be empty");
    }

    if session.workers == 0 || session.workers > MAX_WORKERS {
        anyhow::bail!("workers must be between 1 and {}, got {}", MAX_WORKERS, session.workers);
    }

    if session.names.len() < session.workers {
        anyhow::bail!(
            "{} workers need at least {} names, got {}",
            session.workers,
            session.workers,
            session.names.len()
        );
    }

    if session.duration_ms == 0 {
        anyhow::bail!("session duration must be greater than 0");
    }

    if session.tick_ms == 0 {
        anyhow::bail!("tick must be greater than 0");
    }

    if session.tick_ms > session.duration_ms {
        eprintln!(
            "Warning: tick ({}ms) is longer than the session ({}ms); sweeps will only run at shutdown",
            session.tick_ms, session.duration_ms
        );
    }

    Ok(())
}

/// Validate worker configuration
pub fn validate_worker(worker: &WorkerConfig) -> Result<()> {
    // Work time is slow × work_unit, and slow tops out at 5
    if worker.work_unit_ms > 60_000 {
        anyhow::bail!("work_unit_ms must be at most 60000, got {}", worker.work_unit_ms);
    }

    Ok(())
}

/// Validate output configuration
pub fn validate_output(output: &OutputConfig) -> Result<()> {
    if let (Some(log), Some(json)) = (&output.log_file, &output.json_report) {
        if log == json {
            anyhow::bail!("log_file and json_report must be different files");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_worker_count_bounds() {
        let mut config = Config::default();
        config.session.workers = 0;
        assert!(validate_config(&config).is_err());

        config.session.workers = MAX_WORKERS + 1;
        assert!(validate_config(&config).is_err());

        config.session.workers = 1;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_names_must_cover_workers() {
        let mut config = Config::default();
        config.session.names = vec!["Solo".to_string()];
        config.session.workers = 2;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_durations_rejected() {
        let mut config = Config::default();
        config.session.duration_ms = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.session.tick_ms = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_output_paths_distinct() {
        let mut config = Config::default();
        config.output.log_file = Some(PathBuf::from("/tmp/same"));
        config.output.json_report = Some(PathBuf::from("/tmp/same"));
        assert!(validate_config(&config).is_err());
    }
}
