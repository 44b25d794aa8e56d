//! TOML configuration file parsing

use super::*;
use crate::config::cli::{Cli, MoodArg};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: Config) -> Result<Config> {
    // Session settings
    if let Some(ref host) = cli.host {
        config.session.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.session.port = port;
    }
    if let Some(workers) = cli.workers {
        config.session.workers = workers;
    }
    if let Some(ref duration) = cli.duration {
        config.session.duration_ms = parse_duration_ms(duration)
            .context("Invalid --duration")?;
    }
    if let Some(ref tick) = cli.tick {
        config.session.tick_ms = parse_duration_ms(tick)
            .context("Invalid --tick")?;
    }
    if let Some(bonus) = cli.bonus {
        config.session.bonus = bonus;
    }
    if cli.seed.is_some() {
        config.session.seed = cli.seed;
    }
    if cli.reclaim_on_disconnect {
        config.session.reclaim_on_disconnect = true;
    }

    // Worker settings
    if let Some(mood) = cli.mood {
        config.worker.mood = Some(mood_from_cli(mood));
    }
    if let Some(ref work_unit) = cli.work_unit {
        config.worker.work_unit_ms = parse_duration_ms(work_unit)
            .context("Invalid --work-unit")?;
    }

    // Output settings
    if let Some(ref path) = cli.log_file {
        config.output.log_file = Some(path.clone());
    }
    if let Some(ref path) = cli.json_report {
        config.output.json_report = Some(path.clone());
    }
    if cli.debug {
        config.output.debug = true;
    }

    Ok(config)
}

/// Build the configuration from CLI arguments alone
pub fn config_from_cli(cli: &Cli) -> Result<Config> {
    merge_cli_with_config(cli, Config::default())
}

fn mood_from_cli(mood: MoodArg) -> Mood {
    match mood {
        MoodArg::AvoidHeavy => Mood::AvoidHeavy,
        MoodArg::AvoidDirty => Mood::AvoidDirty,
        MoodArg::AvoidSlow => Mood::AvoidSlow,
        MoodArg::Cooperative => Mood::Cooperative,
        MoodArg::PreferHighValue => Mood::PreferHighValue,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_toml_basic() {
        let toml = r#"
[session]
port = 2099
workers = 2
duration_ms = 5000
bonus = 10
names = ["Ann", "Bob"]
reclaim_on_disconnect = true
seed = 42

[worker]
mood = "avoid-dirty"
work_unit_ms = 20

[output]
json_report = "/tmp/report.json"
debug = true
"#;

        let config = parse_toml_string(toml).unwrap();
        assert_eq!(config.session.port, 2099);
        assert_eq!(config.session.host, "localhost");
        assert_eq!(config.session.workers, 2);
        assert_eq!(config.session.duration_ms, 5000);
        assert_eq!(config.session.tick_ms, 1000);
        assert_eq!(config.session.bonus, 10);
        assert_eq!(config.session.worker_name(1), "Bob");
        assert!(config.session.reclaim_on_disconnect);
        assert_eq!(config.session.seed, Some(42));
        assert_eq!(config.worker.mood, Some(Mood::AvoidDirty));
        assert_eq!(config.worker.work_unit_ms, 20);
        assert!(config.output.debug);
        assert!(config.output.log_file.is_none());
    }

    #[test]
    fn test_parse_toml_empty_uses_defaults() {
        let config = parse_toml_string("").unwrap();
        assert_eq!(config.session.port, 1099);
        assert_eq!(config.session.workers, MAX_WORKERS);
    }

    #[test]
    fn test_parse_toml_rejects_unknown_mood() {
        assert!(parse_toml_string("[worker]\nmood = \"grumpy\"\n").is_err());
    }

    #[test]
    fn test_parse_toml_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[session]\nport = 3099").unwrap();

        let config = parse_toml_file(file.path()).unwrap();
        assert_eq!(config.session.port, 3099);

        assert!(parse_toml_file(Path::new("/nonexistent/choreboard.toml")).is_err());
    }

    #[test]
    fn test_cli_overrides_config() {
        let config = parse_toml_string("[session]\nport = 2099\nworkers = 2\n").unwrap();
        let cli = Cli::parse_from([
            "choreboard",
            "--port",
            "4099",
            "--duration",
            "3s",
            "--mood",
            "cooperative",
            "--reclaim-on-disconnect",
        ]);

        let merged = merge_cli_with_config(&cli, config).unwrap();
        assert_eq!(merged.session.port, 4099);
        assert_eq!(merged.session.workers, 2);
        assert_eq!(merged.session.duration_ms, 3000);
        assert_eq!(merged.worker.mood, Some(Mood::Cooperative));
        assert!(merged.session.reclaim_on_disconnect);
    }

    #[test]
    fn test_cli_bad_duration() {
        let cli = Cli::parse_from(["choreboard", "--tick", "soon"]);
        assert!(config_from_cli(&cli).is_err());
    }
}
