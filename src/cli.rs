//! Command-line interface argument parsing.
//!
//! This module defines the CLI structure and parsing logic using clap.
//! Everything here overrides the file/environment configuration.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Log level for the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Show all messages including trace
    Trace,
    /// Show debug messages and above
    Debug,
    /// Show info messages and above (default)
    Info,
    /// Show warnings and errors only
    Warn,
    /// Show errors only
    Error,
}

impl LogLevel {
    /// Convert LogLevel to a tracing filter string
    pub fn to_filter_string(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Sensors-to-DB: ingest MQTT sensor telemetry and persist periodic snapshots
#[derive(Parser, Debug)]
#[command(name = "sensors-to-db")]
#[command(version)]
#[command(about = "Subscribes to sensor topics and writes periodic snapshot rows", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "sensors-to-db.toml")]
    pub config: PathBuf,

    /// Log level
    #[arg(short, long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Flush period in seconds (overrides config file)
    #[arg(short = 'p', long)]
    pub flush_period_secs: Option<u64>,

    /// Disable database writes (validate and log records only)
    #[arg(long)]
    pub no_db: bool,

    /// MQTT broker host (overrides config file)
    #[arg(long)]
    pub mqtt_host: Option<String>,

    /// MQTT broker port (overrides config file)
    #[arg(long)]
    pub mqtt_port: Option<u16>,

    /// Database connection URL (overrides config file)
    #[arg(long)]
    pub database_url: Option<String>,
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(LogLevel::Info.to_filter_string(), "info");
        assert_eq!(LogLevel::Debug.to_filter_string(), "debug");
        assert_eq!(LogLevel::Error.to_filter_string(), "error");
    }

    #[test]
    fn test_default_values() {
        let cli = Cli::parse_from(["sensors-to-db"]);
        assert_eq!(cli.config, PathBuf::from("sensors-to-db.toml"));
        assert_eq!(cli.log_level, LogLevel::Info);
        assert!(!cli.no_db);
        assert_eq!(cli.flush_period_secs, None);
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::parse_from([
            "sensors-to-db",
            "--mqtt-host",
            "broker.local",
            "--flush-period-secs",
            "30",
            "--no-db",
        ]);
        assert_eq!(cli.mqtt_host.as_deref(), Some("broker.local"));
        assert_eq!(cli.flush_period_secs, Some(30));
        assert!(cli.no_db);
    }
}
