//! Application configuration management.
//!
//! Configuration is layered: an optional TOML file, then environment
//! variables prefixed `SENSORS_DB_` (broker and database credentials are
//! normally supplied this way, e.g. `SENSORS_DB_DATABASE__URL`), then CLI
//! overrides applied by main.

use std::path::Path;

use chrono::FixedOffset;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

/// Top-level application configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Service runtime configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    /// Snapshot period per channel, in seconds.
    #[serde(default = "default_flush_period")]
    pub flush_period_secs: u64,
    /// Fixed offset from UTC used for the persisted timestamp strings.
    #[serde(default)]
    pub utc_offset_hours: i32,
    /// Device-group topic prefix covered by the wildcard subscription.
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// MQTT broker configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MqttConfig {
    #[serde(default = "default_mqtt_host")]
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
    #[serde(default = "default_true")]
    pub clean_session: bool,
    #[serde(default = "default_qos")]
    pub qos: i32,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Relational store configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Connection URL; required unless running with --no-db.
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

// Default value functions
fn default_flush_period() -> u64 {
    10
}

fn default_topic_prefix() -> String {
    "2706".to_string()
}

fn default_reconnect_delay() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_mqtt_host() -> String {
    "localhost".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "sensors-to-db".to_string()
}

fn default_keep_alive() -> u64 {
    20
}

fn default_true() -> bool {
    true
}

fn default_qos() -> i32 {
    1
}

fn default_max_connections() -> u32 {
    5
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            flush_period_secs: default_flush_period(),
            utc_offset_hours: 0,
            topic_prefix: default_topic_prefix(),
            reconnect_delay_ms: default_reconnect_delay(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            client_id: default_client_id(),
            keep_alive_secs: default_keep_alive(),
            clean_session: true,
            qos: default_qos(),
            username: None,
            password: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the optional TOML file and the
    /// `SENSORS_DB_` environment.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("SENSORS_DB")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(|e| ConfigError::LoadError(e.to_string()))?;

        let config: AppConfig = settings
            .try_deserialize()
            .map_err(|e| ConfigError::LoadError(e.to_string()))?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.service.flush_period_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "service.flush_period_secs".to_string(),
                message: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.service.topic_prefix.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "service.topic_prefix".to_string(),
                message: "cannot be empty".to_string(),
            }
            .into());
        }

        if self.mqtt.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "mqtt.port".to_string(),
                message: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.mqtt.qos < 0 || self.mqtt.qos > 2 {
            return Err(ConfigError::InvalidValue {
                field: "mqtt.qos".to_string(),
                message: "must be 0, 1, or 2".to_string(),
            }
            .into());
        }

        self.service.utc_offset()?;

        Ok(())
    }

    /// Apply CLI argument overrides to configuration
    pub fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(period) = cli.flush_period_secs {
            self.service.flush_period_secs = period;
        }

        if let Some(host) = &cli.mqtt_host {
            self.mqtt.host = host.clone();
        }

        if let Some(port) = cli.mqtt_port {
            self.mqtt.port = port;
        }

        if let Some(url) = &cli.database_url {
            self.database.url = url.clone();
        }
    }
}

impl ServiceConfig {
    /// The fixed offset the flush timestamps are rendered in.
    pub fn utc_offset(&self) -> std::result::Result<FixedOffset, ConfigError> {
        self.utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "service.utc_offset_hours".to_string(),
                message: "must be within -23..=23".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.mqtt.host, "localhost");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.service.flush_period_secs, 10);
        assert_eq!(config.service.topic_prefix, "2706");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_invalid_qos() {
        let mut config = AppConfig::default();
        config.mqtt.qos = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_flush_period() {
        let mut config = AppConfig::default();
        config.service.flush_period_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_empty_topic_prefix() {
        let mut config = AppConfig::default();
        config.service.topic_prefix = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_utc_offset() {
        let mut service = ServiceConfig::default();
        assert_eq!(service.utc_offset().unwrap().local_minus_utc(), 0);
        service.utc_offset_hours = 8;
        assert_eq!(service.utc_offset().unwrap().local_minus_utc(), 8 * 3600);
        service.utc_offset_hours = 30;
        assert!(service.utc_offset().is_err());
    }
}
