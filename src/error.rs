//! Custom error types for the sensors-to-db service.
//!
//! This module defines domain-specific error types using thiserror,
//! providing clear error messages and proper error context propagation.

use thiserror::Error;

/// Errors raised while validating an inbound reading
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("malformed reading for channel '{channel}': {reason} (payload: {payload})")]
    MalformedReading {
        channel: &'static str,
        reason: String,
        payload: String,
    },
}

/// Errors related to the persistence sink
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("database connection failed: {0}")]
    ConnectionError(String),

    #[error("insert into '{table}' failed: {message}")]
    InsertError { table: String, message: String },
}

/// Errors related to MQTT operations
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("MQTT connection failed: {0}")]
    ConnectionError(String),

    #[error("MQTT subscription failed: {0}")]
    SubscriptionError(String),

    #[error("Invalid MQTT configuration: {0}")]
    ConfigError(String),
}

/// Errors related to application configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    LoadError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Application-level errors that can wrap other error types
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("MQTT error: {0}")]
    Mqtt(#[from] MqttError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Convenience type alias for Results using AppError
pub type Result<T> = std::result::Result<T, AppError>;
