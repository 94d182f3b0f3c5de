//! Main entry point for the sensors-to-db service.
//!
//! Subscribes to the sensor fleet's MQTT topics, validates and buffers
//! the latest reading per channel, and persists one snapshot row per
//! channel per flush period. Bootstrap order: CLI, tracing, config,
//! sink, buffers/router, flush tasks, then the MQTT event loop until
//! the process is killed.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;

mod buffer;
mod cli;
mod config;
mod error;
mod flush;
mod mqtt_handler;
mod reading;
mod router;
mod sink;
mod units;

use buffer::BufferStore;
use config::AppConfig;
use mqtt_handler::MqttHandler;
use router::Router;
use sink::{LoggingSink, PostgresSink, Sink};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse_args();
    init_tracing(&cli);

    let mut config = AppConfig::load(&cli.config)?;
    config.apply_cli_overrides(&cli);
    config.validate()?;
    let offset = config.service.utc_offset()?;

    let sink: Arc<dyn Sink> = if cli.no_db {
        info!("database writes disabled, records will be logged instead");
        Arc::new(LoggingSink)
    } else {
        if config.database.url.is_empty() {
            anyhow::bail!(
                "database.url is not configured (set SENSORS_DB_DATABASE__URL or pass --database-url)"
            );
        }
        Arc::new(PostgresSink::connect(&config.database).await?)
    };

    let buffers = Arc::new(BufferStore::new());
    let router = Arc::new(Router::new(
        Arc::clone(&buffers),
        Arc::clone(&sink),
        config.service.topic_prefix.clone(),
        offset,
    ));

    let period = Duration::from_secs(config.service.flush_period_secs);
    let flush_tasks = flush::spawn_flush_tasks(buffers, Arc::clone(&sink), period, offset);
    info!(
        channels = flush_tasks.len(),
        period_secs = config.service.flush_period_secs,
        "flush scheduler started"
    );

    let handler = MqttHandler::new(
        &config.mqtt,
        Duration::from_millis(config.service.reconnect_delay_ms),
        router,
    )?;
    info!(host = %config.mqtt.host, port = config.mqtt.port, "starting MQTT ingest loop");

    tokio::select! {
        _ = handler.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received, exiting");
        }
    }

    Ok(())
}

fn init_tracing(cli: &cli::Cli) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log_level.to_filter_string()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
