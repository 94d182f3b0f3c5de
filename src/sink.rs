//! Persistence sink abstraction.
//!
//! This module defines the Sink trait and concrete implementations for
//! writing snapshot records to various destinations (PostgreSQL, logs).

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::error::SinkError;
use crate::reading::Reading;

/// One row bound for an append-only channel table. The `id` surrogate key
/// is assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub table: &'static str,
    pub timestamp: String,
    pub fields: serde_json::Map<String, Value>,
}

impl Record {
    /// Flatten a canonical reading into its column map.
    pub fn new(table: &'static str, timestamp: String, reading: &Reading) -> Self {
        let fields = match serde_json::to_value(reading) {
            Ok(Value::Object(map)) => map,
            // Readings are plain field structs; anything else is a bug in
            // the reading definitions, not in the message.
            _ => serde_json::Map::new(),
        };
        Record {
            table,
            timestamp,
            fields,
        }
    }
}

/// Trait for persisting snapshot records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Sink: Send + Sync {
    /// Insert a single record into its table.
    async fn insert(&self, record: &Record) -> Result<(), SinkError>;
}

/// PostgreSQL sink backed by an sqlx connection pool.
pub struct PostgresSink {
    pool: PgPool,
}

impl PostgresSink {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, SinkError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(|e| SinkError::ConnectionError(e.to_string()))?;
        info!(max_connections = config.max_connections, "connected to database");
        Ok(Self { pool })
    }
}

#[async_trait]
impl Sink for PostgresSink {
    async fn insert(&self, record: &Record) -> Result<(), SinkError> {
        // Table and column names come from the fixed channel definitions,
        // never from the payload; only values are bound.
        let mut query = QueryBuilder::<Postgres>::new("INSERT INTO ");
        query.push(record.table);
        query.push(" (timestamp");
        for column in record.fields.keys() {
            query.push(", ");
            query.push(column.as_str());
        }
        query.push(") VALUES (");
        let mut values = query.separated(", ");
        values.push_bind(&record.timestamp);
        for value in record.fields.values() {
            match value {
                Value::Number(n) => values.push_bind(n.as_f64().unwrap_or(0.0)),
                Value::Bool(b) => values.push_bind(*b),
                Value::String(s) => values.push_bind(s.as_str()),
                _ => values.push_bind(None::<String>),
            };
        }
        query.push(")");

        query
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| SinkError::InsertError {
                table: record.table.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }
}

/// Dry-run sink that logs records instead of persisting them (`--no-db`).
pub struct LoggingSink;

#[async_trait]
impl Sink for LoggingSink {
    async fn insert(&self, record: &Record) -> Result<(), SinkError> {
        debug!(
            table = record.table,
            timestamp = %record.timestamp,
            fields = %serde_json::Value::Object(record.fields.clone()),
            "dry-run insert"
        );
        Ok(())
    }
}

/// In-memory sink for tests: keeps every inserted record.
#[cfg(test)]
#[derive(Default)]
pub struct MemorySink {
    records: std::sync::Mutex<Vec<Record>>,
}

#[cfg(test)]
impl MemorySink {
    pub fn records(&self) -> Vec<Record> {
        self.records.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl Sink for MemorySink {
    async fn insert(&self, record: &Record) -> Result<(), SinkError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::{PowerReading, StatusReading};

    #[test]
    fn test_record_flattens_reading() {
        let reading = Reading::Status(StatusReading { status: true });
        let record = Record::new("ac_control_log", "2024-01-01 00:00:00".into(), &reading);
        assert_eq!(record.table, "ac_control_log");
        assert_eq!(record.fields.get("status"), Some(&Value::Bool(true)));
        assert_eq!(record.fields.len(), 1);
    }

    #[test]
    fn test_record_keeps_derived_columns() {
        let reading = Reading::Power(PowerReading {
            in_a: 10.0,
            in_b: 10.0,
            in_c: 10.0,
            in_avg: 10.0,
            kw_a: 1.27,
            kw_b: 1.27,
            kw_c: 1.27,
            kw_tot: 3.81,
        });
        let record = Record::new("power_box", "2024-01-01 00:00:00".into(), &reading);
        assert_eq!(record.fields.len(), 8);
        assert!(record.fields.get("kw_tot").unwrap().as_f64().unwrap() > 3.8);
    }

    #[tokio::test]
    async fn test_logging_sink_accepts_everything() {
        let sink = LoggingSink;
        let record = Record::new(
            "server_room",
            "2024-01-01 00:00:00".into(),
            &Reading::Status(StatusReading::default()),
        );
        assert!(sink.insert(&record).await.is_ok());
    }
}
