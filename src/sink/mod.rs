// =====================================================
// STORAGE SINK
// Executes assembled inserts against the target engine
// =====================================================

pub mod mysql;
pub mod postgres;
pub mod sqlite;

use crate::assembler::{BoundValue, InsertStatement, SqlDialect};
use crate::coercion::CoercedValue;
use crate::mapping::TargetType;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

pub use mysql::MySqlSink;
pub use postgres::PostgresSink;
pub use sqlite::SqliteSink;

pub(crate) const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);
pub(crate) const IDLE_TIMEOUT: Duration = Duration::from_secs(300);
pub(crate) const MAX_LIFETIME: Duration = Duration::from_secs(1800);
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("{0}")]
    Connect(String),
    #[error("{0}")]
    Execute(String),
}

/// Connection settings handed to a connector, derived from the `ready`
/// options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SinkOptions {
    pub dialect: SqlDialect,
    pub host: String,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub ssl_mode: Option<String>,
    pub max_connections: Option<u32>,
}

impl SinkOptions {
    pub fn max_connections(&self) -> u32 {
        self.max_connections
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_MAX_CONNECTIONS)
    }

    pub fn database(&self) -> Option<&str> {
        self.database
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

/// Storage collaborator. One instance is shared by every in-flight record.
#[async_trait]
pub trait Sink: Send + Sync {
    fn dialect(&self) -> SqlDialect;

    /// Execute one insert; returns the affected row count.
    async fn execute(&self, statement: &InsertStatement) -> Result<u64, SinkError>;

    async fn close(&self);
}

#[async_trait]
pub trait SinkConnector: Send + Sync {
    async fn connect(&self, options: &SinkOptions) -> Result<Arc<dyn Sink>, SinkError>;
}

/// Connector for the bundled sqlx sinks, chosen by dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlxConnector;

#[async_trait]
impl SinkConnector for SqlxConnector {
    async fn connect(&self, options: &SinkOptions) -> Result<Arc<dyn Sink>, SinkError> {
        let sink: Arc<dyn Sink> = match options.dialect {
            SqlDialect::Postgres => Arc::new(PostgresSink::connect(options).await?),
            SqlDialect::MySql => Arc::new(MySqlSink::connect(options).await?),
            SqlDialect::Sqlite => Arc::new(SqliteSink::connect(options).await?),
        };
        log::info!(
            "Connected to {} sink at {}",
            options.dialect,
            describe_target(options)
        );
        Ok(sink)
    }
}

fn describe_target(options: &SinkOptions) -> String {
    match (options.dialect, options.database()) {
        (SqlDialect::Sqlite, Some(database)) => database.to_string(),
        (_, Some(database)) => format!("{}/{}", options.host, database),
        (_, None) => options.host.clone(),
    }
}

/// First entry of a comma separated contact point list.
pub(crate) fn primary_host(host: &str) -> String {
    host.split(',')
        .map(str::trim)
        .find(|value| !value.is_empty())
        .unwrap_or("localhost")
        .to_string()
}

pub(crate) fn connect_error(engine: &str, host: &str, port: u16, error: sqlx::Error) -> SinkError {
    let err_msg = error.to_string();
    if err_msg.contains("connection refused") || err_msg.contains("os error 111") {
        return SinkError::Connect(format!(
            "Connection Refused. Check if {} is running on {}:{}",
            engine, host, port
        ));
    }
    if err_msg.contains("timed out") {
        return SinkError::Connect(format!(
            "Connection Timed Out. The server at {}:{} did not respond within {} seconds.",
            host,
            port,
            ACQUIRE_TIMEOUT.as_secs()
        ));
    }
    SinkError::Connect(format!("Failed to create {} pool: {}", engine, error))
}

/// Driver-neutral parameter. Nulls keep a type so strictly typed engines can
/// plan the statement.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SqlParam {
    Text(Option<String>),
    Int(Option<i64>),
    Float(Option<f64>),
    Bool(Option<bool>),
    Timestamp(Option<DateTime<Utc>>),
    Date(Option<NaiveDate>),
    Time(Option<NaiveTime>),
    Json(Option<Value>),
    Bytes(Option<Vec<u8>>),
    Decimal(Option<Decimal>),
    Uuid(Option<Uuid>),
}

impl SqlParam {
    pub(crate) fn from_bound(param: &BoundValue) -> Self {
        match &param.value {
            CoercedValue::Null => Self::typed_null(param.target),
            CoercedValue::Text(text) => SqlParam::Text(Some(text.clone())),
            CoercedValue::Integer(v) => SqlParam::Int(Some(*v)),
            CoercedValue::Float(v) => SqlParam::Float(Some(*v)),
            CoercedValue::Boolean(v) => SqlParam::Bool(Some(*v)),
            CoercedValue::Timestamp(v) => SqlParam::Timestamp(Some(*v)),
            CoercedValue::Date(v) => SqlParam::Date(Some(*v)),
            CoercedValue::Time(v) => SqlParam::Time(Some(*v)),
            CoercedValue::Json(v) => SqlParam::Json(Some(v.clone())),
            CoercedValue::BigInt(v) => SqlParam::Text(Some(v.to_string())),
            CoercedValue::Blob(v) => SqlParam::Bytes(Some(v.clone())),
            CoercedValue::Decimal(v) => SqlParam::Decimal(Some(*v)),
            CoercedValue::Inet(v) => SqlParam::Text(Some(v.to_string())),
            CoercedValue::Uuid(v) => SqlParam::Uuid(Some(*v)),
            CoercedValue::Tuple(items) => SqlParam::Json(Some(Value::Array(items.clone()))),
            CoercedValue::Raw(raw) => Self::from_raw(raw, param.target),
        }
    }

    // Fallback values bind by their JSON kind.
    fn from_raw(raw: &Value, target: Option<TargetType>) -> Self {
        match raw {
            Value::Null => Self::typed_null(target),
            Value::String(text) => SqlParam::Text(Some(text.clone())),
            Value::Bool(v) => SqlParam::Bool(Some(*v)),
            Value::Number(number) => match number.as_i64() {
                Some(v) => SqlParam::Int(Some(v)),
                None => SqlParam::Float(number.as_f64()),
            },
            Value::Object(_) | Value::Array(_) => SqlParam::Json(Some(raw.clone())),
        }
    }

    fn typed_null(target: Option<TargetType>) -> Self {
        match target {
            Some(TargetType::Integer) => SqlParam::Int(None),
            Some(TargetType::Float) => SqlParam::Float(None),
            Some(TargetType::Boolean) => SqlParam::Bool(None),
            Some(TargetType::Timestamp) => SqlParam::Timestamp(None),
            Some(TargetType::Date) => SqlParam::Date(None),
            Some(TargetType::Time) => SqlParam::Time(None),
            Some(
                TargetType::Map | TargetType::List | TargetType::Set | TargetType::Tuple,
            ) => SqlParam::Json(None),
            Some(TargetType::Blob) => SqlParam::Bytes(None),
            Some(TargetType::Decimal) => SqlParam::Decimal(None),
            Some(TargetType::Uuid | TargetType::TimeUuid) => SqlParam::Uuid(None),
            Some(TargetType::String | TargetType::BigInt | TargetType::Inet) | None => {
                SqlParam::Text(None)
            }
        }
    }
}

#[cfg(test)]
mod tests;
