// =====================================================
// CONFIGURATION
// Host `ready` options and process-level runtime settings
// =====================================================

use crate::assembler::SqlDialect;
use crate::error::AdapterError;
use crate::mapping::{parse_field_mapping, validate_field_mapping, FieldMappings};
use crate::sink::SinkOptions;
use clap::Parser;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 5_000;
pub const DEFAULT_FATAL_EXIT_DELAY_MS: u64 = 5_000;
pub const DEFAULT_MAX_INFLIGHT_RECORDS: usize = 64;

/// Options delivered with the host's `ready` event.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AdapterOptions {
    /// Comma separated contact points; SQL sinks use the first.
    pub host: Option<String>,
    #[serde(deserialize_with = "lenient_number")]
    pub port: Option<u16>,
    #[serde(alias = "username")]
    pub user: Option<String>,
    pub password: Option<String>,
    #[serde(alias = "database")]
    pub keyspace: Option<String>,
    pub schema: Option<String>,
    pub table: Option<String>,
    /// Serialized JSON text, or an already-parsed object.
    #[serde(alias = "fields")]
    pub field_mapping: Option<Value>,
    pub dialect: Option<String>,
    pub ssl_mode: Option<String>,
    #[serde(deserialize_with = "lenient_number")]
    pub max_connections: Option<u32>,
    /// Accepted for compatibility; SQL sinks do not provision storage.
    pub replication: Option<Value>,
}

impl AdapterOptions {
    pub fn from_value(options: Value) -> Result<Self, AdapterError> {
        let options = match options {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        serde_json::from_value(options)
            .map_err(|e| AdapterError::Configuration(format!("Invalid adapter options: {}", e)))
    }

    pub fn validate(&self) -> Result<(), AdapterError> {
        let dialect = self.dialect()?;

        if normalized(&self.table).is_none() {
            return Err(AdapterError::Configuration("table is required".to_string()));
        }

        match dialect {
            SqlDialect::Sqlite => {
                if normalized(&self.keyspace).is_none() && normalized(&self.host).is_none() {
                    return Err(AdapterError::Configuration(
                        "database (or host) must name the SQLite file".to_string(),
                    ));
                }
            }
            SqlDialect::Postgres | SqlDialect::MySql => {
                let has_host = self
                    .host
                    .as_deref()
                    .map(|hosts| hosts.split(',').any(|host| !host.trim().is_empty()))
                    .unwrap_or(false);
                if !has_host {
                    return Err(AdapterError::Configuration("host is required".to_string()));
                }
                if self.port == Some(0) {
                    return Err(AdapterError::Configuration("port must be non-zero".to_string()));
                }
            }
        }

        if self.max_connections == Some(0) {
            return Err(AdapterError::Configuration(
                "max_connections must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    pub fn dialect(&self) -> Result<SqlDialect, AdapterError> {
        self.dialect
            .as_deref()
            .unwrap_or_default()
            .parse::<SqlDialect>()
            .map_err(AdapterError::Configuration)
    }

    pub fn field_mappings(&self) -> Result<FieldMappings, AdapterError> {
        match &self.field_mapping {
            None | Some(Value::Null) => parse_field_mapping(None),
            Some(Value::String(raw)) => parse_field_mapping(Some(raw.as_str())),
            Some(Value::Object(entries)) => validate_field_mapping(entries),
            Some(other) => parse_field_mapping(Some(&other.to_string())),
        }
    }

    /// Table reference, prefixed with `schema` unless already qualified.
    pub fn qualified_table(&self) -> String {
        let table = normalized(&self.table).unwrap_or_default();
        match normalized(&self.schema) {
            Some(schema) if !table.contains('.') => format!("{}.{}", schema, table),
            _ => table.to_string(),
        }
    }

    pub fn sink_options(&self) -> Result<SinkOptions, AdapterError> {
        Ok(SinkOptions {
            dialect: self.dialect()?,
            host: normalized(&self.host).unwrap_or_default().to_string(),
            port: self.port,
            user: normalized(&self.user).map(str::to_string),
            password: self.password.clone(),
            database: normalized(&self.keyspace).map(str::to_string),
            ssl_mode: normalized(&self.ssl_mode).map(str::to_ascii_lowercase),
            max_connections: self.max_connections,
        })
    }
}

fn normalized(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

// Hosts send numbers either as JSON numbers or as numeric strings.
fn lenient_number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    let number = match raw {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(number)) => number.as_u64(),
        Some(Value::String(text)) if text.trim().is_empty() => return Ok(None),
        Some(Value::String(text)) => text.trim().parse::<u64>().ok(),
        Some(_) => None,
    };

    number
        .and_then(|value| T::try_from(value).ok())
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom("expected a non-negative integer in range"))
}

/// Process flags. Each falls back to a `FIELDCAST_*` environment variable.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(
    name = "fieldcast",
    about = "Schema-driven ingestion adapter: JSON records in, typed inserts out",
    version
)]
pub struct RuntimeSettings {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(short = 'l', long = "log-level", env = "FIELDCAST_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Time in-flight inserts get to finish after close
    #[arg(long, env = "FIELDCAST_SHUTDOWN_GRACE_MS", default_value_t = DEFAULT_SHUTDOWN_GRACE_MS)]
    pub shutdown_grace_ms: u64,

    /// Delay between a fatal error notification and process exit
    #[arg(
        long,
        env = "FIELDCAST_FATAL_EXIT_DELAY_MS",
        default_value_t = DEFAULT_FATAL_EXIT_DELAY_MS
    )]
    pub fatal_exit_delay_ms: u64,

    /// Records of one batch inserted concurrently
    #[arg(
        long,
        env = "FIELDCAST_MAX_INFLIGHT_RECORDS",
        default_value_t = DEFAULT_MAX_INFLIGHT_RECORDS
    )]
    pub max_inflight_records: usize,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            log_level: None,
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
            fatal_exit_delay_ms: DEFAULT_FATAL_EXIT_DELAY_MS,
            max_inflight_records: DEFAULT_MAX_INFLIGHT_RECORDS,
        }
    }
}

impl RuntimeSettings {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn fatal_exit_delay(&self) -> Duration {
        Duration::from_millis(self.fatal_exit_delay_ms)
    }

    pub fn max_inflight_records(&self) -> usize {
        self.max_inflight_records.max(1)
    }
}
