// =====================================================
// SQLITE SINK
// =====================================================

use super::{Sink, SinkError, SinkOptions, SqlParam, ACQUIRE_TIMEOUT, IDLE_TIMEOUT, MAX_LIFETIME};
use crate::assembler::{InsertStatement, SqlDialect};
use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{ConnectOptions, Database, Pool, Sqlite};
use std::str::FromStr;

const IN_MEMORY: &str = ":memory:";

type SqliteQuery<'q> = Query<'q, Sqlite, <Sqlite as Database>::Arguments<'q>>;

pub struct SqliteSink {
    pool: Pool<Sqlite>,
}

impl SqliteSink {
    pub fn from_pool(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub async fn connect(options: &SinkOptions) -> Result<Self, SinkError> {
        Ok(Self::from_pool(create_pool(options).await?))
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

/// The database file comes from `database`, falling back to `host`.
fn database_path(options: &SinkOptions) -> String {
    options
        .database()
        .map(str::to_string)
        .unwrap_or_else(|| options.host.trim().to_string())
}

fn build_connect_options(db_path: &str) -> Result<SqliteConnectOptions, SinkError> {
    let options = if db_path == IN_MEMORY || db_path == "sqlite::memory:" {
        SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| SinkError::Connect(format!("Invalid SQLite options: {}", e)))?
    } else {
        SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
    };

    Ok(options.log_statements(log::LevelFilter::Debug))
}

pub async fn create_pool(options: &SinkOptions) -> Result<Pool<Sqlite>, SinkError> {
    let db_path = database_path(options);
    if db_path.is_empty() {
        return Err(SinkError::Connect(
            "Database file path is required".to_string(),
        ));
    }

    let connect = build_connect_options(&db_path)?;

    // An in-memory database lives as long as its single connection.
    let pool_options = if db_path.ends_with(IN_MEMORY) {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new()
            .max_connections(options.max_connections())
            .min_connections(1)
            .idle_timeout(IDLE_TIMEOUT)
            .max_lifetime(MAX_LIFETIME)
    };

    pool_options
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect_with(connect)
        .await
        .map_err(|e| SinkError::Connect(format!("Failed to create SQLite pool: {}", e)))
}

fn bind_param<'q>(query: SqliteQuery<'q>, param: SqlParam) -> SqliteQuery<'q> {
    match param {
        SqlParam::Text(v) => query.bind(v),
        SqlParam::Int(v) => query.bind(v),
        SqlParam::Float(v) => query.bind(v),
        SqlParam::Bool(v) => query.bind(v),
        SqlParam::Timestamp(v) => query.bind(v),
        SqlParam::Date(v) => query.bind(v),
        SqlParam::Time(v) => query.bind(v),
        SqlParam::Bytes(v) => query.bind(v),
        // No native JSON, decimal or identifier storage; kept as text.
        SqlParam::Json(v) => query.bind(v.map(|value| value.to_string())),
        SqlParam::Decimal(v) => query.bind(v.map(|value| value.to_string())),
        SqlParam::Uuid(v) => query.bind(v.map(|value| value.to_string())),
    }
}

#[async_trait]
impl Sink for SqliteSink {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Sqlite
    }

    async fn execute(&self, statement: &InsertStatement) -> Result<u64, SinkError> {
        let mut query = sqlx::query(&statement.sql).persistent(statement.prepare);
        for param in &statement.params {
            query = bind_param(query, SqlParam::from_bound(param));
        }

        let result = query
            .execute(&self.pool)
            .await
            .map_err(|e| SinkError::Execute(e.to_string()))?;
        Ok(result.rows_affected())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
