// =====================================================
// MYSQL SINK
// =====================================================

use super::{
    connect_error, primary_host, Sink, SinkError, SinkOptions, SqlParam, ACQUIRE_TIMEOUT,
    IDLE_TIMEOUT, MAX_LIFETIME,
};
use crate::assembler::{InsertStatement, SqlDialect};
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions, MySqlSslMode};
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{ConnectOptions, Database, MySql, Pool};

const DEFAULT_PORT: u16 = 3306;

type MySqlQuery<'q> = Query<'q, MySql, <MySql as Database>::Arguments<'q>>;

pub struct MySqlSink {
    pool: Pool<MySql>,
}

impl MySqlSink {
    pub fn from_pool(pool: Pool<MySql>) -> Self {
        Self { pool }
    }

    pub async fn connect(options: &SinkOptions) -> Result<Self, SinkError> {
        Ok(Self::from_pool(create_pool(options).await?))
    }

    pub fn pool(&self) -> &Pool<MySql> {
        &self.pool
    }
}

fn build_connect_options(options: &SinkOptions, host: &str, port: u16) -> MySqlConnectOptions {
    let mut connect = MySqlConnectOptions::new().host(host).port(port);

    if let Some(user) = &options.user {
        connect = connect.username(user);
    }

    if let Some(pwd) = &options.password {
        connect = connect.password(pwd);
    }

    if let Some(db) = options.database() {
        connect = connect.database(db);
    }

    if let Some(ssl) = &options.ssl_mode {
        connect = match ssl.as_str() {
            "disable" => connect.ssl_mode(MySqlSslMode::Disabled),
            "prefer" => connect.ssl_mode(MySqlSslMode::Preferred),
            "require" => connect.ssl_mode(MySqlSslMode::Required),
            _ => connect,
        };
    }

    connect.log_statements(log::LevelFilter::Debug)
}

pub async fn create_pool(options: &SinkOptions) -> Result<Pool<MySql>, SinkError> {
    let host = primary_host(&options.host);
    let port = options.port.unwrap_or(DEFAULT_PORT);

    MySqlPoolOptions::new()
        .max_connections(options.max_connections())
        .min_connections(1)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .idle_timeout(IDLE_TIMEOUT)
        .max_lifetime(MAX_LIFETIME)
        .connect_with(build_connect_options(options, &host, port))
        .await
        .map_err(|e| connect_error("MySQL", &host, port, e))
}

// Identifiers go in as text; MySQL's native UUID encoding is BINARY(16).
fn bind_param<'q>(query: MySqlQuery<'q>, param: SqlParam) -> MySqlQuery<'q> {
    match param {
        SqlParam::Text(v) => query.bind(v),
        SqlParam::Int(v) => query.bind(v),
        SqlParam::Float(v) => query.bind(v),
        SqlParam::Bool(v) => query.bind(v),
        SqlParam::Timestamp(v) => query.bind(v),
        SqlParam::Date(v) => query.bind(v),
        SqlParam::Time(v) => query.bind(v),
        SqlParam::Json(v) => query.bind(v.map(Json)),
        SqlParam::Bytes(v) => query.bind(v),
        SqlParam::Decimal(v) => query.bind(v),
        SqlParam::Uuid(v) => query.bind(v.map(|id| id.hyphenated().to_string())),
    }
}

#[async_trait]
impl Sink for MySqlSink {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::MySql
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
