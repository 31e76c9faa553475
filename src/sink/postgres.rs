// =====================================================
// POSTGRESQL SINK
// =====================================================

use super::{
    connect_error, primary_host, Sink, SinkError, SinkOptions, SqlParam, ACQUIRE_TIMEOUT,
    IDLE_TIMEOUT, MAX_LIFETIME,
};
use crate::assembler::{InsertStatement, SqlDialect};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{ConnectOptions, Database, Pool, Postgres};

const DEFAULT_PORT: u16 = 5432;

type PgQuery<'q> = Query<'q, Postgres, <Postgres as Database>::Arguments<'q>>;

pub struct PostgresSink {
    pool: Pool<Postgres>,
}

impl PostgresSink {
    pub fn from_pool(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn connect(options: &SinkOptions) -> Result<Self, SinkError> {
        Ok(Self::from_pool(create_pool(options).await?))
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

fn build_connect_options(options: &SinkOptions, host: &str, port: u16) -> PgConnectOptions {
    let mut connect = PgConnectOptions::new().host(host).port(port);

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
            "disable" => connect.ssl_mode(PgSslMode::Disable),
            "prefer" => connect.ssl_mode(PgSslMode::Prefer),
            "require" => connect.ssl_mode(PgSslMode::Require),
            _ => connect,
        };
    }

    connect.log_statements(log::LevelFilter::Debug)
}

pub async fn create_pool(options: &SinkOptions) -> Result<Pool<Postgres>, SinkError> {
    let host = primary_host(&options.host);
    let port = options.port.unwrap_or(DEFAULT_PORT);

    PgPoolOptions::new()
        .max_connections(options.max_connections())
        .min_connections(1)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .idle_timeout(IDLE_TIMEOUT)
        .max_lifetime(MAX_LIFETIME)
        .connect_with(build_connect_options(options, &host, port))
        .await
        .map_err(|e| connect_error("PostgreSQL", &host, port, e))
}

fn bind_param<'q>(query: PgQuery<'q>, param: SqlParam) -> PgQuery<'q> {
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
        SqlParam::Uuid(v) => query.bind(v),
    }
}

#[async_trait]
impl Sink for PostgresSink {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Postgres
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
