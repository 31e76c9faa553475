use super::*;
use crate::assembler::RowAssembler;
use crate::mapping::parse_field_mapping;
use serde_json::json;
use sqlx::Row;

fn bound(target: Option<TargetType>, value: CoercedValue) -> BoundValue {
    BoundValue {
        name: "val1".to_string(),
        target,
        value,
    }
}

#[test]
fn nulls_carry_the_column_type() {
    assert_eq!(
        SqlParam::from_bound(&bound(Some(TargetType::Integer), CoercedValue::Null)),
        SqlParam::Int(None)
    );
    assert_eq!(
        SqlParam::from_bound(&bound(Some(TargetType::TimeUuid), CoercedValue::Null)),
        SqlParam::Uuid(None)
    );
    assert_eq!(
        SqlParam::from_bound(&bound(Some(TargetType::Tuple), CoercedValue::Null)),
        SqlParam::Json(None)
    );
    assert_eq!(
        SqlParam::from_bound(&bound(None, CoercedValue::Raw(Value::Null))),
        SqlParam::Text(None)
    );
}

#[test]
fn fallback_values_bind_by_json_kind() {
    let target = Some(TargetType::Integer);
    assert_eq!(
        SqlParam::from_bound(&bound(target, CoercedValue::Raw(json!("warm")))),
        SqlParam::Text(Some("warm".to_string()))
    );
    assert_eq!(
        SqlParam::from_bound(&bound(target, CoercedValue::Raw(json!(false)))),
        SqlParam::Bool(Some(false))
    );
    assert_eq!(
        SqlParam::from_bound(&bound(target, CoercedValue::Raw(json!({"a": 1})))),
        SqlParam::Json(Some(json!({"a": 1})))
    );
    assert_eq!(
        SqlParam::from_bound(&bound(target, CoercedValue::Raw(json!(u64::MAX)))),
        SqlParam::Float(Some(u64::MAX as f64))
    );
}

#[test]
fn text_bound_kinds_render_canonically() {
    assert_eq!(
        SqlParam::from_bound(&bound(
            Some(TargetType::BigInt),
            CoercedValue::BigInt("123456789012345678901234567890".parse().unwrap())
        )),
        SqlParam::Text(Some("123456789012345678901234567890".to_string()))
    );
    assert_eq!(
        SqlParam::from_bound(&bound(
            Some(TargetType::Inet),
            CoercedValue::Inet("10.0.0.1".parse().unwrap())
        )),
        SqlParam::Text(Some("10.0.0.1".to_string()))
    );
    assert_eq!(
        SqlParam::from_bound(&bound(
            Some(TargetType::Tuple),
            CoercedValue::Tuple(vec![json!(1), json!("x")])
        )),
        SqlParam::Json(Some(json!([1, "x"])))
    );
}

#[test]
fn first_contact_point_is_used() {
    assert_eq!(primary_host("db1.local, db2.local"), "db1.local");
    assert_eq!(primary_host(" , db2.local"), "db2.local");
    assert_eq!(primary_host(""), "localhost");
}

#[test]
fn max_connections_defaults_when_unset_or_zero() {
    let mut options = SinkOptions::default();
    assert_eq!(options.max_connections(), DEFAULT_MAX_CONNECTIONS);
    options.max_connections = Some(0);
    assert_eq!(options.max_connections(), DEFAULT_MAX_CONNECTIONS);
    options.max_connections = Some(3);
    assert_eq!(options.max_connections(), 3);
}

fn memory_options() -> SinkOptions {
    SinkOptions {
        dialect: SqlDialect::Sqlite,
        database: Some(":memory:".to_string()),
        ..SinkOptions::default()
    }
}

#[tokio::test]
async fn sqlite_sink_inserts_coerced_rows() {
    let sink = SqliteSink::connect(&memory_options()).await.unwrap();
    sqlx::query(
        "CREATE TABLE readings (temp INTEGER, is_normal BOOLEAN, taken_at TEXT, meta TEXT, device TEXT, payload BLOB)",
    )
    .execute(sink.pool())
    .await
    .unwrap();

    let mappings = parse_field_mapping(Some(
        r#"{
            "temp": {"source_field": "temperature", "data_type": "Integer"},
            "is_normal": {"source_field": "normal", "data_type": "Boolean"},
            "taken_at": {"source_field": "ts", "data_type": "Timestamp", "output_format": "YYYY-MM-DD"},
            "meta": {"source_field": "meta", "data_type": "Map"},
            "device": {"source_field": "device", "data_type": "Uuid"},
            "payload": {"source_field": "payload", "data_type": "Blob"}
        }"#,
    ))
    .unwrap();
    let assembler = RowAssembler::new(SqlDialect::Sqlite, "readings", mappings).unwrap();

    let record = json!({
        "temperature": "23",
        "normal": "true",
        "ts": "2020-01-15T10:30:00Z",
        "meta": "{\"unit\":\"C\"}",
        "device": "6f1c1c5e-8f4e-4a9e-9d33-4b1e2d3c4b5a",
        "payload": {"type": "Buffer", "data": [1, 2, 3]}
    });
    let statement = assembler.assemble_row(record.as_object().unwrap()).await;
    assert_eq!(sink.execute(&statement).await.unwrap(), 1);

    let row = sqlx::query("SELECT temp, is_normal, taken_at, meta, device, payload FROM readings")
        .fetch_one(sink.pool())
        .await
        .unwrap();
    assert_eq!(row.get::<i64, _>("temp"), 23);
    assert!(row.get::<bool, _>("is_normal"));
    assert_eq!(row.get::<String, _>("taken_at"), "2020-01-15");
    assert_eq!(row.get::<String, _>("meta"), "{\"unit\":\"C\"}");
    assert_eq!(
        row.get::<String, _>("device"),
        "6f1c1c5e-8f4e-4a9e-9d33-4b1e2d3c4b5a"
    );
    assert_eq!(row.get::<Vec<u8>, _>("payload"), vec![1, 2, 3]);

    sink.close().await;
}

#[tokio::test]
async fn sqlite_sink_reports_rejected_inserts() {
    let sink = SqliteSink::connect(&memory_options()).await.unwrap();
    let mappings = parse_field_mapping(Some(r#"{"temp": {"source_field": "t"}}"#)).unwrap();
    let assembler = RowAssembler::new(SqlDialect::Sqlite, "missing_table", mappings).unwrap();

    let statement = assembler.assemble_row(json!({"t": 1}).as_object().unwrap()).await;
    let error = sink.execute(&statement).await.unwrap_err();
    assert!(matches!(error, SinkError::Execute(_)));
    assert!(error.to_string().contains("missing_table"));
}

#[tokio::test]
async fn sqlite_requires_a_path() {
    let options = SinkOptions {
        dialect: SqlDialect::Sqlite,
        ..SinkOptions::default()
    };
    let error = SqlxConnector.connect(&options).await.err().unwrap();
    assert!(matches!(error, SinkError::Connect(_)));
}

fn integration_enabled() -> bool {
    std::env::var("FIELDCAST_RUN_INTEGRATION_DB_TESTS")
        .map(|value| {
            let normalized = value.trim().to_ascii_lowercase();
            matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
        })
        .unwrap_or(false)
}

fn env_or_default(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn it_options(dialect: SqlDialect, prefix: &str, port: u16) -> SinkOptions {
    SinkOptions {
        dialect,
        host: env_or_default(&format!("FIELDCAST_IT_{}_HOST", prefix), "127.0.0.1"),
        port: env_or_default(&format!("FIELDCAST_IT_{}_PORT", prefix), &port.to_string())
            .parse()
            .ok(),
        user: Some(env_or_default(&format!("FIELDCAST_IT_{}_USER", prefix), "fieldcast")),
        password: Some(env_or_default(
            &format!("FIELDCAST_IT_{}_PASSWORD", prefix),
            "fieldcast",
        )),
        database: Some(env_or_default(
            &format!("FIELDCAST_IT_{}_DATABASE", prefix),
            "fieldcast_it",
        )),
        ssl_mode: None,
        max_connections: Some(2),
    }
}

fn typed_mappings() -> crate::mapping::FieldMappings {
    parse_field_mapping(Some(
        r#"{
            "temp": {"source_field": "temperature", "data_type": "Integer"},
            "taken_at": {"source_field": "ts", "data_type": "Timestamp"},
            "total": {"source_field": "total", "data_type": "Decimal"},
            "meta": {"source_field": "meta", "data_type": "JSON"},
            "missing": {"source_field": "nope", "data_type": "Float"}
        }"#,
    ))
    .unwrap()
}

fn typed_record() -> Value {
    json!({
        "temperature": 23,
        "ts": "2015-11-27T11:04:13.539Z",
        "total": "12.50",
        "meta": {"unit": "C"}
    })
}

#[tokio::test]
#[ignore = "requires PostgreSQL integration environment"]
async fn integration_postgres_insert() -> Result<(), String> {
    if !integration_enabled() {
        return Ok(());
    }

    let sink = PostgresSink::connect(&it_options(SqlDialect::Postgres, "POSTGRES", 55432))
        .await
        .map_err(|e| e.to_string())?;
    sqlx::query("DROP TABLE IF EXISTS fieldcast_readings")
        .execute(sink.pool())
        .await
        .map_err(|e| e.to_string())?;
    sqlx::query(
        "CREATE TABLE fieldcast_readings (temp INTEGER, taken_at TIMESTAMPTZ, total NUMERIC(10,2), meta JSONB, missing DOUBLE PRECISION)",
    )
    .execute(sink.pool())
    .await
    .map_err(|e| e.to_string())?;

    let assembler = RowAssembler::new(SqlDialect::Postgres, "fieldcast_readings", typed_mappings())
        .map_err(|e| e.to_string())?;
    let record = typed_record();
    let statement = assembler.assemble_row(record.as_object().unwrap()).await;
    let affected = sink.execute(&statement).await.map_err(|e| e.to_string())?;
    assert_eq!(affected, 1);

    let row = sqlx::query(
        "SELECT temp, total::text AS total, meta->>'unit' AS unit, missing FROM fieldcast_readings",
    )
    .fetch_one(sink.pool())
    .await
    .map_err(|e| e.to_string())?;
    assert_eq!(row.get::<i32, _>("temp"), 23);
    assert_eq!(row.get::<String, _>("total"), "12.50");
    assert_eq!(row.get::<String, _>("unit"), "C");
    assert_eq!(row.get::<Option<f64>, _>("missing"), None);

    sink.close().await;
    Ok(())
}

#[tokio::test]
#[ignore = "requires MySQL integration environment"]
async fn integration_mysql_insert() -> Result<(), String> {
    if !integration_enabled() {
        return Ok(());
    }

    let sink = MySqlSink::connect(&it_options(SqlDialect::MySql, "MYSQL", 33306))
        .await
        .map_err(|e| e.to_string())?;
    sqlx::query("DROP TABLE IF EXISTS fieldcast_readings")
        .execute(sink.pool())
        .await
        .map_err(|e| e.to_string())?;
    sqlx::query(
        "CREATE TABLE fieldcast_readings (temp INT, taken_at DATETIME(3), total DECIMAL(10,2), meta JSON, missing DOUBLE)",
    )
    .execute(sink.pool())
    .await
    .map_err(|e| e.to_string())?;

    let assembler = RowAssembler::new(SqlDialect::MySql, "fieldcast_readings", typed_mappings())
        .map_err(|e| e.to_string())?;
    let record = typed_record();
    let statement = assembler.assemble_row(record.as_object().unwrap()).await;
    let affected = sink.execute(&statement).await.map_err(|e| e.to_string())?;
    assert_eq!(affected, 1);

    let row = sqlx::query("SELECT temp, CAST(total AS CHAR) AS total FROM fieldcast_readings")
        .fetch_one(sink.pool())
        .await
        .map_err(|e| e.to_string())?;
    assert_eq!(row.get::<i32, _>("temp"), 23);
    assert_eq!(row.get::<String, _>("total"), "12.50");

    sink.close().await;
    Ok(())
}
