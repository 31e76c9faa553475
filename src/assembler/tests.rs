use super::*;
use crate::mapping::parse_field_mapping;
use serde_json::json;

fn mappings(raw: &str) -> FieldMappings {
    parse_field_mapping(Some(raw)).unwrap()
}

fn sample_mappings() -> FieldMappings {
    mappings(
        r#"{
            "temp": {"source_field": "temperature", "data_type": "Integer"},
            "is_normal": {"source_field": "normal", "data_type": "Boolean"},
            "notes": {"source_field": "meta"}
        }"#,
    )
}

#[test]
fn postgres_statement_uses_numbered_placeholders() {
    let assembler =
        RowAssembler::new(SqlDialect::Postgres, "public.readings", sample_mappings()).unwrap();
    assert_eq!(
        assembler.sql(),
        r#"INSERT INTO "public"."readings" ("temp", "is_normal", "notes") VALUES ($1, $2, $3)"#
    );
}

#[test]
fn mysql_statement_uses_backticks_and_question_marks() {
    let assembler = RowAssembler::new(SqlDialect::MySql, "readings", sample_mappings()).unwrap();
    assert_eq!(
        assembler.sql(),
        "INSERT INTO `readings` (`temp`, `is_normal`, `notes`) VALUES (?, ?, ?)"
    );
}

#[test]
fn sqlite_statement_uses_indexed_placeholders() {
    let assembler = RowAssembler::new(SqlDialect::Sqlite, "readings", sample_mappings()).unwrap();
    assert_eq!(
        assembler.sql(),
        r#"INSERT INTO "readings" ("temp", "is_normal", "notes") VALUES (?1, ?2, ?3)"#
    );
}

#[test]
fn postgres_casts_text_bound_types() {
    let fields = mappings(
        r#"{
            "total": {"source_field": "total", "data_type": "Varint"},
            "addr": {"source_field": "addr", "data_type": "Inet"}
        }"#,
    );
    let assembler = RowAssembler::new(SqlDialect::Postgres, "t", fields).unwrap();
    assert!(assembler.sql().ends_with("VALUES ($1::numeric, $2::inet)"));
}

#[test]
fn embedded_quotes_are_doubled() {
    assert_eq!(SqlDialect::Postgres.quote_identifier(r#"we"ird"#), r#""we""ird""#);
    assert_eq!(SqlDialect::MySql.quote_identifier("we`ird"), "`we``ird`");
}

#[test]
fn empty_mapping_is_rejected() {
    let error = RowAssembler::new(SqlDialect::Postgres, "t", FieldMappings::default()).unwrap_err();
    assert!(matches!(error, AdapterError::Configuration(_)));
}

#[test]
fn blank_table_parts_are_rejected() {
    for table in ["", "  ", "public.", ".readings"] {
        let error = RowAssembler::new(SqlDialect::Postgres, table, sample_mappings()).unwrap_err();
        assert!(matches!(error, AdapterError::Configuration(_)), "{}", table);
    }
}

#[test]
fn duplicate_columns_are_rejected_per_dialect() {
    let fields = mappings(
        r#"{
            "Temp": {"source_field": "a"},
            "temp": {"source_field": "b"}
        }"#,
    );
    assert!(RowAssembler::new(SqlDialect::Postgres, "t", fields.clone()).is_ok());
    assert!(RowAssembler::new(SqlDialect::MySql, "t", fields.clone()).is_err());
    assert!(RowAssembler::new(SqlDialect::Sqlite, "t", fields).is_err());

    let padded = mappings(
        r#"{
            "temp": {"source_field": "a"},
            " temp ": {"source_field": "b"}
        }"#,
    );
    let error = RowAssembler::new(SqlDialect::Postgres, "t", padded).unwrap_err();
    assert_eq!(error.to_string(), "Column temp is mapped more than once.");
}

#[tokio::test]
async fn assembled_row_keeps_mapping_order_and_bind_names() {
    let assembler = RowAssembler::new(SqlDialect::Postgres, "readings", sample_mappings()).unwrap();
    let record = json!({
        "meta": {"unit": "C"},
        "normal": "TRUE",
        "temperature": "23"
    });

    let statement = assembler.assemble_row(record.as_object().unwrap()).await;

    assert!(statement.prepare);
    assert_eq!(statement.sql, assembler.sql());
    let names = statement.params.iter().map(|p| p.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["val1", "val2", "val3"]);
    assert_eq!(statement.params[0].value, CoercedValue::Integer(23));
    assert_eq!(statement.params[0].target, Some(TargetType::Integer));
    assert_eq!(statement.params[1].value, CoercedValue::Boolean(true));
    assert_eq!(
        statement.param("val3").map(|p| p.value.clone()),
        Some(CoercedValue::Text("{\"unit\":\"C\"}".to_string()))
    );
}

#[tokio::test]
async fn failed_coercion_still_binds_the_original_value() {
    let assembler = RowAssembler::new(SqlDialect::Sqlite, "readings", sample_mappings()).unwrap();
    let record = json!({"temperature": "warm", "normal": "maybe"});

    let statement = assembler.assemble_row(record.as_object().unwrap()).await;

    assert_eq!(statement.params[0].value, CoercedValue::Raw(json!("warm")));
    assert_eq!(statement.params[1].value, CoercedValue::Raw(json!("maybe")));
    assert_eq!(statement.params[2].value, CoercedValue::Null);
    assert!(!statement.sql.contains("warm"));
}

#[test]
fn dialect_names_parse() {
    assert_eq!("PostgreSQL".parse::<SqlDialect>(), Ok(SqlDialect::Postgres));
    assert_eq!("".parse::<SqlDialect>(), Ok(SqlDialect::Postgres));
    assert_eq!("mysql".parse::<SqlDialect>(), Ok(SqlDialect::MySql));
    assert_eq!("sqlite".parse::<SqlDialect>(), Ok(SqlDialect::Sqlite));
    assert_eq!("pg".parse::<SqlDialect>(), Ok(SqlDialect::Postgres));
    assert_eq!("MariaDB".parse::<SqlDialect>(), Ok(SqlDialect::MySql));
    assert!("cassandra".parse::<SqlDialect>().is_err());
}
