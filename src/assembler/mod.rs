// =====================================================
// ROW ASSEMBLER
// Turns coerced fields into a parameterized INSERT
// =====================================================

use crate::coercion::{coerce_field, CoercedValue, Coercion};
use crate::error::AdapterError;
use crate::mapping::{FieldMappings, TargetType};
use futures::future::join_all;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// SQL flavour of the target engine. Drives identifier quoting and
/// placeholder syntax.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SqlDialect {
    #[default]
    Postgres,
    MySql,
    Sqlite,
}

impl SqlDialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            SqlDialect::Postgres => "postgres",
            SqlDialect::MySql => "mysql",
            SqlDialect::Sqlite => "sqlite",
        }
    }

    pub fn quote_identifier(&self, name: &str) -> String {
        match self {
            SqlDialect::MySql => quote_identifier_mysql(name),
            SqlDialect::Postgres | SqlDialect::Sqlite => quote_identifier_postgres(name),
        }
    }

    /// `schema.table` is split and each part quoted on its own.
    pub fn qualified_table(&self, table: &str) -> String {
        table
            .split('.')
            .map(|part| self.quote_identifier(part.trim()))
            .collect::<Vec<String>>()
            .join(".")
    }

    /// Placeholder for the 1-based bind position.
    pub fn placeholder(&self, position: usize, target: Option<TargetType>) -> String {
        match self {
            SqlDialect::Postgres => match target {
                // No native driver type for these; bound as text and cast.
                Some(TargetType::BigInt) => format!("${}::numeric", position),
                Some(TargetType::Inet) => format!("${}::inet", position),
                _ => format!("${}", position),
            },
            SqlDialect::MySql => "?".to_string(),
            SqlDialect::Sqlite => format!("?{}", position),
        }
    }

    fn column_key(&self, column: &str) -> String {
        match self {
            SqlDialect::Postgres => column.to_string(),
            // Quoted identifiers still compare case-insensitively here.
            SqlDialect::MySql | SqlDialect::Sqlite => column.to_lowercase(),
        }
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SqlDialect {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "postgres" | "postgresql" | "pg" => Ok(SqlDialect::Postgres),
            "mysql" | "mariadb" => Ok(SqlDialect::MySql),
            "sqlite" => Ok(SqlDialect::Sqlite),
            other => Err(format!(
                "Unsupported dialect '{}'. Expected postgres, mysql or sqlite.",
                other
            )),
        }
    }
}

fn quote_identifier_mysql(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn quote_identifier_postgres(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// One named parameter of an insert, in bind order.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundValue {
    pub name: String,
    pub target: Option<TargetType>,
    pub value: CoercedValue,
}

/// Statement template plus its ordered parameters. Values never appear in
/// `sql`.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub sql: String,
    pub params: Vec<BoundValue>,
    pub prepare: bool,
}

impl InsertStatement {
    pub fn param(&self, name: &str) -> Option<&BoundValue> {
        self.params.iter().find(|param| param.name == name)
    }
}

/// Holds the validated schema and the statement template built from it.
#[derive(Debug, Clone)]
pub struct RowAssembler {
    dialect: SqlDialect,
    table: String,
    mappings: FieldMappings,
    sql: String,
}

impl RowAssembler {
    pub fn new(
        dialect: SqlDialect,
        table: &str,
        mappings: FieldMappings,
    ) -> Result<Self, AdapterError> {
        let table = table.trim();
        if table.is_empty() || table.split('.').any(|part| part.trim().is_empty()) {
            return Err(AdapterError::Configuration(format!(
                "Invalid table name '{}'.",
                table
            )));
        }

        let sql = build_insert_statement(dialect, table, &mappings)?;

        Ok(Self {
            dialect,
            table: table.to_string(),
            mappings,
            sql,
        })
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn mappings(&self) -> &FieldMappings {
        &self.mappings
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Coerce every configured field of `record` and join the results into
    /// one statement. Fields are independent; none can fail the row.
    pub async fn assemble_row(&self, record: &Map<String, Value>) -> InsertStatement {
        let coercions = join_all(
            self.mappings
                .iter()
                .map(|mapping| async move { coerce_field(mapping, record) }),
        )
        .await;

        self.assemble(coercions)
    }

    /// Pair coercion results with their columns, in mapping order.
    pub fn assemble(&self, coercions: Vec<Coercion>) -> InsertStatement {
        let params = self
            .mappings
            .iter()
            .zip(coercions)
            .enumerate()
            .map(|(index, (mapping, coercion))| BoundValue {
                name: bind_name(index + 1),
                target: mapping.target_type,
                value: coercion.into_value(),
            })
            .collect();

        InsertStatement {
            sql: self.sql.clone(),
            params,
            prepare: true,
        }
    }
}

pub fn bind_name(position: usize) -> String {
    format!("val{}", position)
}

fn build_insert_statement(
    dialect: SqlDialect,
    table: &str,
    mappings: &FieldMappings,
) -> Result<String, AdapterError> {
    if mappings.is_empty() {
        return Err(AdapterError::Configuration(
            "Cannot build insert statement without columns. Field mapping has no entries."
                .to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(mappings.len());
    for mapping in mappings {
        if !seen.insert(dialect.column_key(&mapping.column)) {
            return Err(AdapterError::Configuration(format!(
                "Column {} is mapped more than once.",
                mapping.column
            )));
        }
    }

    let quoted_columns = mappings
        .iter()
        .map(|mapping| dialect.quote_identifier(&mapping.column))
        .collect::<Vec<String>>()
        .join(", ");

    let placeholders = mappings
        .iter()
        .enumerate()
        .map(|(index, mapping)| dialect.placeholder(index + 1, mapping.target_type))
        .collect::<Vec<String>>()
        .join(", ");

    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        dialect.qualified_table(table),
        quoted_columns,
        placeholders
    ))
}

#[cfg(test)]
mod tests;
