// =====================================================
// FIELD MAPPING VALIDATOR
// Parses the user-supplied column schema once at startup
// =====================================================

use crate::error::AdapterError;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Closed set of column types the coercion engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetType {
    String,
    Integer,
    Float,
    Boolean,
    Timestamp,
    Date,
    Time,
    Map,
    List,
    Set,
    BigInt,
    Blob,
    Decimal,
    Inet,
    Uuid,
    TimeUuid,
    Tuple,
}

impl TargetType {
    pub const ALL: [TargetType; 17] = [
        TargetType::String,
        TargetType::Integer,
        TargetType::Float,
        TargetType::Boolean,
        TargetType::Timestamp,
        TargetType::Date,
        TargetType::Time,
        TargetType::Map,
        TargetType::List,
        TargetType::Set,
        TargetType::BigInt,
        TargetType::Blob,
        TargetType::Decimal,
        TargetType::Inet,
        TargetType::Uuid,
        TargetType::TimeUuid,
        TargetType::Tuple,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::String => "String",
            TargetType::Integer => "Integer",
            TargetType::Float => "Float",
            TargetType::Boolean => "Boolean",
            TargetType::Timestamp => "Timestamp",
            TargetType::Date => "Date",
            TargetType::Time => "Time",
            TargetType::Map => "Map",
            TargetType::List => "List",
            TargetType::Set => "Set",
            TargetType::BigInt => "BigInt",
            TargetType::Blob => "Blob",
            TargetType::Decimal => "Decimal",
            TargetType::Inet => "Inet",
            TargetType::Uuid => "Uuid",
            TargetType::TimeUuid => "TimeUuid",
            TargetType::Tuple => "Tuple",
        }
    }

    /// "String, Integer, ... and Tuple", used in validation messages.
    pub fn allowed_list() -> String {
        let names = Self::ALL.iter().map(TargetType::as_str).collect::<Vec<_>>();
        match names.split_last() {
            Some((last, rest)) if !rest.is_empty() => format!("{} and {}", rest.join(", "), last),
            Some((last, _)) => (*last).to_string(),
            None => String::new(),
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetType {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let parsed = match raw.trim() {
            "String" | "Text" | "Varchar" | "Ascii" => TargetType::String,
            "Integer" | "Int" | "SmallInt" | "TinyInt" => TargetType::Integer,
            "Float" | "Double" => TargetType::Float,
            "Boolean" => TargetType::Boolean,
            "Timestamp" | "DateTime" => TargetType::Timestamp,
            "Date" => TargetType::Date,
            "Time" => TargetType::Time,
            "Map" | "JSON" | "Object" => TargetType::Map,
            "List" => TargetType::List,
            "Set" => TargetType::Set,
            "BigInt" | "Varint" | "Counter" => TargetType::BigInt,
            "Blob" => TargetType::Blob,
            "Decimal" => TargetType::Decimal,
            "Inet" => TargetType::Inet,
            "Uuid" => TargetType::Uuid,
            "TimeUuid" => TargetType::TimeUuid,
            "Tuple" => TargetType::Tuple,
            other => return Err(format!("Unknown data type '{}'", other)),
        };
        Ok(parsed)
    }
}

/// One output column bound to a source field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMapping {
    pub column: String,
    pub source_field: String,
    pub target_type: Option<TargetType>,
    pub format: Option<String>,
    pub output_format: Option<String>,
}

/// Validated, ordered column schema. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMappings {
    fields: Vec<FieldMapping>,
}

impl FieldMappings {
    pub fn new(fields: Vec<FieldMapping>) -> Self {
        Self { fields }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldMapping> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FieldMapping> {
        self.fields.get(index)
    }
}

impl<'a> IntoIterator for &'a FieldMappings {
    type Item = &'a FieldMapping;
    type IntoIter = std::slice::Iter<'a, FieldMapping>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// Parse and validate the serialized field mapping. Any invalid entry fails the
/// whole configuration.
pub fn parse_field_mapping(raw: Option<&str>) -> Result<FieldMappings, AdapterError> {
    let raw = raw.map(str::trim).filter(|value| !value.is_empty()).unwrap_or("{}");

    let document = serde_json::from_str::<Value>(raw).map_err(|_| invalid_mapping_json())?;
    let Value::Object(entries) = document else {
        return Err(invalid_mapping_json());
    };

    validate_field_mapping(&entries)
}

pub fn validate_field_mapping(entries: &Map<String, Value>) -> Result<FieldMappings, AdapterError> {
    let mut fields = Vec::with_capacity(entries.len());

    for (key, entry) in entries {
        let column = key.trim();
        if column.is_empty() {
            return Err(AdapterError::Configuration(
                "Field mapping contains an empty column name.".to_string(),
            ));
        }

        let Value::Object(entry) = entry else {
            return Err(AdapterError::Configuration(format!(
                "Field mapping for {} must be an object.",
                key
            )));
        };

        let source_field = entry
            .get("source_field")
            .and_then(Value::as_str)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| {
                AdapterError::Configuration(format!(
                    "Source field is missing for {} in field mapping.",
                    key
                ))
            })?;

        let target_type = match entry.get("data_type").or_else(|| entry.get("target_type")) {
            None | Some(Value::Null) => None,
            Some(Value::String(name)) if name.trim().is_empty() => None,
            Some(Value::String(name)) => {
                Some(name.parse::<TargetType>().map_err(|_| invalid_data_type(key))?)
            }
            Some(_) => return Err(invalid_data_type(key)),
        };

        fields.push(FieldMapping {
            column: column.to_string(),
            source_field: source_field.to_string(),
            target_type,
            format: optional_text(entry, "format"),
            output_format: optional_text(entry, "output_format"),
        });
    }

    Ok(FieldMappings::new(fields))
}

fn optional_text(entry: &Map<String, Value>, key: &str) -> Option<String> {
    entry
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn invalid_mapping_json() -> AdapterError {
    AdapterError::Configuration("Invalid field mapping. Must be a valid JSON String.".to_string())
}

fn invalid_data_type(key: &str) -> AdapterError {
    AdapterError::Configuration(format!(
        "Invalid Data Type for {}. Allowed data types are {}.",
        key,
        TargetType::allowed_list()
    ))
}
