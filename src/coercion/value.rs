use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use num_bigint::BigInt;
use rust_decimal::Decimal;
use serde_json::{Number, Value};
use std::net::IpAddr;
use uuid::Uuid;

/// A field value after coercion, typed per its target column.
#[derive(Debug, Clone, PartialEq)]
pub enum CoercedValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
    /// Structured map/list/set content.
    Json(Value),
    BigInt(BigInt),
    Blob(Vec<u8>),
    Decimal(Decimal),
    Inet(IpAddr),
    Uuid(Uuid),
    Tuple(Vec<Value>),
    /// The original input, kept because coercion was not possible.
    Raw(Value),
}

impl CoercedValue {
    pub fn from_number(number: &Number) -> Self {
        if let Some(v) = number.as_i64() {
            CoercedValue::Integer(v)
        } else {
            CoercedValue::Float(number.as_f64().unwrap_or(f64::NAN))
        }
    }

    /// JSON rendering used when echoing coerced rows back to the host. Feeding
    /// it through the same target type yields this value again.
    pub fn to_json(&self) -> Value {
        match self {
            CoercedValue::Null => Value::Null,
            CoercedValue::Text(text) => Value::String(text.clone()),
            CoercedValue::Integer(v) => Value::Number(Number::from(*v)),
            CoercedValue::Float(v) => match Number::from_f64(*v) {
                Some(number) => Value::Number(number),
                None if v.is_nan() => Value::String("NaN".to_string()),
                None if *v > 0.0 => Value::String("Infinity".to_string()),
                None => Value::String("-Infinity".to_string()),
            },
            CoercedValue::Boolean(v) => Value::Bool(*v),
            CoercedValue::Timestamp(v) => {
                Value::String(v.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            CoercedValue::Date(v) => Value::String(v.format("%Y-%m-%d").to_string()),
            CoercedValue::Time(v) => Value::String(v.format("%H:%M:%S%.f").to_string()),
            CoercedValue::Json(v) | CoercedValue::Raw(v) => v.clone(),
            CoercedValue::BigInt(v) => Value::String(v.to_string()),
            CoercedValue::Blob(bytes) => Value::String(BASE64_STANDARD.encode(bytes)),
            CoercedValue::Decimal(v) => Value::String(v.to_string()),
            CoercedValue::Inet(v) => Value::String(v.to_string()),
            CoercedValue::Uuid(v) => Value::String(v.hyphenated().to_string()),
            CoercedValue::Tuple(items) => Value::Array(items.clone()),
        }
    }
}

/// Outcome of coercing one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Coercion {
    Coerced(CoercedValue),
    /// Coercion was not possible; the raw input is retained as-is.
    Unchanged(Value),
}

impl Coercion {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Coercion::Unchanged(_))
    }

    pub fn into_value(self) -> CoercedValue {
        match self {
            Coercion::Coerced(value) => value,
            Coercion::Unchanged(raw) => CoercedValue::Raw(raw),
        }
    }
}
