// =====================================================
// TYPE COERCION ENGINE
// Maps weakly-typed JSON input onto the closed target type set
// =====================================================

mod binary;
mod numeric;
mod temporal;
mod value;

pub use binary::as_buffer;
pub use numeric::{parse_float_prefix, parse_integer_prefix};
pub use temporal::{parse_default, parse_with_format, to_chrono_pattern};
pub use value::{CoercedValue, Coercion};

use crate::mapping::{FieldMapping, TargetType};
use serde_json::{Map, Value};
use thiserror::Error;

/// Internal failure inside a type handler. Never escapes `coerce`; it is
/// absorbed into the field-level fallback.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CoercionFault {
    #[error("malformed buffer: {0}")]
    MalformedBuffer(String),
    #[error("{1} is out of range for {0}")]
    OutOfRange(TargetType, String),
    #[error("invalid output pattern '{0}'")]
    InvalidPattern(String),
}

/// Coerce one raw value. Total: every input yields a value.
pub fn coerce(raw: &Value, target: Option<TargetType>, format: Option<&str>) -> Coercion {
    coerce_with(raw, target, format, None)
}

/// Coerce the source value a mapping points at. A missing key reads as null.
pub fn coerce_field(mapping: &FieldMapping, record: &Map<String, Value>) -> Coercion {
    let raw = record.get(&mapping.source_field).unwrap_or(&Value::Null);
    let coercion = coerce_with(
        raw,
        mapping.target_type,
        mapping.format.as_deref(),
        mapping.output_format.as_deref(),
    );

    if coercion.is_unchanged() && mapping.target_type.is_some() {
        log::debug!(
            "Field '{}' kept its original value; it does not coerce to {}",
            mapping.column,
            mapping
                .target_type
                .map(|t| t.as_str())
                .unwrap_or_default()
        );
    }

    coercion
}

fn coerce_with(
    raw: &Value,
    target: Option<TargetType>,
    format: Option<&str>,
    output_format: Option<&str>,
) -> Coercion {
    if raw.is_null() {
        return Coercion::Coerced(CoercedValue::Null);
    }

    let Some(target) = target else {
        return Coercion::Coerced(passthrough(raw));
    };

    match try_coerce(raw, target, format, output_format) {
        Ok(coercion) => coercion,
        Err(fault) => {
            log::warn!("Coercion to {} failed ({}); using fallback value", target, fault);
            fault_fallback(raw)
        }
    }
}

fn try_coerce(
    raw: &Value,
    target: TargetType,
    format: Option<&str>,
    output_format: Option<&str>,
) -> Result<Coercion, CoercionFault> {
    match target {
        TargetType::String => Ok(Coercion::Coerced(CoercedValue::Text(stringify(raw)))),
        TargetType::Integer => numeric::coerce_integer(raw),
        TargetType::Float => numeric::coerce_float(raw),
        TargetType::Boolean => numeric::coerce_boolean(raw),
        TargetType::Timestamp => temporal::coerce_timestamp(raw, format, output_format),
        TargetType::Date => temporal::coerce_date(raw),
        TargetType::Time => temporal::coerce_time(raw),
        TargetType::Map => Ok(coerce_structured(raw, Value::is_object)),
        TargetType::List | TargetType::Set => Ok(coerce_structured(raw, Value::is_array)),
        TargetType::BigInt => numeric::coerce_bigint(raw),
        TargetType::Blob => binary::coerce_blob(raw),
        TargetType::Decimal => numeric::coerce_decimal(raw),
        TargetType::Inet => binary::coerce_inet(raw),
        TargetType::Uuid | TargetType::TimeUuid => binary::coerce_uuid(raw, target),
        TargetType::Tuple => Ok(Coercion::Coerced(match raw {
            Value::Array(items) => CoercedValue::Tuple(items.clone()),
            _ => CoercedValue::Null,
        })),
    }
}

/// No configured type: numbers stay numeric, everything else becomes text.
fn passthrough(raw: &Value) -> CoercedValue {
    match raw {
        Value::Number(number) => CoercedValue::from_number(number),
        other => CoercedValue::Text(stringify(other)),
    }
}

fn coerce_structured(raw: &Value, already: fn(&Value) -> bool) -> Coercion {
    if already(raw) {
        return Coercion::Coerced(CoercedValue::Json(raw.clone()));
    }

    match serde_json::from_str::<Value>(&stringify(raw)) {
        Ok(parsed) => Coercion::Coerced(CoercedValue::Json(parsed)),
        Err(_) => Coercion::Unchanged(raw.clone()),
    }
}

fn fault_fallback(raw: &Value) -> Coercion {
    match raw {
        Value::Object(_) => Coercion::Coerced(CoercedValue::Text(raw.to_string())),
        other => Coercion::Unchanged(other.clone()),
    }
}

/// String representation of a raw value: strings as-is, structured values as
/// JSON text.
pub(crate) fn stringify(raw: &Value) -> String {
    match raw {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(v) => v.to_string(),
        Value::Number(number) => number.to_string(),
        other => other.to_string(),
    }
}
