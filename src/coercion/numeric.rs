use super::{stringify, CoercionFault};
use crate::coercion::value::{CoercedValue, Coercion};
use num_bigint::BigInt;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

pub(super) fn coerce_integer(raw: &Value) -> Result<Coercion, CoercionFault> {
    if let Value::Number(number) = raw {
        return Ok(Coercion::Coerced(CoercedValue::from_number(number)));
    }

    match parse_integer_prefix(&stringify(raw)) {
        Some(value) => Ok(Coercion::Coerced(value)),
        None => Ok(Coercion::Unchanged(raw.clone())),
    }
}

pub(super) fn coerce_float(raw: &Value) -> Result<Coercion, CoercionFault> {
    if let Value::Number(number) = raw {
        return Ok(Coercion::Coerced(CoercedValue::from_number(number)));
    }

    match parse_float_prefix(&stringify(raw)) {
        Some(value) => Ok(Coercion::Coerced(CoercedValue::Float(value))),
        None => Ok(Coercion::Unchanged(raw.clone())),
    }
}

pub(super) fn coerce_boolean(raw: &Value) -> Result<Coercion, CoercionFault> {
    let parsed = match raw {
        Value::Bool(v) => Some(*v),
        Value::String(text) if text.eq_ignore_ascii_case("true") => Some(true),
        Value::String(text) if text.eq_ignore_ascii_case("false") => Some(false),
        Value::Number(number) => match number.as_f64() {
            Some(v) if v == 1.0 => Some(true),
            Some(v) if v == 0.0 => Some(false),
            _ => None,
        },
        _ => None,
    };

    Ok(match parsed {
        Some(v) => Coercion::Coerced(CoercedValue::Boolean(v)),
        None => Coercion::Unchanged(raw.clone()),
    })
}

pub(super) fn coerce_bigint(raw: &Value) -> Result<Coercion, CoercionFault> {
    let text = stringify(raw);
    let trimmed = text.trim();
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);

    Ok(match BigInt::from_str(digits) {
        Ok(value) => Coercion::Coerced(CoercedValue::BigInt(value)),
        Err(_) => Coercion::Unchanged(raw.clone()),
    })
}

pub(super) fn coerce_decimal(raw: &Value) -> Result<Coercion, CoercionFault> {
    let text = stringify(raw);
    let trimmed = text.trim();

    let parsed = Decimal::from_str(trimmed)
        .ok()
        .or_else(|| Decimal::from_scientific(trimmed).ok());

    Ok(match parsed {
        Some(value) => Coercion::Coerced(CoercedValue::Decimal(value)),
        None => Coercion::Unchanged(raw.clone()),
    })
}

/// Leading base-10 integer of `raw`, ignoring anything after the digits
/// (`"42abc"` and `"12.7"` read as 42 and 12). Values that overflow `i64`
/// degrade to a float, as a double-precision parser would.
pub fn parse_integer_prefix(raw: &str) -> Option<CoercedValue> {
    let trimmed = raw.trim_start();
    let (negative, rest) = split_sign(trimmed);

    let digits = rest
        .bytes()
        .take_while(|byte| byte.is_ascii_digit())
        .count();
    if digits == 0 {
        return None;
    }

    let literal = &trimmed[..trimmed.len() - rest.len() + digits];
    match literal.parse::<i64>() {
        Ok(v) => Some(CoercedValue::Integer(v)),
        Err(_) => {
            let magnitude = rest[..digits].parse::<f64>().ok()?;
            Some(CoercedValue::Float(if negative { -magnitude } else { magnitude }))
        }
    }
}

/// Longest decimal prefix of `raw`: sign, digits, fraction, exponent, or
/// `Infinity`.
pub fn parse_float_prefix(raw: &str) -> Option<f64> {
    let trimmed = raw.trim_start();
    let (negative, rest) = split_sign(trimmed);

    if rest.starts_with("Infinity") {
        return Some(if negative {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        });
    }

    let bytes = rest.as_bytes();
    let mut index = 0usize;

    let mut whole_digits = 0usize;
    while index < bytes.len() && bytes[index].is_ascii_digit() {
        whole_digits += 1;
        index += 1;
    }

    let mut fractional_digits = 0usize;
    if index < bytes.len() && bytes[index] == b'.' {
        let mut cursor = index + 1;
        while cursor < bytes.len() && bytes[cursor].is_ascii_digit() {
            fractional_digits += 1;
            cursor += 1;
        }
        if whole_digits > 0 || fractional_digits > 0 {
            index = cursor;
        }
    }

    if whole_digits == 0 && fractional_digits == 0 {
        return None;
    }

    if index < bytes.len() && matches!(bytes[index], b'e' | b'E') {
        let mut cursor = index + 1;
        if cursor < bytes.len() && matches!(bytes[cursor], b'+' | b'-') {
            cursor += 1;
        }
        let exponent_start = cursor;
        while cursor < bytes.len() && bytes[cursor].is_ascii_digit() {
            cursor += 1;
        }
        if cursor > exponent_start {
            index = cursor;
        }
    }

    let magnitude = rest[..index].parse::<f64>().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

fn split_sign(value: &str) -> (bool, &str) {
    if let Some(rest) = value.strip_prefix('-') {
        (true, rest)
    } else if let Some(rest) = value.strip_prefix('+') {
        (false, rest)
    } else {
        (false, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_leading_integer_digits() {
        assert_eq!(parse_integer_prefix("42"), Some(CoercedValue::Integer(42)));
        assert_eq!(parse_integer_prefix("  -7 apples"), Some(CoercedValue::Integer(-7)));
        assert_eq!(parse_integer_prefix("12.7"), Some(CoercedValue::Integer(12)));
        assert_eq!(parse_integer_prefix("+3"), Some(CoercedValue::Integer(3)));
        assert_eq!(parse_integer_prefix("abc"), None);
        assert_eq!(parse_integer_prefix("-"), None);
        assert_eq!(parse_integer_prefix(""), None);
    }

    #[test]
    fn integer_overflow_degrades_to_float() {
        let parsed = parse_integer_prefix("99999999999999999999").unwrap();
        assert_eq!(parsed, CoercedValue::Float(1e20));
    }

    #[test]
    fn reads_longest_float_prefix() {
        assert_eq!(parse_float_prefix("11.25"), Some(11.25));
        assert_eq!(parse_float_prefix("11%"), Some(11.0));
        assert_eq!(parse_float_prefix(".5"), Some(0.5));
        assert_eq!(parse_float_prefix("6.02e23 mol"), Some(6.02e23));
        assert_eq!(parse_float_prefix("1e"), Some(1.0));
        assert_eq!(parse_float_prefix("-Infinity"), Some(f64::NEG_INFINITY));
        assert_eq!(parse_float_prefix("."), None);
        assert_eq!(parse_float_prefix("e5"), None);
    }
}
