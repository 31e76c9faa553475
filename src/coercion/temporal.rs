use super::{stringify, CoercionFault};
use crate::coercion::binary::as_buffer;
use crate::coercion::value::{CoercedValue, Coercion};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde_json::Value;
use std::fmt::Write;

const DATE_EPOCH_CENTER: i64 = 1 << 31;
const NANOS_PER_DAY: i64 = 86_400_000_000_000;

pub(super) fn coerce_timestamp(
    raw: &Value,
    format: Option<&str>,
    output_format: Option<&str>,
) -> Result<Coercion, CoercionFault> {
    let parsed = format
        .and_then(|pattern| match raw {
            Value::String(_) | Value::Number(_) => parse_with_format(&stringify(raw), pattern),
            _ => None,
        })
        .or_else(|| parse_default(raw));

    let Some(moment) = parsed else {
        return Ok(Coercion::Unchanged(raw.clone()));
    };

    match output_format {
        Some(pattern) => Ok(Coercion::Coerced(CoercedValue::Text(format_with_pattern(
            &moment, pattern,
        )?))),
        None => Ok(Coercion::Coerced(CoercedValue::Timestamp(moment))),
    }
}

pub(super) fn coerce_date(raw: &Value) -> Result<Coercion, CoercionFault> {
    if let Some(bytes) = as_buffer(raw).transpose()? {
        if let Some(date) = date_from_bytes(&bytes) {
            return Ok(Coercion::Coerced(CoercedValue::Date(date)));
        }
    }

    if let Value::Number(number) = raw {
        if let Some(date) = number.as_i64().and_then(date_from_epoch_days) {
            return Ok(Coercion::Coerced(CoercedValue::Date(date)));
        }
    }

    if let Some(moment) = parsed_date_string(raw) {
        return Ok(Coercion::Coerced(CoercedValue::Date(moment.date_naive())));
    }

    if let Value::String(text) = raw {
        if let Some(date) = parse_date_literal(text) {
            return Ok(Coercion::Coerced(CoercedValue::Date(date)));
        }
    }

    Ok(Coercion::Unchanged(raw.clone()))
}

pub(super) fn coerce_time(raw: &Value) -> Result<Coercion, CoercionFault> {
    if let Some(bytes) = as_buffer(raw).transpose()? {
        if let Ok(nanos) = <[u8; 8]>::try_from(bytes.as_slice()) {
            if let Some(time) = time_from_nanos(i64::from_be_bytes(nanos)) {
                return Ok(Coercion::Coerced(CoercedValue::Time(time)));
            }
        }
    }

    if let Value::Number(number) = raw {
        if let Some(time) = number.as_i64().and_then(time_from_nanos) {
            return Ok(Coercion::Coerced(CoercedValue::Time(time)));
        }
    }

    if let Some(moment) = parsed_date_string(raw) {
        return Ok(Coercion::Coerced(CoercedValue::Time(moment.time())));
    }

    if let Value::String(text) = raw {
        if let Some(time) = parse_time_literal(text) {
            return Ok(Coercion::Coerced(CoercedValue::Time(time)));
        }
    }

    Ok(Coercion::Unchanged(raw.clone()))
}

/// Date parsing without an explicit pattern. Numbers are epoch milliseconds;
/// strings must be ISO 8601 / RFC 3339 / RFC 2822 shaped.
pub fn parse_default(raw: &Value) -> Option<DateTime<Utc>> {
    match raw {
        Value::Number(number) => {
            let millis = number.as_f64()?;
            if !millis.is_finite() {
                return None;
            }
            Utc.timestamp_millis_opt(millis.trunc() as i64).single()
        }
        Value::String(text) => parse_date_text(text),
        _ => None,
    }
}

fn parsed_date_string(raw: &Value) -> Option<DateTime<Utc>> {
    match raw {
        Value::String(text) => parse_date_text(text),
        _ => None,
    }
}

fn parse_date_text(text: &str) -> Option<DateTime<Utc>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(zoned) = parse_zoned_datetime(trimmed) {
        return Some(zoned.with_timezone(&Utc));
    }

    if let Some(naive) = parse_naive_datetime(trimmed) {
        return Some(naive.and_utc());
    }

    parse_naive_date(trimmed)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn parse_zoned_datetime(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .or_else(|| DateTime::parse_from_rfc2822(value).ok())
        .or_else(|| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%#z").ok())
        .or_else(|| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%#z").ok())
        .or_else(|| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M%#z").ok())
        .or_else(|| DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%#z").ok())
        .or_else(|| DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%#z").ok())
        .or_else(|| DateTime::parse_from_str(value, "%Y-%m-%d %H:%M%#z").ok())
}

fn parse_naive_datetime(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S").ok())
        .or_else(|| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M").ok())
        .or_else(|| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f").ok())
        .or_else(|| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").ok())
        .or_else(|| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M").ok())
}

fn parse_naive_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| NaiveDate::parse_from_str(value, "%Y%m%d").ok())
}

/// Parse with a user pattern, either moment-style tokens or strftime. The
/// pattern only has to match a prefix of the input; trailing text is ignored.
pub fn parse_with_format(text: &str, pattern: &str) -> Option<DateTime<Utc>> {
    let trimmed = text.trim();
    let chrono_pattern = to_chrono_pattern(pattern, false);

    if let Ok((zoned, _)) = DateTime::parse_and_remainder(trimmed, &chrono_pattern) {
        return Some(zoned.with_timezone(&Utc));
    }
    if let Ok((naive, _)) = NaiveDateTime::parse_and_remainder(trimmed, &chrono_pattern) {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_and_remainder(trimmed, &chrono_pattern)
        .ok()
        .and_then(|(date, _)| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn format_with_pattern(moment: &DateTime<Utc>, pattern: &str) -> Result<String, CoercionFault> {
    let chrono_pattern = to_chrono_pattern(pattern, true);
    let items = StrftimeItems::new(&chrono_pattern).collect::<Vec<Item<'_>>>();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(CoercionFault::InvalidPattern(pattern.to_string()));
    }

    // Parse-only specifiers such as `%#z` fail at render time.
    let mut rendered = String::new();
    write!(rendered, "{}", moment.format_with_items(items.into_iter()))
        .map_err(|_| CoercionFault::InvalidPattern(pattern.to_string()))?;
    Ok(rendered)
}

// moment token → chrono specifier, longest tokens first.
const TOKENS: &[(&str, &str)] = &[
    ("YYYY", "%Y"),
    ("YY", "%y"),
    ("MMMM", "%B"),
    ("MMM", "%b"),
    ("MM", "%m"),
    ("M", "%m"),
    ("DDDD", "%j"),
    ("DDD", "%j"),
    ("DD", "%d"),
    ("D", "%d"),
    ("dddd", "%A"),
    ("ddd", "%a"),
    ("HH", "%H"),
    ("H", "%H"),
    ("hh", "%I"),
    ("h", "%I"),
    ("mm", "%M"),
    ("m", "%M"),
    ("ss", "%S"),
    ("s", "%S"),
    ("ZZ", "%#z"),
    ("Z", "%#z"),
    ("A", "%p"),
    ("a", "%p"),
    ("X", "%s"),
];

/// Translate a moment-style pattern into chrono's strftime syntax. Patterns
/// that already contain `%` are treated as strftime and returned unchanged.
/// `%#z` only parses, so offsets render as `%:z` / `%z` when formatting.
pub fn to_chrono_pattern(pattern: &str, for_output: bool) -> String {
    if pattern.contains('%') {
        return pattern.to_string();
    }

    let chars = pattern.chars().collect::<Vec<char>>();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut index = 0usize;

    while index < chars.len() {
        let ch = chars[index];

        if ch == '[' {
            let mut end = index + 1;
            while end < chars.len() && chars[end] != ']' {
                end += 1;
            }
            out.extend(chars[index + 1..end.min(chars.len())].iter());
            index = end + 1;
            continue;
        }

        if ch == 'S' {
            let mut end = index;
            while end < chars.len() && chars[end] == 'S' {
                end += 1;
            }
            if out.ends_with('.') {
                out.pop();
                out.push_str("%.f");
            } else {
                let width = end - index;
                out.push_str(if width <= 3 {
                    "%3f"
                } else if width <= 6 {
                    "%6f"
                } else {
                    "%9f"
                });
            }
            index = end;
            continue;
        }

        let rest = chars[index..].iter().collect::<String>();
        if let Some((token, replacement)) =
            TOKENS.iter().find(|(token, _)| rest.starts_with(token))
        {
            let replacement = match (*token, for_output) {
                ("Z", true) => "%:z",
                ("ZZ", true) => "%z",
                _ => replacement,
            };
            out.push_str(replacement);
            index += token.chars().count();
            continue;
        }

        out.push(ch);
        index += 1;
    }

    out
}

fn date_from_bytes(bytes: &[u8]) -> Option<NaiveDate> {
    let raw = <[u8; 4]>::try_from(bytes).ok()?;
    let days = i64::from(u32::from_be_bytes(raw)) - DATE_EPOCH_CENTER;
    date_from_epoch_days(days)
}

fn date_from_epoch_days(days: i64) -> Option<NaiveDate> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    if days >= 0 {
        epoch.checked_add_days(Days::new(u64::try_from(days).ok()?))
    } else {
        epoch.checked_sub_days(Days::new(days.unsigned_abs()))
    }
}

fn time_from_nanos(nanos: i64) -> Option<NaiveTime> {
    if !(0..NANOS_PER_DAY).contains(&nanos) {
        return None;
    }
    let seconds = u32::try_from(nanos / 1_000_000_000).ok()?;
    let subsec = u32::try_from(nanos % 1_000_000_000).ok()?;
    NaiveTime::from_num_seconds_from_midnight_opt(seconds, subsec)
}

fn parse_date_literal(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    if let Ok(days) = trimmed.parse::<i64>() {
        return date_from_epoch_days(days);
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok()
}

fn parse_time_literal(text: &str) -> Option<NaiveTime> {
    let trimmed = text.trim();
    if let Ok(nanos) = trimmed.parse::<i64>() {
        return time_from_nanos(nanos);
    }
    NaiveTime::parse_from_str(trimmed, "%H:%M:%S%.f")
        .ok()
        .or_else(|| NaiveTime::parse_from_str(trimmed, "%H:%M").ok())
}
