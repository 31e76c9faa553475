use super::{stringify, CoercionFault};
use crate::coercion::temporal::parse_default;
use crate::coercion::value::{CoercedValue, Coercion};
use crate::mapping::TargetType;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use serde_json::Value;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use uuid::{NoContext, Timestamp, Uuid};

/// Recognise the serialized buffer shape `{"type":"Buffer","data":[..]}`.
/// Returns `None` for anything else and a fault when the shape matches but the
/// payload is not a byte array.
pub fn as_buffer(raw: &Value) -> Option<Result<Vec<u8>, CoercionFault>> {
    let Value::Object(object) = raw else {
        return None;
    };
    if object.get("type").and_then(Value::as_str) != Some("Buffer") {
        return None;
    }
    let Some(Value::Array(items)) = object.get("data") else {
        return Some(Err(CoercionFault::MalformedBuffer(
            "missing data array".to_string(),
        )));
    };

    let mut bytes = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let Some(byte) = item.as_u64().and_then(|v| u8::try_from(v).ok()) else {
            return Some(Err(CoercionFault::MalformedBuffer(format!(
                "element {} is not a byte",
                index
            ))));
        };
        bytes.push(byte);
    }
    Some(Ok(bytes))
}

pub(super) fn coerce_blob(raw: &Value) -> Result<Coercion, CoercionFault> {
    if let Some(bytes) = as_buffer(raw) {
        return Ok(Coercion::Coerced(CoercedValue::Blob(bytes?)));
    }

    match BASE64_STANDARD.decode(stringify(raw).trim()) {
        Ok(bytes) => Ok(Coercion::Coerced(CoercedValue::Blob(bytes))),
        Err(_) => Ok(Coercion::Unchanged(raw.clone())),
    }
}

pub(super) fn coerce_inet(raw: &Value) -> Result<Coercion, CoercionFault> {
    if let Some(bytes) = as_buffer(raw) {
        let bytes = bytes?;
        let address = if let Ok(octets) = <[u8; 4]>::try_from(bytes.as_slice()) {
            IpAddr::V4(Ipv4Addr::from(octets))
        } else if let Ok(octets) = <[u8; 16]>::try_from(bytes.as_slice()) {
            IpAddr::V6(Ipv6Addr::from(octets))
        } else {
            return Err(CoercionFault::MalformedBuffer(format!(
                "{} bytes is not an address",
                bytes.len()
            )));
        };
        return Ok(Coercion::Coerced(CoercedValue::Inet(address)));
    }

    match stringify(raw).trim().parse::<IpAddr>() {
        Ok(address) => Ok(Coercion::Coerced(CoercedValue::Inet(address))),
        Err(_) => Ok(Coercion::Unchanged(raw.clone())),
    }
}

/// Identifier coercion shared by `Uuid` and `TimeUuid`: raw bytes, then a
/// time-ordered identifier for anything that reads as a date, then a literal.
pub(super) fn coerce_uuid(raw: &Value, target: TargetType) -> Result<Coercion, CoercionFault> {
    if let Some(bytes) = as_buffer(raw) {
        let bytes = bytes?;
        let octets = <[u8; 16]>::try_from(bytes.as_slice()).map_err(|_| {
            CoercionFault::MalformedBuffer(format!("{} bytes is not an identifier", bytes.len()))
        })?;
        return Ok(Coercion::Coerced(CoercedValue::Uuid(Uuid::from_bytes(octets))));
    }

    if let Some(moment) = parse_default(raw) {
        let seconds = u64::try_from(moment.timestamp())
            .map_err(|_| CoercionFault::OutOfRange(target, moment.to_rfc3339()))?;
        let timestamp = Timestamp::from_unix(NoContext, seconds, moment.timestamp_subsec_nanos());
        return Ok(Coercion::Coerced(CoercedValue::Uuid(Uuid::new_v7(timestamp))));
    }

    match Uuid::parse_str(stringify(raw).trim()) {
        Ok(id) => Ok(Coercion::Coerced(CoercedValue::Uuid(id))),
        Err(_) => Ok(Coercion::Unchanged(raw.clone())),
    }
}
