/// Sensor payload decoding and topic matching
use serde::Deserialize;
use serde_json::{json, Value};
use time::OffsetDateTime;

use crate::error::DecodeError;
use crate::models::SensorReading;

/// A numeric field as sent by the sensor firmware
///
/// Some firmware builds quote their numbers, so a string holding a number
/// is accepted as well.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireNumber {
    Number(f64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct WirePayload {
    temp: Option<WireNumber>,
    hum: Option<WireNumber>,
}

/// Decode a sensor payload received at `timestamp`
///
/// The payload is a UTF-8 JSON object:
/// - `temp`: temperature in °C (number, required)
/// - `hum`: relative humidity in % (number, required)
///
/// Additional fields are ignored. Both values must be finite.
///
/// # Arguments
/// * `payload` - Raw message bytes from the broker
/// * `timestamp` - Instant the message was received
///
/// # Returns
/// The reading, or `DecodeError::Malformed` describing the first problem found
pub fn decode_at(payload: &[u8], timestamp: OffsetDateTime) -> Result<SensorReading, DecodeError> {
    let text = std::str::from_utf8(payload)
        .map_err(|e| DecodeError::Malformed(format!("not UTF-8: {}", e)))?;

    let value: Value = serde_json::from_str(text)
        .map_err(|e| DecodeError::Malformed(format!("not JSON: {}", e)))?;

    // A derived struct would also accept a positional array
    if !value.is_object() {
        return Err(DecodeError::Malformed("not a JSON object".into()));
    }

    let wire: WirePayload = serde_json::from_value(value)
        .map_err(|e| DecodeError::Malformed(format!("not a sensor object: {}", e)))?;

    let temperature = field_value("temp", wire.temp)?;
    let humidity = field_value("hum", wire.hum)?;

    Ok(SensorReading {
        timestamp,
        temperature,
        humidity,
    })
}

/// Decode a payload stamped with the current time
pub fn decode(payload: &[u8]) -> Result<SensorReading, DecodeError> {
    decode_at(payload, OffsetDateTime::now_utc())
}

/// Wire encoding of a reading, the inverse of [`decode_at`]
///
/// The timestamp is not part of the wire format.
pub fn encode(reading: &SensorReading) -> Vec<u8> {
    json!({
        "temp": reading.temperature,
        "hum": reading.humidity,
    })
    .to_string()
    .into_bytes()
}

fn field_value(name: &str, field: Option<WireNumber>) -> Result<f64, DecodeError> {
    let value = match field {
        Some(WireNumber::Number(v)) => v,
        Some(WireNumber::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| DecodeError::Malformed(format!("field '{}' is not numeric: '{}'", name, s)))?,
        None => return Err(DecodeError::Malformed(format!("missing field '{}'", name))),
    };

    if !value.is_finite() {
        return Err(DecodeError::Malformed(format!(
            "field '{}' is not finite",
            name
        )));
    }

    Ok(value)
}

/// Check a topic name against an MQTT subscription filter
///
/// `+` matches exactly one level, `#` matches any remaining levels
/// (including none). Topics starting with `$` are not matched by a
/// leading wildcard.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    if topic.starts_with('$') && (filter.starts_with('+') || filter.starts_with('#')) {
        return false;
    }

    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => continue,
            (Some(f), Some(t)) if f == t => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}
