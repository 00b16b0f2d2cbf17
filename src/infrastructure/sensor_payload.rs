// Decoding of inbound sensor messages
use crate::domain::telemetry::Channel;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("payload must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// Decodes a message such as `{"tds": 120.4, "turbidity": -13.2}` into
/// channel values. Unknown keys and non-numeric values
/// are skipped without failing the rest of the message.
pub fn parse_sensor_payload(payload: &[u8]) -> Result<Vec<(Channel, f64)>, PayloadError> {
    let value: Value = serde_json::from_slice(payload)?;
    let object = match value {
        Value::Object(object) => object,
        other => return Err(PayloadError::NotAnObject(json_kind(&other))),
    };
    Ok(channel_values(object))
}

fn channel_values(object: Map<String, Value>) -> Vec<(Channel, f64)> {
    let mut values = Vec::with_capacity(object.len());
    for (key, value) in object {
        let Some(channel) = Channel::from_wire_name(&key) else {
            tracing::debug!(key = %key, "Skipping unknown sensor key");
            continue;
        };
        match value.as_f64() {
            Some(number) if number.is_finite() => values.push((channel, number)),
            _ => {
                tracing::debug!(%channel, value = %value, "Skipping non-numeric sensor value");
            }
        }
    }
    values
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
