// src/core/protocol/envelope.rs

//! Decoding of a single framed message into an `Envelope`.

use crate::core::RelayError;
use serde_json::{Map, Value};

/// The decoded unit received from the socket.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Envelope {
    /// The protocol number, if the message carried one.
    pub command: Option<i64>,
    /// The payload. Defaults to an empty object when absent or `null`.
    pub data: Map<String, Value>,
}

impl Envelope {
    /// Parses one frame. The frame must be a JSON object; `command`, when present,
    /// must be an integer and `data`, when present, must be an object.
    pub fn decode(bytes: &[u8]) -> Result<Self, RelayError> {
        let value: Value = serde_json::from_slice(bytes)?;
        let Value::Object(mut object) = value else {
            return Err(RelayError::MalformedPayload(
                "envelope is not a JSON object".into(),
            ));
        };

        let command = match object.remove("command") {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => Some(n.as_i64().ok_or_else(|| {
                RelayError::MalformedPayload(format!("command '{n}' is not an integer"))
            })?),
            Some(other) => {
                return Err(RelayError::MalformedPayload(format!(
                    "command must be an integer, got {other}"
                )));
            }
        };

        let data = match object.remove("data") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(RelayError::MalformedPayload(format!(
                    "data must be an object, got {other}"
                )));
            }
        };

        Ok(Self { command, data })
    }
}
