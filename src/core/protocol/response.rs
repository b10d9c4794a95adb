// src/core/protocol/response.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The reply written back to the peer after a handler runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub protocol: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok(protocol: i64, data: Value) -> Self {
        Self {
            protocol,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(protocol: i64, message: impl Into<String>) -> Self {
        Self {
            protocol,
            data: None,
            error: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
