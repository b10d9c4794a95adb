// src/core/protocol/request.rs

use super::number::CustomProtocolNumber;
use crate::core::RelayError;
use serde_json::{Map, Value};

/// A normalized, handler-agnostic request ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    protocol: CustomProtocolNumber,
    data: Map<String, Value>,
}

impl Request {
    pub fn protocol(&self) -> CustomProtocolNumber {
        self.protocol
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn into_parts(self) -> (CustomProtocolNumber, Map<String, Value>) {
        (self.protocol, self.data)
    }
}

/// Builds `Request` values from decoded envelopes.
pub struct RequestGenerator;

impl RequestGenerator {
    /// Turns a raw protocol number and its payload into a `Request`.
    ///
    /// Fails with `UnknownProtocol` if `raw_protocol` is not a member of
    /// `CustomProtocolNumber`. Whether a handler is registered for it is not
    /// checked here.
    pub fn generate(raw_protocol: i64, data: Map<String, Value>) -> Result<Request, RelayError> {
        let protocol = CustomProtocolNumber::try_from(raw_protocol)?;
        Ok(Request { protocol, data })
    }
}
