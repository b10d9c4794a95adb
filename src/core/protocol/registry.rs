// src/core/protocol/registry.rs

//! The `ProtocolRegistry` maps protocol numbers to the handlers that implement them.
//!
//! Registration happens once while the application context is being built. The
//! registry is then frozen behind an `Arc` and read without locking, so lookups
//! are plain hash-map reads with no side effects.

use super::number::CustomProtocolNumber;
use crate::core::RelayError;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// The single capability every protocol handler provides.
pub trait ProtocolHandler: Send + Sync {
    /// Executes the handler against a request payload and returns the result body.
    fn handle(&self, data: &Map<String, Value>) -> Result<Value, RelayError>;
}

impl<F> ProtocolHandler for F
where
    F: Fn(&Map<String, Value>) -> Result<Value, RelayError> + Send + Sync,
{
    fn handle(&self, data: &Map<String, Value>) -> Result<Value, RelayError> {
        self(data)
    }
}

#[derive(Default)]
pub struct ProtocolRegistry {
    handlers: HashMap<CustomProtocolNumber, Arc<dyn ProtocolHandler>>,
}

impl ProtocolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates `handler` with `protocol`.
    ///
    /// A protocol number can be registered only once; a second registration is
    /// rejected with `DuplicateProtocol` and the original handler stays in place.
    pub fn register(
        &mut self,
        protocol: CustomProtocolNumber,
        handler: Arc<dyn ProtocolHandler>,
    ) -> Result<(), RelayError> {
        if self.handlers.contains_key(&protocol) {
            return Err(RelayError::DuplicateProtocol(protocol));
        }
        debug!("Registered handler for protocol {} ({})", protocol, protocol.value());
        self.handlers.insert(protocol, handler);
        Ok(())
    }

    /// Looks up the handler for a known protocol number.
    pub fn resolve(
        &self,
        protocol: CustomProtocolNumber,
    ) -> Result<Arc<dyn ProtocolHandler>, RelayError> {
        self.handlers
            .get(&protocol)
            .cloned()
            .ok_or(RelayError::ProtocolNotFound(protocol))
    }

    /// Looks up the handler for a raw wire value, rejecting numbers outside the
    /// known protocol domain before the map is consulted.
    pub fn resolve_raw(&self, raw: i64) -> Result<Arc<dyn ProtocolHandler>, RelayError> {
        self.resolve(CustomProtocolNumber::try_from(raw)?)
    }

    pub fn contains(&self, protocol: CustomProtocolNumber) -> bool {
        self.handlers.contains_key(&protocol)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// The registered protocol numbers in ascending order.
    pub fn protocols(&self) -> Vec<CustomProtocolNumber> {
        let mut protocols: Vec<_> = self.handlers.keys().copied().collect();
        protocols.sort();
        protocols
    }
}

impl fmt::Debug for ProtocolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolRegistry")
            .field("protocols", &self.protocols())
            .finish()
    }
}
