// src/server/domain.rs

//! Builds the application context: domain services first, then the protocol
//! registry that exposes them, then the shared socket slot.

use super::context::AppContext;
use crate::config::Config;
use crate::core::RelayError;
use crate::core::dice::DiceService;
use crate::core::protocol::{CustomProtocolNumber, ProtocolRegistry};
use crate::core::socket::SharedSocketRegistry;
use serde_json::{Map, Value};
use std::sync::Arc;
use strum::IntoEnumIterator;
use tracing::{info, warn};

pub fn init_app_context(config: Config) -> Result<AppContext, RelayError> {
    let dice = Arc::new(DiceService::new());
    let protocols = init_protocols(&dice)?;
    info!(
        "Protocol registry initialized with {} handler(s): {:?}",
        protocols.len(),
        protocols.protocols()
    );
    for protocol in CustomProtocolNumber::iter().filter(|p| !protocols.contains(*p)) {
        warn!("Protocol {} has no handler; its requests will be dropped.", protocol);
    }

    Ok(AppContext {
        config: Arc::new(config),
        sockets: Arc::new(SharedSocketRegistry::new()),
        protocols: Arc::new(protocols),
    })
}

/// Registers the default protocols backed by the dice service.
pub fn init_protocols(dice: &Arc<DiceService>) -> Result<ProtocolRegistry, RelayError> {
    let mut registry = ProtocolRegistry::new();

    let roll = Arc::clone(dice);
    registry.register(
        CustomProtocolNumber::DiceRollJustForTest,
        Arc::new(move |data: &Map<String, Value>| roll.roll_dice(data)),
    )?;

    let list = Arc::clone(dice);
    registry.register(
        CustomProtocolNumber::DiceListJustForTest,
        Arc::new(move |data: &Map<String, Value>| list.dice_list(data)),
    )?;

    Ok(registry)
}
