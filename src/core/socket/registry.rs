// src/core/socket/registry.rs

//! Defines `SharedSocketRegistry`, the one slot through which every component
//! reaches the active client socket.
//!
//! All transitions go through a single `RwLock`. Once `clear` returns, no later
//! `get` on any thread can observe the removed handle, and the slot only becomes
//! occupied again through a fresh `inject`.

use super::handle::SocketHandle;
use crate::core::RelayError;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Default)]
pub struct SharedSocketRegistry {
    slot: RwLock<Option<Arc<SocketHandle>>>,
}

impl SharedSocketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a freshly accepted handle. Fails with `AlreadyPresent` if another
    /// handle occupies the slot; the existing handle is never replaced.
    pub fn inject(&self, handle: Arc<SocketHandle>) -> Result<(), RelayError> {
        let mut slot = self.slot.write();
        if slot.is_some() {
            return Err(RelayError::AlreadyPresent);
        }
        info!(
            "Client socket {} from {} registered (tls: {}).",
            handle.id(),
            handle.peer(),
            handle.is_tls()
        );
        *slot = Some(handle);
        Ok(())
    }

    /// Non-blocking read of the current handle.
    pub fn get(&self) -> Option<Arc<SocketHandle>> {
        self.slot.read().clone()
    }

    pub fn is_present(&self) -> bool {
        self.slot.read().is_some()
    }

    /// True if the slot still holds exactly `handle`.
    pub fn is_current(&self, handle: &Arc<SocketHandle>) -> bool {
        matches!(&*self.slot.read(), Some(current) if Arc::ptr_eq(current, handle))
    }

    /// Empties the slot and returns what it held. Clearing an empty slot is a no-op.
    pub fn clear(&self) -> Option<Arc<SocketHandle>> {
        let removed = self.slot.write().take();
        if let Some(handle) = &removed {
            info!("Client socket {} from {} cleared.", handle.id(), handle.peer());
        }
        removed
    }

    /// Empties the slot only if it still holds `handle`, so a component working
    /// with a stale handle cannot evict a newer connection.
    pub fn clear_if_current(&self, handle: &Arc<SocketHandle>) -> bool {
        let mut slot = self.slot.write();
        match &*slot {
            Some(current) if Arc::ptr_eq(current, handle) => {
                *slot = None;
                info!("Client socket {} from {} cleared.", handle.id(), handle.peer());
                true
            }
            _ => {
                debug!(
                    "Client socket {} was already cleared or replaced; leaving the slot untouched.",
                    handle.id()
                );
                false
            }
        }
    }

    /// Tears a connection down: clears it from the slot (if still current) and
    /// shuts down its write side.
    pub async fn close(&self, handle: &Arc<SocketHandle>) {
        self.clear_if_current(handle);
        handle.shutdown().await;
    }
}
