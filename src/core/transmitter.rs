// src/core/transmitter.rs

//! Writes handler results back over whichever client socket is currently registered.

use crate::core::errors::FaultClass;
use crate::core::protocol::Response;
use crate::core::socket::SharedSocketRegistry;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

pub struct Transmitter {
    sockets: Arc<SharedSocketRegistry>,
    response_rx: mpsc::Receiver<Response>,
}

impl Transmitter {
    pub fn new(sockets: Arc<SharedSocketRegistry>, response_rx: mpsc::Receiver<Response>) -> Self {
        Self {
            sockets,
            response_rx,
        }
    }

    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("Transmitter task started.");
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("Transmitter task shutting down.");
                    return;
                }
                maybe_response = self.response_rx.recv() => {
                    let Some(response) = maybe_response else {
                        info!("Response channel closed; transmitter exiting.");
                        return;
                    };
                    self.transmit(response).await;
                }
            }
        }
    }

    async fn transmit(&self, response: Response) {
        let Some(handle) = self.sockets.get() else {
            warn!(
                "No client socket registered; dropping response for protocol {}.",
                response.protocol
            );
            return;
        };

        let protocol = response.protocol;
        match handle.send(response).await {
            Ok(()) => debug!("Sent response for protocol {} to {}.", protocol, handle.peer()),
            Err(e) if e.fault_class() == FaultClass::TransportFatal => {
                warn!(
                    "Send to client socket {} from {} failed: {}. Closing connection.",
                    handle.id(),
                    handle.peer(),
                    e
                );
                self.sockets.close(&handle).await;
            }
            Err(e) => warn!("Send to client socket {} failed: {}", handle.id(), e),
        }
    }
}
