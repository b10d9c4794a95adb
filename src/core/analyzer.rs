// src/core/analyzer.rs

//! The command analyzer consumes requests from the receiver, runs the handler
//! registered for each protocol and hands the result to the transmitter.
//!
//! Requests are processed one at a time in the order the receiver forwarded them.

use crate::core::RelayError;
use crate::core::protocol::{ProtocolRegistry, Request, Response};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, debug_span, info, warn};

pub struct CommandAnalyzer {
    protocols: Arc<ProtocolRegistry>,
    request_rx: mpsc::Receiver<Request>,
    response_tx: mpsc::Sender<Response>,
}

impl CommandAnalyzer {
    pub fn new(
        protocols: Arc<ProtocolRegistry>,
        request_rx: mpsc::Receiver<Request>,
        response_tx: mpsc::Sender<Response>,
    ) -> Self {
        Self {
            protocols,
            request_rx,
            response_tx,
        }
    }

    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("Command analyzer task started.");
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("Command analyzer task shutting down.");
                    return;
                }
                maybe_request = self.request_rx.recv() => {
                    let Some(request) = maybe_request else {
                        info!("Request channel closed; command analyzer exiting.");
                        return;
                    };
                    self.analyze(request).await;
                }
            }
        }
    }

    async fn analyze(&self, request: Request) {
        let response = match execute(&self.protocols, &request) {
            Ok(response) => response,
            Err(e) => {
                warn!("Dropping request: {}", e);
                return;
            }
        };
        if self.response_tx.send(response).await.is_err() {
            warn!("Transmitter channel is closed; response dropped.");
        }
    }
}

/// Resolves and runs the handler for `request`.
///
/// An unregistered protocol yields `ProtocolNotFound` and no handler runs. A
/// handler failure is not an error here: it becomes an error `Response` so the
/// peer learns about it.
pub fn execute(protocols: &ProtocolRegistry, request: &Request) -> Result<Response, RelayError> {
    let protocol = request.protocol();
    let _span = debug_span!("dispatch", protocol = protocol.value()).entered();

    let handler = protocols.resolve(protocol)?;
    match handler.handle(request.data()) {
        Ok(body) => {
            debug!("Handler for {} completed.", protocol);
            Ok(Response::ok(protocol.value(), body))
        }
        Err(e) => {
            warn!("Handler for {} failed: {}", protocol, e);
            Ok(Response::error(protocol.value(), e.to_string()))
        }
    }
}
