// src/server/context.rs

use crate::config::Config;
use crate::core::protocol::{ProtocolRegistry, Request, Response};
use crate::core::socket::SharedSocketRegistry;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;

/// The explicitly constructed application state handed to every component.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub sockets: Arc<SharedSocketRegistry>,
    pub protocols: Arc<ProtocolRegistry>,
}

/// The channel ends consumed by the pipeline tasks when they are spawned.
pub struct PipelineChannels {
    pub request_rx: mpsc::Receiver<Request>,
    pub response_tx: mpsc::Sender<Response>,
    pub response_rx: mpsc::Receiver<Response>,
}

/// Holds all the initialized state required to run the accept loop.
pub struct ServerContext {
    pub app: AppContext,
    pub listener: TcpListener,
    pub acceptor: Option<TlsAcceptor>,
    pub shutdown_tx: broadcast::Sender<()>,
    pub background_tasks: JoinSet<Result<(), anyhow::Error>>,
    /// Cloned into every receiver the accept loop starts.
    pub request_tx: mpsc::Sender<Request>,
    pub pipeline: Option<PipelineChannels>,
}
