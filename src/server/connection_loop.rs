// src/server/connection_loop.rs

//! Contains the accept loop: admits at most one client socket at a time,
//! keeps exactly one receiver running, and handles graceful shutdown.

use super::context::ServerContext;
use super::stream::AnyStream;
use crate::core::receiver::{Receiver, ReceiverExit};
use crate::core::socket::{SharedSocketRegistry, SocketHandle};
use anyhow::{Result, anyhow};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, warn};

const TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const RECEIVER_STOP_TIMEOUT: Duration = Duration::from_secs(2);
const BACKGROUND_STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolves once SIGINT or SIGTERM is received.
pub fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow!("Failed to register SIGINT handler: {}", e))?;
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow!("Failed to register SIGTERM handler: {}", e))?;
    Ok(async move {
        tokio::select! {
            _ = sigint.recv() => info!("SIGINT received, initiating graceful shutdown."),
            _ = sigterm.recv() => info!("SIGTERM received, initiating graceful shutdown."),
        }
    })
}

/// The main accept loop. Runs until `shutdown` resolves or a pipeline task dies.
pub async fn run<F>(mut ctx: ServerContext, shutdown: F)
where
    F: Future<Output = ()>,
{
    let mut handle_id_counter: u64 = 0;
    let mut receiver_tasks: JoinSet<ReceiverExit> = JoinSet::new();
    let mut handshake_tasks = JoinSet::new();
    let max_frame_bytes = ctx.app.config.receiver.max_frame_bytes;
    let write_timeout = ctx.app.config.receiver.write_timeout;

    spawn_receiver(&ctx, &mut receiver_tasks);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => break,

            Some(res) = ctx.background_tasks.join_next() => {
                match res {
                    Ok(Ok(())) => error!("CRITICAL: A pipeline task finished unexpectedly. Shutting down."),
                    Ok(Err(e)) => error!("CRITICAL: Pipeline task failed: {}. Shutting down.", e),
                    Err(e) => error!("CRITICAL: Pipeline task panicked: {e:?}. Shutting down."),
                }
                break;
            },

            Some(res) = receiver_tasks.join_next() => {
                match res {
                    Ok(exit) => debug!("Receiver task finished: {}", exit),
                    Err(e) if e.is_panic() => error!("Receiver task panicked: {e:?}"),
                    Err(_) => {}
                }
                // A fresh receiver waits for the next injected socket.
                spawn_receiver(&ctx, &mut receiver_tasks);
            },

            res = ctx.listener.accept() => {
                match res {
                    Ok((socket, addr)) => {
                        if ctx.app.sockets.is_present() {
                            warn!("Rejecting connection from {}: a client socket is already active.", addr);
                            drop(socket);
                            continue;
                        }
                        info!("Accepted new connection from: {}", addr);
                        handle_id_counter = handle_id_counter.wrapping_add(1);
                        handshake_tasks.spawn(establish(
                            socket,
                            addr,
                            handle_id_counter,
                            ctx.acceptor.clone(),
                            ctx.app.sockets.clone(),
                            max_frame_bytes,
                            write_timeout,
                        ));
                    }
                    Err(e) => error!("Failed to accept connection: {}", e),
                }
            },

            Some(res) = handshake_tasks.join_next() => {
                if let Err(e) = res
                    && e.is_panic()
                {
                    error!("A connection handshake panicked: {e:?}");
                }
            },
        }
    }

    info!("Shutting down. Sending signal to all tasks.");
    if ctx.shutdown_tx.send(()).is_err() {
        error!("Failed to send shutdown signal. Some tasks may not terminate gracefully.");
    }
    handshake_tasks.shutdown().await;

    if tokio::time::timeout(RECEIVER_STOP_TIMEOUT, async {
        while let Some(res) = receiver_tasks.join_next().await {
            if let Ok(exit) = res {
                debug!("Receiver task finished: {}", exit);
            }
        }
    })
    .await
    .is_err()
    {
        warn!("Timed out waiting for the receiver to stop.");
        receiver_tasks.shutdown().await;
    }

    if let Some(handle) = ctx.app.sockets.clear() {
        handle.shutdown().await;
    }
    info!("Client socket released.");

    info!("Waiting for pipeline tasks to finish...");
    if tokio::time::timeout(BACKGROUND_STOP_TIMEOUT, async {
        while ctx.background_tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!("Timed out waiting for pipeline tasks to finish cleanly.");
    };
    info!("Relay shutdown complete.");
}

fn spawn_receiver(ctx: &ServerContext, receiver_tasks: &mut JoinSet<ReceiverExit>) {
    let receiver = Receiver::new(
        ctx.app.sockets.clone(),
        ctx.request_tx.clone(),
        ctx.app.config.receiver.clone(),
    );
    let shutdown_rx = ctx.shutdown_tx.subscribe();
    receiver_tasks.spawn(receiver.run(shutdown_rx));
}

/// Performs the optional TLS handshake and injects the resulting handle.
async fn establish(
    socket: TcpStream,
    addr: SocketAddr,
    id: u64,
    acceptor: Option<TlsAcceptor>,
    sockets: Arc<SharedSocketRegistry>,
    max_frame_bytes: usize,
    write_timeout: Duration,
) {
    let stream = match acceptor {
        Some(acceptor) => {
            match tokio::time::timeout(TLS_HANDSHAKE_TIMEOUT, acceptor.accept(socket)).await {
                Ok(Ok(tls_stream)) => {
                    info!("TLS handshake successful for {addr}");
                    AnyStream::Tls(Box::new(tls_stream))
                }
                Ok(Err(e)) => {
                    warn!("TLS handshake error for {addr}: {e}");
                    return;
                }
                Err(_) => {
                    warn!("TLS handshake with {addr} timed out.");
                    return;
                }
            }
        }
        None => AnyStream::Tcp(socket),
    };

    let handle = Arc::new(
        SocketHandle::new(id, stream, addr, max_frame_bytes).with_write_timeout(write_timeout),
    );
    if let Err(e) = sockets.inject(handle.clone()) {
        warn!("Dropping connection from {}: {}", addr, e);
        handle.shutdown().await;
    }
}
