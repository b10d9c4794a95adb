// src/core/receiver.rs

//! The receive loop: waits for the shared client socket, polls it for frames,
//! decodes them into requests and forwards those to the command analyzer.
//!
//! The loop moves through three states:
//!
//! * `AwaitingSocket` checks the `SharedSocketRegistry` with a fixed backoff.
//! * `Polling` repeatedly enters the reader's exclusive section, waits a bounded
//!   time for one frame, leaves the section and only then decodes and forwards.
//! * `Closed` is terminal. A fresh socket needs a fresh `Receiver`.
//!
//! Every suspension point races the shutdown signal.

use crate::config::ReceiverConfig;
use crate::core::errors::{FaultClass, RelayError};
use crate::core::protocol::{Envelope, RawFrame, Request, RequestGenerator};
use crate::core::socket::{SharedSocketRegistry, SocketHandle};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    AwaitingSocket,
    Polling,
    Closed,
}

/// Why a receiver stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum ReceiverExit {
    /// The peer closed the connection cleanly. The socket was cleared.
    PeerClosed,
    /// A transport fault ended the connection. The socket was cleared.
    Fatal(RelayError),
    /// Another component cleared or replaced the socket this receiver was using.
    Superseded,
    /// The command analyzer stopped accepting requests.
    AnalyzerGone,
    /// The process is shutting down.
    Shutdown,
}

impl fmt::Display for ReceiverExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiverExit::PeerClosed => write!(f, "peer closed the connection"),
            ReceiverExit::Fatal(e) => write!(f, "fatal transport fault: {e}"),
            ReceiverExit::Superseded => write!(f, "socket was cleared by another component"),
            ReceiverExit::AnalyzerGone => write!(f, "command analyzer is gone"),
            ReceiverExit::Shutdown => write!(f, "shutdown requested"),
        }
    }
}

/// Counts consecutive unclassified faults on one connection.
///
/// Only `FaultClass::Unclassified` errors count. Any frame read successfully
/// resets the streak.
#[derive(Debug, Clone)]
pub struct FaultStreak {
    limit: u32,
    count: u32,
}

impl FaultStreak {
    pub fn new(limit: u32) -> Self {
        Self { limit, count: 0 }
    }

    /// Records `err`. Returns true once the streak has reached the limit and
    /// the connection should be torn down.
    pub fn record(&mut self, err: &RelayError) -> bool {
        if err.fault_class() != FaultClass::Unclassified {
            return false;
        }
        self.count = self.count.saturating_add(1);
        self.count >= self.limit
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}

/// The outcome of a single poll iteration.
enum Step {
    Continue,
    Exit(ReceiverExit),
}

pub struct Receiver {
    sockets: Arc<SharedSocketRegistry>,
    analyzer_tx: mpsc::Sender<Request>,
    config: ReceiverConfig,
    state: ReceiverState,
    streak: FaultStreak,
}

impl Receiver {
    pub fn new(
        sockets: Arc<SharedSocketRegistry>,
        analyzer_tx: mpsc::Sender<Request>,
        config: ReceiverConfig,
    ) -> Self {
        let streak = FaultStreak::new(config.max_unclassified_faults);
        Self {
            sockets,
            analyzer_tx,
            config,
            state: ReceiverState::AwaitingSocket,
            streak,
        }
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    /// Runs the loop until the connection ends or shutdown is signalled.
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) -> ReceiverExit {
        let Some(handle) = self.acquire_socket(&mut shutdown_rx).await else {
            return self.finish(ReceiverExit::Shutdown);
        };

        info!(
            "Receiver attached to client socket {} from {}.",
            handle.id(),
            handle.peer()
        );
        self.state = ReceiverState::Polling;

        loop {
            if let Step::Exit(exit) = self.poll_once(&handle, &mut shutdown_rx).await {
                return self.finish(exit);
            }

            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => return self.finish(ReceiverExit::Shutdown),
                _ = sleep(self.config.iteration_delay) => {}
            }
        }
    }

    fn finish(&mut self, exit: ReceiverExit) -> ReceiverExit {
        self.state = ReceiverState::Closed;
        info!("Receiver closed: {}.", exit);
        exit
    }

    /// Blocks, with a fixed backoff, until a socket is registered.
    async fn acquire_socket(
        &mut self,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> Option<Arc<SocketHandle>> {
        self.state = ReceiverState::AwaitingSocket;
        loop {
            if let Some(handle) = self.sockets.get() {
                return Some(handle);
            }
            trace!("Receiver: waiting for a client socket.");

            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => return None,
                _ = sleep(self.config.acquire_backoff) => {}
            }
        }
    }

    async fn poll_once(
        &mut self,
        handle: &Arc<SocketHandle>,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> Step {
        if !self.sockets.is_current(handle) {
            return Step::Exit(ReceiverExit::Superseded);
        }

        // The exclusive section covers the receive call only.
        let polled = {
            let mut reader = handle.lock_reader().await;
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => return Step::Exit(ReceiverExit::Shutdown),
                polled = timeout(self.config.poll_timeout, reader.next_frame()) => polled,
            }
        };

        let frame = match polled {
            Err(_elapsed) => return Step::Continue,
            Ok(Ok(None)) => {
                info!(
                    "Client socket {} from {} closed by peer.",
                    handle.id(),
                    handle.peer()
                );
                self.sockets.close(handle).await;
                return Step::Exit(ReceiverExit::PeerClosed);
            }
            Ok(Err(e)) => return self.handle_fault(handle, e).await,
            Ok(Ok(Some(frame))) => frame,
        };

        self.streak.reset();
        match frame {
            RawFrame::Oversized(len) => {
                self.handle_fault(handle, RelayError::FrameTooLarge(len))
                    .await
            }
            RawFrame::Line(bytes) => self.dispatch(handle, &bytes).await,
        }
    }

    /// Decodes one frame and forwards the resulting request, if any.
    async fn dispatch(&mut self, handle: &Arc<SocketHandle>, bytes: &[u8]) -> Step {
        let envelope = match Envelope::decode(bytes) {
            Ok(envelope) => envelope,
            Err(e) => return self.handle_fault(handle, e).await,
        };

        let Some(command) = envelope.command else {
            debug!("Receiver: message without a command, skipping.");
            return Step::Continue;
        };
        debug!("Receiver: protocol {} with data {:?}", command, envelope.data);

        let request = match RequestGenerator::generate(command, envelope.data) {
            Ok(request) => request,
            Err(e) => return self.handle_fault(handle, e).await,
        };

        if self.analyzer_tx.send(request).await.is_err() {
            error!("Command analyzer channel is closed; stopping receiver.");
            return Step::Exit(ReceiverExit::AnalyzerGone);
        }
        Step::Continue
    }

    async fn handle_fault(&mut self, handle: &Arc<SocketHandle>, err: RelayError) -> Step {
        match err.fault_class() {
            FaultClass::TransportFatal => {
                warn!(
                    "Receive on client socket {} from {} failed: {}. Closing connection.",
                    handle.id(),
                    handle.peer(),
                    err
                );
                self.sockets.close(handle).await;
                Step::Exit(ReceiverExit::Fatal(err))
            }
            FaultClass::TransportTransient => {
                if !err.is_silent() {
                    debug!("Receiver: transient I/O condition, no action needed: {}", err);
                }
                Step::Continue
            }
            FaultClass::PayloadMalformed => {
                warn!("Receiver: dropping malformed message: {}", err);
                Step::Continue
            }
            FaultClass::Unclassified => {
                let escalate = self.streak.record(&err);
                warn!(
                    "Receiver: unexpected error ({}/{}): {}",
                    self.streak.count(),
                    self.streak.limit(),
                    err
                );
                if escalate {
                    error!(
                        "Receiver: too many consecutive unexpected errors on client socket {}. Closing connection.",
                        handle.id()
                    );
                    self.sockets.close(handle).await;
                    return Step::Exit(ReceiverExit::Fatal(err));
                }
                Step::Continue
            }
        }
    }
}
