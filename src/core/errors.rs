// src/core/errors.rs

//! Defines the primary error type for the relay, together with the fault
//! classes the receiver uses to decide whether a connection survives an error.

use crate::core::protocol::CustomProtocolNumber;
use std::io::ErrorKind;
use std::sync::Arc;
use thiserror::Error;

/// How an error affects the connection it was raised on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultClass {
    /// The connection is unusable. The shared socket is cleared and the receiver exits.
    TransportFatal,
    /// A temporary I/O condition. The receiver keeps polling.
    TransportTransient,
    /// A single message could not be used. It is dropped and the connection is unaffected.
    PayloadMalformed,
    /// Anything not covered above. Counted by the receiver and escalated past a threshold.
    Unclassified,
}

/// The main error enum, representing all failures within the relay.
#[derive(Error, Debug, Clone)]
pub enum RelayError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("TLS Error: {0}")]
    Tls(String),

    #[error("A client socket is already registered")]
    AlreadyPresent,

    #[error("Protocol {0} is already registered")]
    DuplicateProtocol(CustomProtocolNumber),

    #[error("No handler registered for protocol {0}")]
    ProtocolNotFound(CustomProtocolNumber),

    #[error("Unknown protocol number {0}")]
    UnknownProtocol(i64),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Frame of {0} bytes exceeds the configured limit")]
    FrameTooLarge(usize),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Internal Error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Maps the error onto the fault class that decides the receiver's reaction.
    pub fn fault_class(&self) -> FaultClass {
        match self {
            RelayError::Tls(_) => FaultClass::TransportFatal,
            RelayError::Io(e) => classify_io_kind(e.kind()),
            RelayError::MalformedPayload(_)
            | RelayError::FrameTooLarge(_)
            | RelayError::UnknownProtocol(_) => FaultClass::PayloadMalformed,
            _ => FaultClass::Unclassified,
        }
    }

    /// True for I/O conditions that are expected on a healthy non-blocking socket
    /// and are not worth logging at all.
    pub fn is_silent(&self) -> bool {
        matches!(self, RelayError::Io(e) if e.kind() == ErrorKind::Interrupted)
    }
}

/// Classifies a raw I/O error kind.
///
/// `InvalidData` is what the TLS layer reports when a record cannot be
/// decrypted or parsed, so it is treated as a broken secure channel.
pub fn classify_io_kind(kind: ErrorKind) -> FaultClass {
    match kind {
        ErrorKind::InvalidData
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::BrokenPipe
        | ErrorKind::UnexpectedEof
        | ErrorKind::NotConnected => FaultClass::TransportFatal,
        ErrorKind::WouldBlock | ErrorKind::Interrupted | ErrorKind::TimedOut => {
            FaultClass::TransportTransient
        }
        _ => FaultClass::Unclassified,
    }
}

impl PartialEq for RelayError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RelayError::Io(e1), RelayError::Io(e2)) => {
                e1.kind() == e2.kind() && e1.to_string() == e2.to_string()
            }
            (RelayError::Tls(s1), RelayError::Tls(s2)) => s1 == s2,
            (RelayError::DuplicateProtocol(p1), RelayError::DuplicateProtocol(p2)) => p1 == p2,
            (RelayError::ProtocolNotFound(p1), RelayError::ProtocolNotFound(p2)) => p1 == p2,
            (RelayError::UnknownProtocol(n1), RelayError::UnknownProtocol(n2)) => n1 == n2,
            (RelayError::MalformedPayload(s1), RelayError::MalformedPayload(s2)) => s1 == s2,
            (RelayError::FrameTooLarge(n1), RelayError::FrameTooLarge(n2)) => n1 == n2,
            (RelayError::InvalidArgument(s1), RelayError::InvalidArgument(s2)) => s1 == s2,
            (RelayError::Internal(s1), RelayError::Internal(s2)) => s1 == s2,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for RelayError {
    fn from(e: std::io::Error) -> Self {
        // tokio-rustls surfaces TLS failures as `InvalidData` wrapping a `rustls::Error`.
        if let Some(tls_err) = e
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<rustls::Error>())
        {
            return RelayError::Tls(tls_err.to_string());
        }
        RelayError::Io(Arc::new(e))
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        RelayError::MalformedPayload(e.to_string())
    }
}
