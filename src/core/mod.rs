// src/core/mod.rs

//! The central module containing the receive pipeline and its collaborators.

pub mod analyzer;
pub mod dice;
pub mod errors;
pub mod protocol;
pub mod receiver;
pub mod socket;
pub mod transmitter;

pub use errors::{FaultClass, RelayError};
pub use protocol::{CustomProtocolNumber, Request};
