// src/core/socket/mod.rs

//! The single shared client socket and the registry that hands it out to the
//! receiver and the transmitter.

mod handle;
mod registry;

pub use handle::{DEFAULT_WRITE_TIMEOUT, FrameReader, FrameWriter, SocketHandle};
pub use registry::SharedSocketRegistry;
