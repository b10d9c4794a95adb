// src/core/protocol/mod.rs

//! The wire-facing half of the relay: protocol numbers, the line-delimited
//! JSON frame codec, envelopes, normalized requests and the handler registry.

pub mod envelope;
pub mod frame;
pub mod number;
pub mod registry;
pub mod request;
pub mod response;

pub use envelope::Envelope;
pub use frame::{DEFAULT_MAX_FRAME_BYTES, EnvelopeCodec, RawFrame};
pub use number::CustomProtocolNumber;
pub use registry::{ProtocolHandler, ProtocolRegistry};
pub use request::{Request, RequestGenerator};
pub use response::Response;
