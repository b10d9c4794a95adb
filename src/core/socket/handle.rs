// src/core/socket/handle.rs

//! Defines `SocketHandle`, the owner of one accepted client stream.

use crate::core::RelayError;
use crate::core::protocol::{EnvelopeCodec, RawFrame, Response};
use crate::server::AnyStream;
use bytes::BytesMut;
use futures::SinkExt;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, ReadHalf, WriteHalf};
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::timeout;
use tokio_util::codec::{Decoder, FramedWrite};
use tracing::{debug, warn};

/// Initial capacity of the read buffer.
const READ_BUFFER_CAPACITY: usize = 8 * 1024;

/// Upper bound on a single send or shutdown, including the wait for the writer lock.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// The read half of a client stream, paired with the frame decoder.
///
/// `next_frame` performs at most one `read` per call when no complete frame is
/// buffered. It is cancel-safe: bytes that were read stay in the buffer.
pub struct FrameReader {
    io: ReadHalf<AnyStream>,
    codec: EnvelopeCodec,
    buffer: BytesMut,
    eof: bool,
}

impl FrameReader {
    fn new(io: ReadHalf<AnyStream>, codec: EnvelopeCodec) -> Self {
        Self {
            io,
            codec,
            buffer: BytesMut::with_capacity(READ_BUFFER_CAPACITY),
            eof: false,
        }
    }

    /// Returns the next frame, or `None` once the peer has closed its side and
    /// every buffered byte has been delivered.
    pub async fn next_frame(&mut self) -> Result<Option<RawFrame>, RelayError> {
        loop {
            if let Some(frame) = self.codec.decode(&mut self.buffer)? {
                return Ok(Some(frame));
            }
            if self.eof {
                return Ok(self.codec.decode_eof(&mut self.buffer)?);
            }
            self.buffer.reserve(READ_BUFFER_CAPACITY);
            if self.io.read_buf(&mut self.buffer).await? == 0 {
                self.eof = true;
            }
        }
    }
}

pub type FrameWriter = FramedWrite<WriteHalf<AnyStream>, EnvelopeCodec>;

/// One bidirectional client connection, plain TCP or TLS.
///
/// The read and write halves sit behind separate locks. The reader lock is the
/// exclusive section that serializes receive calls; writers never wait on it.
pub struct SocketHandle {
    id: u64,
    peer: SocketAddr,
    tls: bool,
    write_timeout: Duration,
    reader: Mutex<FrameReader>,
    writer: Mutex<FrameWriter>,
}

impl SocketHandle {
    pub fn new(id: u64, stream: AnyStream, peer: SocketAddr, max_frame_bytes: usize) -> Self {
        let tls = stream.is_tls();
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            id,
            peer,
            tls,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            reader: Mutex::new(FrameReader::new(
                read_half,
                EnvelopeCodec::new(max_frame_bytes),
            )),
            writer: Mutex::new(FramedWrite::new(
                write_half,
                EnvelopeCodec::new(max_frame_bytes),
            )),
        }
    }

    /// Replaces the bound applied to `send` and `shutdown`.
    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_tls(&self) -> bool {
        self.tls
    }

    /// Enters the exclusive receive section.
    pub async fn lock_reader(&self) -> MutexGuard<'_, FrameReader> {
        self.reader.lock().await
    }

    /// Writes one response line and flushes it.
    ///
    /// Fails with a `TimedOut` I/O error when the peer does not drain the
    /// socket within the write timeout. Bytes already buffered are flushed
    /// ahead of the next response.
    pub async fn send(&self, response: Response) -> Result<(), RelayError> {
        let write = async {
            let mut writer = self.writer.lock().await;
            writer.send(response).await
        };
        match timeout(self.write_timeout, write).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("write stalled for {}ms", self.write_timeout.as_millis()),
            )
            .into()),
        }
    }

    /// Flushes and shuts down the write side. Errors are logged and ignored,
    /// since the connection is being discarded anyway.
    pub async fn shutdown(&self) {
        let close = async {
            let mut writer = self.writer.lock().await;
            <FrameWriter as SinkExt<Response>>::close(&mut *writer).await
        };
        match timeout(self.write_timeout, close).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!("Shutdown of client socket {} ({}) failed: {}", self.id, self.peer, e)
            }
            Err(_) => warn!(
                "Shutdown of client socket {} ({}) timed out; dropping unsent data.",
                self.id, self.peer
            ),
        }
    }
}

impl fmt::Debug for SocketHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketHandle")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("tls", &self.tls)
            .field("write_timeout", &self.write_timeout)
            .finish()
    }
}
