// src/core/protocol/frame.rs

//! Implements the newline-delimited framing used on the relay socket and the
//! corresponding `Encoder` and `Decoder`.
//!
//! The decoder never fails on content. Oversized lines are skipped up to the
//! next newline and surfaced as `RawFrame::Oversized` so the receiver can drop
//! them without tearing down the connection.

use super::response::Response;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Lines longer than this are discarded unless configured otherwise.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024;

/// One unit produced by the decoder.
#[derive(Debug, Clone, PartialEq)]
pub enum RawFrame {
    /// A complete line, without its terminator.
    Line(Bytes),
    /// A line that exceeded the frame limit. Carries the number of bytes skipped.
    Oversized(usize),
}

#[derive(Debug)]
pub struct EnvelopeCodec {
    max_frame_bytes: usize,
    /// Offset up to which the buffer is known to contain no newline.
    next_index: usize,
    /// Bytes skipped so far while discarding an oversized line.
    discarding: Option<usize>,
}

impl EnvelopeCodec {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            max_frame_bytes,
            next_index: 0,
            discarding: None,
        }
    }
}

impl Default for EnvelopeCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

fn strip_carriage_return(line: &mut BytesMut) {
    if line.last() == Some(&b'\r') {
        line.truncate(line.len() - 1);
    }
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}

impl Decoder for EnvelopeCodec {
    type Item = RawFrame;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<RawFrame>, Self::Error> {
        loop {
            let search_from = self.next_index.min(src.len());
            let newline = src[search_from..]
                .iter()
                .position(|b| *b == b'\n')
                .map(|offset| search_from + offset);

            match (self.discarding, newline) {
                (Some(skipped), Some(pos)) => {
                    src.advance(pos + 1);
                    self.discarding = None;
                    self.next_index = 0;
                    return Ok(Some(RawFrame::Oversized(skipped + pos)));
                }
                (Some(skipped), None) => {
                    let len = src.len();
                    src.advance(len);
                    self.discarding = Some(skipped + len);
                    self.next_index = 0;
                    return Ok(None);
                }
                (None, Some(pos)) => {
                    self.next_index = 0;
                    let mut line = src.split_to(pos + 1);
                    line.truncate(pos);
                    strip_carriage_return(&mut line);
                    if line.len() > self.max_frame_bytes {
                        return Ok(Some(RawFrame::Oversized(line.len())));
                    }
                    if is_blank(&line) {
                        continue;
                    }
                    return Ok(Some(RawFrame::Line(line.freeze())));
                }
                (None, None) => {
                    // A trailing '\r' may still be stripped once the newline arrives.
                    let slack = usize::from(src.last() == Some(&b'\r'));
                    if src.len() > self.max_frame_bytes + slack {
                        let len = src.len();
                        src.advance(len);
                        self.discarding = Some(len);
                        self.next_index = 0;
                    } else {
                        self.next_index = src.len();
                    }
                    return Ok(None);
                }
            }
        }
    }

    /// Delivers a trailing unterminated line once the peer has finished writing.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<RawFrame>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        self.next_index = 0;
        if let Some(skipped) = self.discarding.take() {
            return Ok(Some(RawFrame::Oversized(skipped)));
        }
        if is_blank(src) {
            src.clear();
            return Ok(None);
        }
        let mut line = src.split();
        strip_carriage_return(&mut line);
        Ok(Some(RawFrame::Line(line.freeze())))
    }
}

impl Encoder<Response> for EnvelopeCodec {
    type Error = std::io::Error;

    /// Writes the response as a single JSON line.
    fn encode(&mut self, item: Response, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let body = serde_json::to_vec(&item)?;
        dst.reserve(body.len() + 1);
        dst.extend_from_slice(&body);
        dst.put_u8(b'\n');
        Ok(())
    }
}
