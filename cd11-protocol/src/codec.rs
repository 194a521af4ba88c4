//! Streaming frame-boundary decoder.
//!
//! Splits a TCP byte stream into whole-frame byte spans without parsing
//! payloads. The total length of a frame is recoverable from its first
//! 44 bytes: the header's trailer offset plus the trailer's fixed part
//! plus the padded authentication value.

use crate::error::CodecError;
use crate::frame::{FrameType, HEADER_SIZE, TRAILER_MIN_SIZE};
use crate::wire;
use bytes::{Buf, Bytes, BytesMut};

/// Upper bound on a single frame, larger claims are treated as garbage.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// The outcome of one decode step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeEvent {
    /// A complete frame span, ready for [`crate::read_frame`].
    Frame(Bytes),
    /// Bytes that cannot begin a frame. Everything buffered is drained
    /// so the stream can resynchronize.
    Garbage(Bytes),
}

/// Accumulates stream bytes and yields frame spans.
///
/// Feed bytes with [`extend`](Self::extend) in whatever chunks the
/// transport delivers, then drain events with [`decode`](Self::decode)
/// until it returns `None`. Chunking never changes the emitted spans.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends bytes received from the transport.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Bytes buffered but not yet emitted.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Attempts to extract the next event from the buffer.
    ///
    /// Returns `None` when the buffer holds only a prefix of a frame;
    /// more bytes are needed before anything can be emitted.
    pub fn decode(&mut self) -> Option<DecodeEvent> {
        let total = match self.next_frame_len() {
            Ok(Some(total)) => total,
            Ok(None) => return None,
            Err(err) => {
                // The buffer start is not a plausible frame. Drain it
                // all; resynchronization happens upstream.
                tracing::warn!(error = %err, len = self.buffer.len(), "draining unparseable bytes");
                let blob = self.buffer.split().freeze();
                return Some(DecodeEvent::Garbage(blob));
            }
        };
        if self.buffer.len() < total {
            return None;
        }
        Some(DecodeEvent::Frame(self.buffer.split_to(total).freeze()))
    }

    /// Total length of the frame at the buffer start, or `None` if too
    /// few bytes are buffered to tell.
    fn next_frame_len(&self) -> Result<Option<usize>, CodecError> {
        if self.buffer.len() < HEADER_SIZE {
            return Ok(None);
        }
        let mut peek = &self.buffer[..];

        let tag = peek.get_u32();
        FrameType::from_tag(tag).ok_or(CodecError::UnknownFrameType(tag))?;
        let trailer_offset = peek.get_u32() as usize;
        if trailer_offset < HEADER_SIZE {
            return Err(CodecError::BadTrailerOffset(trailer_offset as u32));
        }
        if trailer_offset + TRAILER_MIN_SIZE > MAX_FRAME_SIZE {
            return Err(CodecError::FrameTooLarge {
                size: trailer_offset + TRAILER_MIN_SIZE,
                max: MAX_FRAME_SIZE,
            });
        }
        // The auth size sits 4 bytes into the trailer.
        if self.buffer.len() < trailer_offset + 8 {
            return Ok(None);
        }
        let mut trailer = &self.buffer[trailer_offset + 4..];
        let auth_size = trailer.get_u32() as usize;
        let total = trailer_offset + TRAILER_MIN_SIZE + wire::padded_len(auth_size, 4);
        if total > MAX_FRAME_SIZE {
            return Err(CodecError::FrameTooLarge {
                size: total,
                max: MAX_FRAME_SIZE,
            });
        }
        Ok(Some(total))
    }
}
