//! Codec error types.

use thiserror::Error;

/// Structural errors raised while encoding or decoding CD-1.1 frames.
///
/// None of these escape `read_frame`, which converts every failure into a
/// `Malformed` outcome so a caller can skip one bad frame and keep reading.
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    #[error("unknown frame type tag: {0}")]
    UnknownFrameType(u32),

    #[error("buffer underflow reading {field}: need {needed} bytes, have {available}")]
    Underflow {
        field: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("trailer offset {0} is inside the frame header")]
    BadTrailerOffset(u32),

    #[error("frame length mismatch: declared {declared} bytes, buffer holds {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("invalid {field} count: {value}")]
    BadCount { field: &'static str, value: u64 },

    #[error("invalid julian timestamp: {0:?}")]
    BadTimestamp(String),

    #[error("{field} too long: {len} bytes exceeds field width {width}")]
    StringTooLong {
        field: &'static str,
        width: usize,
        len: usize,
    },

    #[error("{field} must be padded to a multiple of 4, got {len} bytes")]
    BadPadding { field: &'static str, len: usize },

    #[error("channel string length {actual} does not match 10 x {channels} channels")]
    ChannelStringMismatch { actual: usize, channels: u32 },

    #[error("payload direction is ambiguous; use wrap_request or wrap_response")]
    AmbiguousDirection,
}
