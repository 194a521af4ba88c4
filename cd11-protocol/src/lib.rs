//! # cd11-protocol
//!
//! Wire protocol implementation for CD-1.1, the frame-based seismic data
//! acquisition protocol.
//!
//! This crate provides:
//! - Binary codec for frame headers, trailers, and every payload variant
//! - A streaming frame-boundary decoder for arbitrarily chunked byte input
//! - A frame factory for building outbound frames with comm-verification
//! - Julian-date timestamp conversion helpers

pub mod codec;
pub mod error;
pub mod factory;
pub mod frame;
pub mod payload;
pub mod subframe;
pub mod time;

pub(crate) mod wire;

pub use codec::{DecodeEvent, FrameDecoder, MAX_FRAME_SIZE};
pub use error::CodecError;
pub use factory::{verify_comm, FrameFactory};
pub use frame::{
    read_frame, DecodedFrame, Frame, FrameType, Header, MalformedFrame, Trailer, HEADER_SIZE,
    TRAILER_MIN_SIZE,
};
pub use payload::{
    Acknack, Alert, CommandRequest, CommandResponse, ConnectionExchange, Data, OptionExchange,
    Payload,
};
pub use subframe::{ChannelSubframe, ChannelSubframeHeader};

/// CD-1.1 protocol version advertised in connection exchanges.
pub const MAJOR_VERSION: u16 = 1;
pub const MINOR_VERSION: u16 = 1;
