//! Outbound frame construction.
//!
//! Every frame leaving a connection is stamped with the same creator and
//! destination names and carries a comm-verification value: a CRC-64
//! over the entire encoded frame computed with the verification field
//! itself zeroed.

use crate::error::CodecError;
use crate::frame::{Frame, FrameType, Header, Trailer, FRAME_NAME_LEN, HEADER_SIZE};
use crate::payload::Payload;
use bytes::{Bytes, BytesMut};
use crc::{Crc, CRC_64_ECMA_182};

const COMM_CRC: Crc<u64> = Crc::<u64>::new(&CRC_64_ECMA_182);

/// Builds frames carrying a fixed creator/destination pair.
#[derive(Debug, Clone)]
pub struct FrameFactory {
    frame_creator: String,
    frame_destination: String,
    auth_key_identifier: u32,
}

impl FrameFactory {
    /// A factory whose frames carry the given authentication key id.
    /// The authentication value itself is not computed here; frames are
    /// built with an empty auth field for the signer to fill in.
    pub fn new(
        frame_creator: impl Into<String>,
        frame_destination: impl Into<String>,
        auth_key_identifier: u32,
    ) -> Result<Self, CodecError> {
        let frame_creator = frame_creator.into();
        let frame_destination = frame_destination.into();
        check_name("frame creator", &frame_creator)?;
        check_name("frame destination", &frame_destination)?;
        Ok(Self {
            frame_creator,
            frame_destination,
            auth_key_identifier,
        })
    }

    /// A factory for unauthenticated connections (auth key id 0).
    pub fn unauthenticated(
        frame_creator: impl Into<String>,
        frame_destination: impl Into<String>,
    ) -> Result<Self, CodecError> {
        Self::new(frame_creator, frame_destination, 0)
    }

    pub fn frame_creator(&self) -> &str {
        &self.frame_creator
    }

    pub fn frame_destination(&self) -> &str {
        &self.frame_destination
    }

    /// Wraps a payload whose frame type is determined by its variant,
    /// with sequence number and series zero.
    ///
    /// Connection and option exchanges are direction-ambiguous and must
    /// go through [`wrap_request`](Self::wrap_request) or
    /// [`wrap_response`](Self::wrap_response) instead.
    pub fn wrap(&self, payload: Payload) -> Result<Frame, CodecError> {
        let frame_type = unambiguous_frame_type(&payload)?;
        self.build(frame_type, payload, 0, 0)
    }

    /// Wraps a payload with an explicit sequence number and series.
    /// Data frames go through here; the sequence number drives gap
    /// tracking at the receiver.
    pub fn wrap_with_seq(
        &self,
        payload: Payload,
        sequence_number: u64,
        series: u32,
    ) -> Result<Frame, CodecError> {
        let frame_type = unambiguous_frame_type(&payload)?;
        self.build(frame_type, payload, sequence_number, series)
    }

    /// Wraps an exchange payload as the request direction.
    pub fn wrap_request(&self, payload: Payload) -> Result<Frame, CodecError> {
        let frame_type = match &payload {
            Payload::ConnectionExchange(_) => FrameType::ConnectionRequest,
            Payload::OptionExchange(_) => FrameType::OptionRequest,
            _ => unambiguous_frame_type(&payload)?,
        };
        self.build(frame_type, payload, 0, 0)
    }

    /// Wraps an exchange payload as the response direction.
    pub fn wrap_response(&self, payload: Payload) -> Result<Frame, CodecError> {
        let frame_type = match &payload {
            Payload::ConnectionExchange(_) => FrameType::ConnectionResponse,
            Payload::OptionExchange(_) => FrameType::OptionResponse,
            _ => unambiguous_frame_type(&payload)?,
        };
        self.build(frame_type, payload, 0, 0)
    }

    fn build(
        &self,
        frame_type: FrameType,
        payload: Payload,
        sequence_number: u64,
        series: u32,
    ) -> Result<Frame, CodecError> {
        let mut payload_buf = BytesMut::new();
        payload.write(&mut payload_buf)?;

        let header = Header {
            frame_type,
            trailer_offset: (HEADER_SIZE + payload_buf.len()) as u32,
            frame_creator: self.frame_creator.clone(),
            frame_destination: self.frame_destination.clone(),
            sequence_number,
            series,
        };
        let trailer = Trailer::new(self.auth_key_identifier, 0, Bytes::new(), 0)?;
        let mut frame = Frame {
            header,
            payload,
            trailer,
        };

        // The trailer's verification field is still zero here, so the
        // encoding is exactly the digest input.
        let encoded = frame.encode()?;
        frame.trailer.comm_verification = COMM_CRC.checksum(&encoded);
        Ok(frame)
    }
}

fn check_name(field: &'static str, name: &str) -> Result<(), CodecError> {
    if name.len() > FRAME_NAME_LEN {
        return Err(CodecError::StringTooLong {
            field,
            width: FRAME_NAME_LEN,
            len: name.len(),
        });
    }
    Ok(())
}

/// Checks the comm-verification value of an encoded frame: the last
/// eight bytes must equal the CRC-64 of the frame with those bytes
/// zeroed.
pub fn verify_comm(encoded: &[u8]) -> bool {
    if encoded.len() < 8 {
        return false;
    }
    let (body, tail) = encoded.split_at(encoded.len() - 8);
    let declared = u64::from_be_bytes(tail.try_into().unwrap_or([0; 8]));
    let mut digest = COMM_CRC.digest();
    digest.update(body);
    digest.update(&[0u8; 8]);
    digest.finalize() == declared
}

fn unambiguous_frame_type(payload: &Payload) -> Result<FrameType, CodecError> {
    match payload {
        Payload::Acknack(_) => Ok(FrameType::Acknack),
        Payload::Alert(_) => Ok(FrameType::Alert),
        Payload::CommandRequest(_) => Ok(FrameType::CommandRequest),
        Payload::CommandResponse(_) => Ok(FrameType::CommandResponse),
        Payload::Data(_) => Ok(FrameType::Data),
        Payload::ConnectionExchange(_) | Payload::OptionExchange(_) => {
            Err(CodecError::AmbiguousDirection)
        }
    }
}
