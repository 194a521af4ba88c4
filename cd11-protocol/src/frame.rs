//! CD-1.1 frame structure: header, trailer, and the assembled frame.
//!
//! Frame layout (big-endian throughout):
//!
//! ```text
//! +-----------+------------------+----------------------------+
//! | header    | payload          | trailer                    |
//! | 36 bytes  | variable         | 16 bytes + padded auth     |
//! +-----------+------------------+----------------------------+
//! ```
//!
//! The header's trailer offset field declares where the payload ends
//! (header size plus payload size), so the full frame length is the
//! trailer offset plus the trailer's own (auth-size dependent) length.

use crate::error::CodecError;
use crate::payload::Payload;
use crate::wire;
use bytes::{BufMut, Bytes, BytesMut};

/// Size of the fixed frame header in bytes (4+4+8+8+8+4 = 36).
pub const HEADER_SIZE: usize = 36;

/// Minimum trailer length: auth key id, auth size, comm verification.
/// The variable-length authentication value comes on top of this.
pub const TRAILER_MIN_SIZE: usize = 16;

/// Wire width of the frame creator and frame destination fields.
pub const FRAME_NAME_LEN: usize = 8;

/// The frame type tag carried in the first header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    ConnectionRequest = 1,
    ConnectionResponse = 2,
    OptionRequest = 3,
    OptionResponse = 4,
    Data = 5,
    Acknack = 6,
    CommandRequest = 7,
    CommandResponse = 8,
    Alert = 9,
}

impl FrameType {
    /// Maps a wire tag to a frame type; unknown tags are the malformed path.
    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            1 => Some(FrameType::ConnectionRequest),
            2 => Some(FrameType::ConnectionResponse),
            3 => Some(FrameType::OptionRequest),
            4 => Some(FrameType::OptionResponse),
            5 => Some(FrameType::Data),
            6 => Some(FrameType::Acknack),
            7 => Some(FrameType::CommandRequest),
            8 => Some(FrameType::CommandResponse),
            9 => Some(FrameType::Alert),
            _ => None,
        }
    }

    pub fn tag(self) -> u32 {
        self as u32
    }
}

/// The fixed 36-byte frame header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub frame_type: FrameType,
    /// Byte offset from the start of the frame to the trailer, i.e.
    /// header size plus payload size.
    pub trailer_offset: u32,
    pub frame_creator: String,
    pub frame_destination: String,
    pub sequence_number: u64,
    pub series: u32,
}

impl Header {
    pub fn read(buf: &mut Bytes) -> Result<Self, CodecError> {
        let tag = wire::get_u32(buf, "frame type")?;
        let frame_type = FrameType::from_tag(tag).ok_or(CodecError::UnknownFrameType(tag))?;
        let trailer_offset = wire::get_u32(buf, "trailer offset")?;
        if (trailer_offset as usize) < HEADER_SIZE {
            return Err(CodecError::BadTrailerOffset(trailer_offset));
        }
        let frame_creator = wire::get_string(buf, "frame creator", FRAME_NAME_LEN)?;
        let frame_destination = wire::get_string(buf, "frame destination", FRAME_NAME_LEN)?;
        let sequence_number = wire::get_u64(buf, "sequence number")?;
        let series = wire::get_u32(buf, "series")?;

        Ok(Self {
            frame_type,
            trailer_offset,
            frame_creator,
            frame_destination,
            sequence_number,
            series,
        })
    }

    pub fn write(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        buf.put_u32(self.frame_type.tag());
        buf.put_u32(self.trailer_offset);
        wire::put_string(buf, "frame creator", &self.frame_creator, FRAME_NAME_LEN)?;
        wire::put_string(
            buf,
            "frame destination",
            &self.frame_destination,
            FRAME_NAME_LEN,
        )?;
        buf.put_u64(self.sequence_number);
        buf.put_u32(self.series);
        Ok(())
    }

    /// Declared payload length, from the trailer offset field.
    pub fn payload_len(&self) -> usize {
        self.trailer_offset as usize - HEADER_SIZE
    }
}

/// The frame trailer: authentication fields plus the comm-verification
/// CRC computed over the entire frame with this field zeroed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trailer {
    pub auth_key_identifier: u32,
    /// Unpadded length of the authentication value.
    pub auth_size: u32,
    /// Authentication value bytes, padded to a multiple of 4.
    pub auth_value: Bytes,
    pub comm_verification: u64,
}

impl Trailer {
    pub fn new(
        auth_key_identifier: u32,
        auth_size: u32,
        auth_value: Bytes,
        comm_verification: u64,
    ) -> Result<Self, CodecError> {
        if auth_value.len() != wire::padded_len(auth_size as usize, 4) {
            return Err(CodecError::BadPadding {
                field: "authentication value",
                len: auth_value.len(),
            });
        }
        Ok(Self {
            auth_key_identifier,
            auth_size,
            auth_value,
            comm_verification,
        })
    }

    pub fn read(buf: &mut Bytes) -> Result<Self, CodecError> {
        let auth_key_identifier = wire::get_u32(buf, "auth key identifier")?;
        let auth_size = wire::get_u32(buf, "auth size")?;
        let padded = wire::padded_len(auth_size as usize, 4);
        let auth_value = wire::get_bytes(buf, "auth value", padded)?;
        let comm_verification = wire::get_u64(buf, "comm verification")?;
        Self::new(auth_key_identifier, auth_size, auth_value, comm_verification)
    }

    pub fn write(&self, buf: &mut BytesMut) {
        buf.put_u32(self.auth_key_identifier);
        buf.put_u32(self.auth_size);
        buf.put_slice(&self.auth_value);
        buf.put_u64(self.comm_verification);
    }

    /// Encoded trailer length in bytes.
    pub fn size(&self) -> usize {
        TRAILER_MIN_SIZE + self.auth_value.len()
    }
}

/// A fully decoded CD-1.1 frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub header: Header,
    pub payload: Payload,
    pub trailer: Trailer,
}

impl Frame {
    /// Encodes the frame into bytes, header through trailer.
    pub fn encode(&self) -> Result<BytesMut, CodecError> {
        let mut buf =
            BytesMut::with_capacity(self.header.trailer_offset as usize + self.trailer.size());
        self.header.write(&mut buf)?;
        self.payload.write(&mut buf)?;
        self.trailer.write(&mut buf);
        Ok(buf)
    }
}

/// One byte span that could not be decoded as a frame, kept for
/// diagnostics rather than dropped.
#[derive(Debug, Clone)]
pub struct MalformedFrame {
    /// The header, when it parsed before the failure.
    pub header: Option<Header>,
    /// The raw bytes of the rejected span.
    pub bytes: Bytes,
    /// What went wrong.
    pub cause: CodecError,
}

impl MalformedFrame {
    /// Station name from the partial header, when one was readable.
    pub fn station(&self) -> Option<&str> {
        self.header
            .as_ref()
            .map(|h| h.frame_creator.as_str())
            .filter(|s| !s.is_empty())
    }
}

/// Outcome of decoding one frame span: a well-formed frame or a
/// malformed blob with its cause. `read_frame` is total over arbitrary
/// input; no structural error escapes it.
#[derive(Debug, Clone)]
pub enum DecodedFrame {
    Frame(Frame),
    Malformed(MalformedFrame),
}

/// Decodes one complete frame span, as emitted by
/// [`FrameDecoder`](crate::codec::FrameDecoder).
///
/// Any structural failure (unknown tag, underflow, length mismatch,
/// bad payload) yields `DecodedFrame::Malformed` carrying the original
/// bytes and the causing error.
pub fn read_frame(bytes: Bytes) -> DecodedFrame {
    match try_read_frame(&bytes) {
        Ok(frame) => DecodedFrame::Frame(frame),
        Err(cause) => {
            // Salvage the header for diagnostics when it parses on its own.
            let header = if bytes.len() >= HEADER_SIZE {
                Header::read(&mut bytes.clone()).ok()
            } else {
                None
            };
            DecodedFrame::Malformed(MalformedFrame {
                header,
                bytes,
                cause,
            })
        }
    }
}

fn try_read_frame(bytes: &Bytes) -> Result<Frame, CodecError> {
    let mut buf = bytes.clone();
    let header = Header::read(&mut buf)?;

    let payload_len = header.payload_len();
    let mut payload_buf = wire::get_bytes(&mut buf, "payload", payload_len)?;
    let payload = Payload::read(header.frame_type, &mut payload_buf)?;

    let trailer = Trailer::read(&mut buf)?;

    let declared = HEADER_SIZE + payload_len + trailer.size();
    if declared != bytes.len() {
        return Err(CodecError::LengthMismatch {
            declared,
            actual: bytes.len(),
        });
    }

    Ok(Frame {
        header,
        payload,
        trailer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::FrameFactory;
    use crate::payload::Alert;

    fn alert_frame() -> Frame {
        let factory = FrameFactory::unauthenticated("STA01", "DEST").unwrap();
        factory
            .wrap(Payload::Alert(Alert::new("shutting down")))
            .unwrap()
    }

    #[test]
    fn test_frame_type_tags() {
        for tag in 1..=9u32 {
            let ft = FrameType::from_tag(tag).unwrap();
            assert_eq!(ft.tag(), tag);
        }
        assert!(FrameType::from_tag(0).is_none());
        assert!(FrameType::from_tag(10).is_none());
        assert!(FrameType::from_tag(u32::MAX).is_none());
    }

    #[test]
    fn test_header_roundtrip() {
        let header = Header {
            frame_type: FrameType::Data,
            trailer_offset: 136,
            frame_creator: "STA01".to_string(),
            frame_destination: "IDC".to_string(),
            sequence_number: 0xFFFF_FFFF_FFFF_0001,
            series: 7,
        };
        let mut buf = BytesMut::new();
        header.write(&mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE);

        let decoded = Header::read(&mut buf.freeze()).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.payload_len(), 100);
    }

    #[test]
    fn test_trailer_roundtrip() {
        let trailer = Trailer::new(3, 5, Bytes::from_static(b"abcde\0\0\0"), 0xDEAD).unwrap();
        let mut buf = BytesMut::new();
        trailer.write(&mut buf);
        assert_eq!(buf.len(), trailer.size());

        let decoded = Trailer::read(&mut buf.freeze()).unwrap();
        assert_eq!(decoded, trailer);
    }

    #[test]
    fn test_trailer_rejects_unpadded_auth_value() {
        let err = Trailer::new(0, 5, Bytes::from_static(b"abcde"), 0).unwrap_err();
        assert!(matches!(err, CodecError::BadPadding { .. }));
    }

    #[test]
    fn test_read_frame_roundtrip() {
        let frame = alert_frame();
        let encoded = frame.encode().unwrap().freeze();

        match read_frame(encoded) {
            DecodedFrame::Frame(decoded) => assert_eq!(decoded, frame),
            DecodedFrame::Malformed(m) => panic!("unexpected malformed frame: {}", m.cause),
        }
    }

    #[test]
    fn test_read_frame_unknown_type_is_malformed() {
        let mut encoded = alert_frame().encode().unwrap();
        encoded[0..4].copy_from_slice(&99u32.to_be_bytes());

        match read_frame(encoded.freeze()) {
            DecodedFrame::Malformed(m) => {
                assert!(matches!(m.cause, CodecError::UnknownFrameType(99)));
                assert!(m.header.is_none());
            }
            DecodedFrame::Frame(_) => panic!("expected malformed"),
        }
    }

    #[test]
    fn test_read_frame_truncated_is_malformed() {
        let encoded = alert_frame().encode().unwrap().freeze();
        let truncated = encoded.slice(0..encoded.len() - 4);

        match read_frame(truncated) {
            DecodedFrame::Malformed(m) => {
                // The header parsed, so diagnostics keep the station name.
                assert_eq!(m.station(), Some("STA01"));
            }
            DecodedFrame::Frame(_) => panic!("expected malformed"),
        }
    }

    #[test]
    fn test_read_frame_multibyte_timestamp_is_malformed() {
        use crate::payload::CommandRequest;
        use chrono::TimeZone;

        let factory = FrameFactory::unauthenticated("STA01", "DEST").unwrap();
        let frame = factory
            .wrap(Payload::CommandRequest(CommandRequest {
                station_name: "STA01".to_string(),
                site: "KCC".to_string(),
                channel: "BHZ".to_string(),
                loc_name: "01".to_string(),
                timestamp: chrono::Utc.with_ymd_and_hms(2017, 12, 13, 23, 20, 0).unwrap(),
                command_message: "calibrate".to_string(),
            }))
            .unwrap();
        let mut encoded = frame.encode().unwrap();

        // Overwrite the timestamp field (after the header and the four
        // name fields) with 20 bytes of non-ASCII text whose multibyte
        // character straddles a digit boundary.
        let at = HEADER_SIZE + 8 + 5 + 3 + 2 + 2;
        encoded[at..at + 20].copy_from_slice("201\u{e9}46 23:20:00.142".as_bytes());

        match read_frame(encoded.freeze()) {
            DecodedFrame::Malformed(m) => {
                assert!(matches!(m.cause, CodecError::BadTimestamp(_)))
            }
            DecodedFrame::Frame(_) => panic!("expected malformed"),
        }
    }

    #[test]
    fn test_read_frame_length_mismatch() {
        let mut encoded = alert_frame().encode().unwrap();
        encoded.extend_from_slice(b"tail");

        match read_frame(encoded.freeze()) {
            DecodedFrame::Malformed(m) => {
                assert!(matches!(m.cause, CodecError::LengthMismatch { .. }))
            }
            DecodedFrame::Frame(_) => panic!("expected malformed"),
        }
    }

    #[test]
    fn test_read_frame_empty_input() {
        match read_frame(Bytes::new()) {
            DecodedFrame::Malformed(m) => {
                assert!(m.header.is_none());
                assert!(matches!(m.cause, CodecError::Underflow { .. }));
            }
            DecodedFrame::Frame(_) => panic!("expected malformed"),
        }
    }
}
