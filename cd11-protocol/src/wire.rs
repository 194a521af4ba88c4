//! Low-level buffer helpers shared by the frame and payload codecs.

use crate::error::CodecError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Rounds `unpadded` up to a multiple of `divisible_by`.
pub(crate) fn padded_len(unpadded: usize, divisible_by: usize) -> usize {
    match unpadded % divisible_by {
        0 => unpadded,
        rem => unpadded + (divisible_by - rem),
    }
}

/// Number of padding bytes needed to align `size` to `divisible_by`.
pub(crate) fn needed_padding(size: usize, divisible_by: usize) -> usize {
    padded_len(size, divisible_by) - size
}

pub(crate) fn ensure(
    buf: &Bytes,
    field: &'static str,
    needed: usize,
) -> Result<(), CodecError> {
    if buf.remaining() < needed {
        return Err(CodecError::Underflow {
            field,
            needed,
            available: buf.remaining(),
        });
    }
    Ok(())
}

pub(crate) fn get_u32(buf: &mut Bytes, field: &'static str) -> Result<u32, CodecError> {
    ensure(buf, field, 4)?;
    Ok(buf.get_u32())
}

pub(crate) fn get_u64(buf: &mut Bytes, field: &'static str) -> Result<u64, CodecError> {
    ensure(buf, field, 8)?;
    Ok(buf.get_u64())
}

pub(crate) fn get_u16(buf: &mut Bytes, field: &'static str) -> Result<u16, CodecError> {
    ensure(buf, field, 2)?;
    Ok(buf.get_u16())
}

pub(crate) fn get_u8(buf: &mut Bytes, field: &'static str) -> Result<u8, CodecError> {
    ensure(buf, field, 1)?;
    Ok(buf.get_u8())
}

pub(crate) fn get_f32(buf: &mut Bytes, field: &'static str) -> Result<f32, CodecError> {
    ensure(buf, field, 4)?;
    Ok(buf.get_f32())
}

pub(crate) fn get_bytes(
    buf: &mut Bytes,
    field: &'static str,
    len: usize,
) -> Result<Bytes, CodecError> {
    ensure(buf, field, len)?;
    Ok(buf.split_to(len))
}

/// Reads a fixed-width field and strips NUL padding and surrounding
/// whitespace, the way CD-1.1 senders right-pad text fields.
pub(crate) fn get_string(
    buf: &mut Bytes,
    field: &'static str,
    width: usize,
) -> Result<String, CodecError> {
    let raw = get_bytes(buf, field, width)?;
    Ok(strip_padding(&raw))
}

pub(crate) fn strip_padding(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).replace('\0', "").trim().to_string()
}

/// Writes `s` into a fixed-width field, right-padded with NUL bytes.
pub(crate) fn put_string(
    buf: &mut BytesMut,
    field: &'static str,
    s: &str,
    width: usize,
) -> Result<(), CodecError> {
    if s.len() > width {
        return Err(CodecError::StringTooLong {
            field,
            width,
            len: s.len(),
        });
    }
    buf.put_slice(s.as_bytes());
    buf.put_bytes(0, width - s.len());
    Ok(())
}

/// Writes raw bytes followed by NUL padding up to a multiple of 4.
pub(crate) fn put_padded(buf: &mut BytesMut, data: &[u8]) {
    buf.put_slice(data);
    buf.put_bytes(0, needed_padding(data.len(), 4));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_len() {
        assert_eq!(padded_len(0, 4), 0);
        assert_eq!(padded_len(1, 4), 4);
        assert_eq!(padded_len(4, 4), 4);
        assert_eq!(padded_len(10, 4), 12);
    }

    #[test]
    fn test_needed_padding() {
        assert_eq!(needed_padding(10, 4), 2);
        assert_eq!(needed_padding(8, 4), 0);
    }

    #[test]
    fn test_string_roundtrip() {
        let mut buf = BytesMut::new();
        put_string(&mut buf, "site", "KCC", 5).unwrap();
        assert_eq!(&buf[..], b"KCC\0\0");

        let mut bytes = buf.freeze();
        assert_eq!(get_string(&mut bytes, "site", 5).unwrap(), "KCC");
    }

    #[test]
    fn test_string_too_long() {
        let mut buf = BytesMut::new();
        let err = put_string(&mut buf, "site", "TOOLONG", 5).unwrap_err();
        assert!(matches!(err, CodecError::StringTooLong { width: 5, .. }));
    }

    #[test]
    fn test_underflow() {
        let mut bytes = Bytes::from_static(b"\x00\x01");
        let err = get_u32(&mut bytes, "series").unwrap_err();
        assert!(matches!(
            err,
            CodecError::Underflow {
                field: "series",
                needed: 4,
                available: 2
            }
        ));
    }
}
