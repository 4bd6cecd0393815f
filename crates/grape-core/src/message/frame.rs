//! Round-tagged wire frames
//!
//! Format: [src_fid:4][round:4][length:4][payload:N][crc32:4], little-endian.
//! The CRC covers header and payload.

use crate::fragment::FragId;
use crate::value::wire_len;
use crate::{Error, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use crc32fast::Hasher;

/// Header size in bytes
pub const HEADER_LEN: usize = 12;

/// Trailer (CRC) size in bytes
pub const TRAILER_LEN: usize = 4;

/// One batch of messages from one fragment to another for one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Sending fragment
    pub src: FragId,
    /// Round in which the frame was sent
    pub round: u32,
    /// Concatenated message records
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame
    pub fn new(src: FragId, round: u32, payload: Bytes) -> Self {
        Self {
            src,
            round,
            payload,
        }
    }

    /// Size of the encoded frame
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.payload.len() + TRAILER_LEN
    }

    /// Encode frame to bytes
    pub fn encode(&self) -> Result<Bytes> {
        let len = wire_len(self.payload.len(), "frame payload")?;
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_u32_le(self.src);
        buf.put_u32_le(self.round);
        buf.put_u32_le(len);
        buf.put_slice(&self.payload);

        let mut hasher = Hasher::new();
        hasher.update(&buf);
        buf.put_u32_le(hasher.finalize());

        Ok(buf.freeze())
    }

    /// Decode a frame; the CRC is only checked when `verify` is set
    pub fn decode(mut buf: Bytes, verify: bool) -> Result<Self> {
        if buf.len() < HEADER_LEN + TRAILER_LEN {
            return Err(Error::protocol(format!(
                "frame too short: {} bytes",
                buf.len()
            )));
        }

        let crc_offset = buf.len() - TRAILER_LEN;
        if verify {
            let stored_crc = (&buf[crc_offset..]).get_u32_le();
            let mut hasher = Hasher::new();
            hasher.update(&buf[..crc_offset]);
            let computed_crc = hasher.finalize();
            if stored_crc != computed_crc {
                return Err(Error::protocol(format!(
                    "CRC mismatch: expected {:x}, got {:x}",
                    stored_crc, computed_crc
                )));
            }
        }

        let src = buf.get_u32_le();
        let round = buf.get_u32_le();
        let length = buf.get_u32_le() as usize;
        if length != crc_offset - HEADER_LEN {
            return Err(Error::protocol(format!(
                "frame length {} does not match {} payload bytes",
                length,
                crc_offset - HEADER_LEN
            )));
        }
        let payload = buf.split_to(length);

        Ok(Self {
            src,
            round,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let frame = Frame::new(3, 7, Bytes::from_static(b"abc"));
        let bytes = frame.encode().unwrap();
        assert_eq!(bytes.len(), HEADER_LEN + 3 + TRAILER_LEN);
        assert_eq!(&bytes[0..4], &3u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &7u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &3u32.to_le_bytes());
        assert_eq!(&bytes[12..15], b"abc");

        assert_eq!(Frame::decode(bytes, true).unwrap(), frame);
    }

    #[test]
    fn test_empty_payload() {
        let frame = Frame::new(0, 0, Bytes::new());
        let decoded = Frame::decode(frame.encode().unwrap(), true).unwrap();
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn test_corrupt_frame_rejected() {
        let encoded = Frame::new(1, 2, Bytes::from_static(b"xyz")).encode().unwrap();
        let mut raw = BytesMut::from(&encoded[..]);
        raw[13] ^= 0xFF;
        let raw = raw.freeze();

        let err = Frame::decode(raw.clone(), true).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert!(err.to_string().contains("CRC mismatch"));

        // Without verification the payload is taken as-is
        let frame = Frame::decode(raw, false).unwrap();
        assert_eq!(frame.payload.len(), 3);
    }

    #[test]
    fn test_truncated_frame_rejected() {
        let err = Frame::decode(Bytes::from_static(&[0; 8]), true).unwrap_err();
        assert!(err.to_string().contains("too short"));
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let mut raw = BytesMut::new();
        raw.put_u32_le(0);
        raw.put_u32_le(0);
        raw.put_u32_le(10);
        raw.put_slice(b"ab");
        raw.put_u32_le(0);
        let err = Frame::decode(raw.freeze(), false).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }
}
