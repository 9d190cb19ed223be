//! # Frame Codec
//!
//! Pure conversion between a `(type, payload)` pair and its wire frame.
//!
//! ## Wire Format (`WireVersion::V1`)
//! ```text
//! [Type(1)] [Length(2, big-endian)] [Payload(Length)]
//! ```
//!
//! Nothing in this module performs I/O or keeps state. `decode` only borrows
//! its input; callers drain a buffer by re-invoking it on `remainder` until it
//! returns `None`.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::config::{HEADER_SIZE, MAX_PAYLOAD_SIZE};
use crate::error::{ProtocolError, Result};

/// One complete frame with an owned payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Message kind, 0-255
    pub kind: u8,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(kind: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }
}

/// Result of a successful [`decode`]: the frame borrowed from the input plus
/// everything that follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded<'a> {
    pub kind: u8,
    pub payload: &'a [u8],
    pub remainder: &'a [u8],
}

/// Supported wire formats. Every connection picks one through
/// [`TransportConfig::wire_version`](crate::config::TransportConfig).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum WireVersion {
    /// 1-byte type, 2-byte big-endian length, raw payload
    #[default]
    V1,
}

impl WireVersion {
    pub fn header_size(self) -> usize {
        match self {
            WireVersion::V1 => HEADER_SIZE,
        }
    }

    /// Append the frame for `(kind, payload)` to `dst`.
    ///
    /// Fails with `OversizedPayload` when `payload` is longer than `max_payload`
    /// (or than the length field can express). Nothing is written in that case.
    pub fn encode_into(
        self,
        kind: u8,
        payload: &[u8],
        max_payload: usize,
        dst: &mut BytesMut,
    ) -> Result<()> {
        if payload.len() > max_payload.min(MAX_PAYLOAD_SIZE) {
            return Err(ProtocolError::OversizedPayload(payload.len()));
        }

        match self {
            WireVersion::V1 => {
                dst.reserve(HEADER_SIZE + payload.len());
                dst.put_u8(kind);
                dst.put_u16(payload.len() as u16);
                dst.put_slice(payload);
            }
        }
        Ok(())
    }

    /// Total wire length announced by the header at the front of `src`,
    /// once the header itself has arrived.
    #[inline]
    pub fn announced_len(self, src: &[u8]) -> Option<usize> {
        match self {
            WireVersion::V1 => {
                if src.len() < HEADER_SIZE {
                    return None;
                }
                Some(HEADER_SIZE + u16::from_be_bytes([src[1], src[2]]) as usize)
            }
        }
    }

    /// Total wire length of the first frame in `src`, if it is fully present.
    #[inline]
    pub fn frame_len(self, src: &[u8]) -> Option<usize> {
        self.announced_len(src).filter(|total| src.len() >= *total)
    }

    pub fn decode(self, src: &[u8]) -> Option<Decoded<'_>> {
        let total = self.frame_len(src)?;
        let header = self.header_size();
        Some(Decoded {
            kind: src[0],
            payload: &src[header..total],
            remainder: &src[total..],
        })
    }

    /// Split the first complete frame off the front of `buf` without copying
    /// the payload. Leaves `buf` untouched when the frame is incomplete.
    pub fn split_frame(self, buf: &mut BytesMut) -> Option<Frame> {
        let total = self.frame_len(buf)?;
        let mut raw = buf.split_to(total);
        let kind = raw[0];
        raw.advance(self.header_size());
        Some(Frame {
            kind,
            payload: raw.freeze(),
        })
    }
}

/// Encode `(kind, payload)` as a `V1` frame: `3 + payload.len()` bytes.
pub fn encode(kind: u8, payload: &[u8]) -> Result<Bytes> {
    let mut dst = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    WireVersion::V1.encode_into(kind, payload, MAX_PAYLOAD_SIZE, &mut dst)?;
    Ok(dst.freeze())
}

/// Decode the first `V1` frame of `src`, or `None` while it is incomplete.
pub fn decode(src: &[u8]) -> Option<Decoded<'_>> {
    WireVersion::V1.decode(src)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn test_nine_byte_payload_layout() {
        let payload = [1u8, 0x43, 0x7A, 0x80, 0x00, 0x42, 0xF0, 0x00, 0x00];
        let bytes = encode(1, &payload).unwrap();

        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[..3], &[0x01, 0x00, 0x09]);
        assert_eq!(&bytes[3..], &payload);

        let decoded = decode(&bytes).expect("complete frame");
        assert_eq!(decoded.kind, 1);
        assert_eq!(decoded.payload, &payload);
        assert!(decoded.remainder.is_empty());
    }

    #[test]
    fn test_header_only_is_incomplete() {
        assert!(decode(&[]).is_none());
        assert!(decode(&[7]).is_none());
        assert!(decode(&[7, 0]).is_none());
        // header says 4 bytes, only 3 arrived
        assert!(decode(&[7, 0, 4, 1, 2, 3]).is_none());
    }

    #[test]
    fn test_empty_payload_is_complete_with_header_alone() {
        let decoded = decode(&[9, 0, 0]).expect("empty frame");
        assert_eq!(decoded.kind, 9);
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn test_remainder_holds_following_bytes() {
        let mut wire = encode(2, b"ab").unwrap().to_vec();
        wire.extend_from_slice(&[3, 0]);
        let decoded = decode(&wire).unwrap();
        assert_eq!(decoded.payload, b"ab");
        assert_eq!(decoded.remainder, &[3, 0]);
        assert!(decode(decoded.remainder).is_none());
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let payload = vec![0u8; MAX_PAYLOAD_SIZE + 1];
        assert!(matches!(
            encode(0, &payload),
            Err(ProtocolError::OversizedPayload(n)) if n == MAX_PAYLOAD_SIZE + 1
        ));

        let mut dst = BytesMut::new();
        let result = WireVersion::V1.encode_into(0, &[0u8; 11], 10, &mut dst);
        assert!(matches!(result, Err(ProtocolError::OversizedPayload(11))));
        assert!(dst.is_empty());
    }

    #[test]
    fn test_split_frame_leaves_partial_tail() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&encode(5, b"hello").unwrap());
        buf.extend_from_slice(&[6, 0, 2, b'x']);

        let frame = WireVersion::V1.split_frame(&mut buf).unwrap();
        assert_eq!(frame, Frame::new(5, &b"hello"[..]));
        assert_eq!(&buf[..], &[6, 0, 2, b'x']);
        assert!(WireVersion::V1.split_frame(&mut buf).is_none());
        assert_eq!(buf.len(), 4);
    }
}
