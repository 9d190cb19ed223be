//! # Frame Codec for `tokio_util::codec`
//!
//! Adapter that lets the wire format be used with `Framed`, `FramedRead`
//! and `FramedWrite`. It shares the encode/decode logic of
//! [`WireVersion`], so frames produced here are byte-identical to those of
//! [`frame::encode`](crate::core::frame::encode).
//!
//! `Framed` owns its read buffer and appends before calling `decode`, so the
//! overflow check here runs after the append: a buffer already above the
//! limit is rejected on the next decode attempt.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::config::TransportConfig;
use crate::core::frame::{Frame, WireVersion};
use crate::core::guard::OverflowGuard;
use crate::error::{constants, ProtocolError, Result};

#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    version: WireVersion,
    max_payload: usize,
    guard: OverflowGuard,
}

impl FrameCodec {
    pub fn new(version: WireVersion, max_payload: usize) -> Self {
        Self {
            version,
            max_payload,
            guard: OverflowGuard::for_max_payload(max_payload),
        }
    }

    pub fn from_config(config: &TransportConfig) -> Self {
        Self::new(config.wire_version, config.max_payload_size)
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::from_config(&TransportConfig::default())
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if let Some(frame) = self.version.split_frame(src) {
            return Ok(Some(frame));
        }

        if let Err(e) = self.guard.admit(src.len(), 0) {
            warn!(
                buffered = src.len(),
                limit = self.guard.limit(),
                "{}",
                constants::ERR_BUFFER_OVERFLOW
            );
            src.clear();
            return Err(e);
        }

        // Reserve room for the rest of a frame whose header is known
        if let Some(total) = self.version.announced_len(src) {
            src.reserve(total - src.len());
        }
        Ok(None)
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<()> {
        self.version
            .encode_into(item.kind, &item.payload, self.max_payload, dst)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::core::frame::encode;

    #[test]
    fn test_codec_matches_pure_encode() {
        let mut codec = FrameCodec::default();
        let mut dst = BytesMut::new();
        codec
            .encode(Frame::new(42, &b"state"[..]), &mut dst)
            .unwrap();
        assert_eq!(&dst[..], &encode(42, b"state").unwrap()[..]);
    }

    #[test]
    fn test_partial_decode_preserves_buffer() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::from(&[1u8, 0, 5, b'a'][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn test_multiple_frames_in_buffer() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&encode(1, &[1, 2, 3]).unwrap());
        buf.extend_from_slice(&encode(2, &[4, 5, 6]).unwrap());

        let first = codec.decode(&mut buf).unwrap().expect("first frame");
        let second = codec.decode(&mut buf).unwrap().expect("second frame");
        assert_eq!((first.kind, &first.payload[..]), (1, &[1u8, 2, 3][..]));
        assert_eq!((second.kind, &second.payload[..]), (2, &[4u8, 5, 6][..]));
        assert!(buf.is_empty());
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_stalled_buffer_over_limit_errors() {
        let mut codec = FrameCodec::new(WireVersion::V1, 4);
        let mut buf = BytesMut::from(&[1u8, 0, 200][..]);
        buf.extend_from_slice(&[0u8; 14]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::BufferOverflow { limit: 16, .. })
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_encode_rejects_payload_over_configured_max() {
        let mut codec = FrameCodec::new(WireVersion::V1, 4);
        let mut dst = BytesMut::new();
        let result = codec.encode(Frame::new(0, vec![0u8; 5]), &mut dst);
        assert!(matches!(result, Err(ProtocolError::OversizedPayload(5))));
    }
}
