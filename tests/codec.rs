//! Integration tests for the frame codec
//!
//! Covers the wire layout, round-trips at the payload size boundaries and
//! the `tokio_util` codec adapter.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bytes::BytesMut;
use oblit_protocol::config::{HEADER_SIZE, MAX_PAYLOAD_SIZE};
use oblit_protocol::core::codec::FrameCodec;
use oblit_protocol::core::frame::{decode, encode, Frame, WireVersion};
use oblit_protocol::core::payload::{from_payload, IntoPayload, Structured};
use oblit_protocol::core::serialization::SerializationFormat;
use oblit_protocol::error::ProtocolError;
use serde::{Deserialize, Serialize};
use tokio_util::codec::{Decoder, Encoder};

#[test]
fn test_every_type_roundtrips_at_size_boundaries() {
    let sizes = [0usize, 1, MAX_PAYLOAD_SIZE];
    for kind in 0..=u8::MAX {
        for &size in &sizes {
            let payload = vec![kind; size];
            let wire = encode(kind, &payload).unwrap();
            assert_eq!(wire.len(), HEADER_SIZE + size);

            let decoded = decode(&wire).expect("complete frame");
            assert_eq!(decoded.kind, kind);
            assert_eq!(decoded.payload, &payload[..]);
            assert!(decoded.remainder.is_empty());
        }
    }
}

#[test]
fn test_move_update_is_twelve_bytes() {
    let mut payload = vec![1u8];
    payload.extend_from_slice(&250.5f32.to_be_bytes());
    payload.extend_from_slice(&120.0f32.to_be_bytes());
    assert_eq!(payload.len(), 9);

    let wire = encode(1, &payload).unwrap();
    assert_eq!(wire.len(), 12);
    assert_eq!(wire[0], 0x01);
    assert_eq!(&wire[1..3], &[0x00, 0x09]);
    assert_eq!(&wire[3..], &payload[..]);

    let decoded = decode(&wire).unwrap();
    assert_eq!(decoded.kind, 1);
    assert_eq!(decoded.payload, &payload[..]);
    assert!(decoded.remainder.is_empty());
}

#[test]
fn test_length_is_big_endian() {
    let wire = encode(0xAB, &[0u8; 0x0102]).unwrap();
    assert_eq!(&wire[..3], &[0xAB, 0x01, 0x02]);
}

#[test]
fn test_decode_does_not_consume_input() {
    let mut wire = encode(1, b"one").unwrap().to_vec();
    wire.extend_from_slice(&encode(2, b"two").unwrap());
    let snapshot = wire.clone();

    let first = decode(&wire).unwrap();
    let second = decode(first.remainder).unwrap();
    assert_eq!((first.kind, first.payload), (1, &b"one"[..]));
    assert_eq!((second.kind, second.payload), (2, &b"two"[..]));
    assert!(second.remainder.is_empty());
    assert_eq!(wire, snapshot);
}

#[test]
fn test_oversized_payload_fails_fast() {
    let result = encode(1, &vec![0u8; MAX_PAYLOAD_SIZE + 1]);
    assert!(matches!(result, Err(ProtocolError::OversizedPayload(_))));
}

#[test]
fn test_codec_and_pure_encode_agree() {
    let mut codec = FrameCodec::new(WireVersion::V1, MAX_PAYLOAD_SIZE);
    let mut buf = BytesMut::new();
    codec
        .encode(Frame::new(7, vec![1, 2, 3]), &mut buf)
        .unwrap();
    assert_eq!(&buf[..], &encode(7, &[1, 2, 3]).unwrap()[..]);

    let frame = codec.decode(&mut buf).unwrap().expect("frame");
    assert_eq!(frame, Frame::new(7, vec![1, 2, 3]));
    assert!(buf.is_empty());
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Move {
    cmd: u8,
    x: f32,
    y: f32,
}

#[test]
fn test_fallback_path_frames_serialized_value() {
    let value = Move {
        cmd: 1,
        x: 250.5,
        y: 120.0,
    };
    let payload = Structured(&value)
        .into_payload(SerializationFormat::Json)
        .unwrap();
    let wire = encode(1, &payload).unwrap();

    let decoded = decode(&wire).unwrap();
    let back: Move = from_payload(decoded.payload, SerializationFormat::Json).unwrap();
    assert_eq!(back, value);
    // binary fast path is much smaller than the JSON fallback
    assert!(wire.len() > 12);
}
