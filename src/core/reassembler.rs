//! # Stream Reassembler
//!
//! Per-connection accumulator that turns arbitrarily chunked socket reads
//! into complete frames.
//!
//! Bytes live in one `BytesMut`. Each decoded frame is split off the front
//! (the split point is the read cursor), and its payload is handed out as a
//! frozen `Bytes` view without copying. The space in front of the cursor is
//! reclaimed by `reserve` on a later append, once the live tail is small
//! enough to move cheaply, so each chunk costs amortized linear time.
//!
//! After every `feed` the buffer holds at most one incomplete frame.

use bytes::BytesMut;
use tracing::trace;

use crate::config::TransportConfig;
use crate::core::frame::{Frame, WireVersion};
use crate::core::guard::OverflowGuard;
use crate::error::Result;

#[derive(Debug)]
pub struct StreamReassembler {
    buffer: BytesMut,
    version: WireVersion,
    guard: OverflowGuard,
}

impl StreamReassembler {
    pub fn new(version: WireVersion, guard: OverflowGuard) -> Self {
        Self {
            buffer: BytesMut::new(),
            version,
            guard,
        }
    }

    pub fn from_config(config: &TransportConfig) -> Self {
        Self::new(
            config.wire_version,
            OverflowGuard::for_max_payload(config.max_payload_size),
        )
    }

    /// Append `chunk` and drain every complete frame, in arrival order.
    ///
    /// When the guard trips, the buffer is discarded, no frame from this
    /// chunk is returned, and the connection must be closed.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Frame>> {
        let mut frames = Vec::new();
        self.feed_with(chunk, |frame| frames.push(frame))?;
        Ok(frames)
    }

    /// Like [`feed`](Self::feed) but hands each frame to `on_frame` as soon
    /// as it is split off.
    pub fn feed_with<F>(&mut self, chunk: &[u8], mut on_frame: F) -> Result<usize>
    where
        F: FnMut(Frame),
    {
        if let Err(e) = self.guard.admit(self.buffer.len(), chunk.len()) {
            self.clear();
            return Err(e);
        }

        self.buffer.reserve(chunk.len());
        self.buffer.extend_from_slice(chunk);

        let mut count = 0;
        while let Some(frame) = self.version.split_frame(&mut self.buffer) {
            trace!(kind = frame.kind, len = frame.payload.len(), "frame reassembled");
            on_frame(frame);
            count += 1;
        }
        Ok(count)
    }

    /// Bytes received but not yet resolved into a frame
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop any partial frame. Called when the connection closes.
    pub fn clear(&mut self) {
        self.buffer = BytesMut::new();
    }

    pub fn version(&self) -> WireVersion {
        self.version
    }

    pub fn guard(&self) -> OverflowGuard {
        self.guard
    }
}

impl Default for StreamReassembler {
    fn default() -> Self {
        Self::from_config(&TransportConfig::default())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::core::frame::encode;
    use crate::error::ProtocolError;

    fn small(max: usize) -> StreamReassembler {
        StreamReassembler::new(WireVersion::V1, OverflowGuard::for_max_payload(max))
    }

    #[test]
    fn test_byte_at_a_time_emits_once_at_the_end() {
        let wire = encode(3, b"position").unwrap();
        let mut r = StreamReassembler::default();

        for (i, byte) in wire.iter().enumerate() {
            let frames = r.feed(std::slice::from_ref(byte)).unwrap();
            if i + 1 < wire.len() {
                assert!(frames.is_empty(), "emitted early at byte {i}");
            } else {
                assert_eq!(frames, vec![Frame::new(3, &b"position"[..])]);
            }
        }
        assert!(r.is_empty());
    }

    #[test]
    fn test_coalesced_frames_come_out_in_order() {
        let mut chunk = encode(1, b"first").unwrap().to_vec();
        chunk.extend_from_slice(&encode(2, b"").unwrap());
        chunk.extend_from_slice(&encode(3, b"third").unwrap());

        let frames = StreamReassembler::default().feed(&chunk).unwrap();
        let kinds: Vec<u8> = frames.iter().map(|f| f.kind).collect();
        assert_eq!(kinds, vec![1, 2, 3]);
        assert_eq!(&frames[0].payload[..], b"first");
        assert!(frames[1].payload.is_empty());
        assert_eq!(&frames[2].payload[..], b"third");
    }

    #[test]
    fn test_tail_of_next_frame_is_retained() {
        let mut chunk = encode(1, b"a").unwrap().to_vec();
        let second = encode(2, b"bcd").unwrap();
        chunk.extend_from_slice(&second[..2]);

        let mut r = StreamReassembler::default();
        assert_eq!(r.feed(&chunk).unwrap().len(), 1);
        assert_eq!(r.buffered(), 2);

        let frames = r.feed(&second[2..]).unwrap();
        assert_eq!(frames, vec![Frame::new(2, &b"bcd"[..])]);
        assert_eq!(r.buffered(), 0);
    }

    #[test]
    fn test_overflow_discards_state_and_emits_nothing() {
        let mut r = small(8);
        // header claims 255 bytes, which never arrive
        assert!(r.feed(&[1, 0, 0xFF]).unwrap().is_empty());
        assert!(r.feed(&[0u8; 29]).unwrap().is_empty());
        assert_eq!(r.buffered(), 32);

        let err = r.feed(&[0u8; 1]).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::BufferOverflow {
                buffered: 32,
                incoming: 1,
                limit: 32
            }
        ));
        assert_eq!(r.buffered(), 0);
    }

    #[test]
    fn test_single_chunk_over_limit_is_rejected_before_append() {
        let mut r = small(4);
        let mut emitted = 0;
        let result = r.feed_with(&[0u8; 17], |_| emitted += 1);
        assert!(result.is_err());
        assert_eq!(emitted, 0);
        assert!(r.is_empty());
    }

    #[test]
    fn test_payload_bytes_survive_split() {
        let mut r = StreamReassembler::default();
        let frames = r.feed(&encode(4, &[7u8; 64]).unwrap()).unwrap();
        assert_eq!(frames[0].payload.len(), 64);
        assert!(frames[0].payload.iter().all(|b| *b == 7));
    }
}
