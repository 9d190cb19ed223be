//! Adaptive payload representation.
//!
//! Raw bytes are framed as-is (fast path). Anything wrapped in [`Structured`]
//! is serialized first with the connection's [`SerializationFormat`]
//! (fallback path). The decoder never knows which path produced a payload.

use bytes::{Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::core::serialization::SerializationFormat;
use crate::error::Result;

/// Conversion into the bytes that go after the frame header.
pub trait IntoPayload {
    fn into_payload(self, format: SerializationFormat) -> Result<Bytes>;
}

impl IntoPayload for Bytes {
    #[inline]
    fn into_payload(self, _: SerializationFormat) -> Result<Bytes> {
        Ok(self)
    }
}

impl IntoPayload for BytesMut {
    #[inline]
    fn into_payload(self, _: SerializationFormat) -> Result<Bytes> {
        Ok(self.freeze())
    }
}

impl IntoPayload for Vec<u8> {
    #[inline]
    fn into_payload(self, _: SerializationFormat) -> Result<Bytes> {
        Ok(Bytes::from(self))
    }
}

impl IntoPayload for &[u8] {
    #[inline]
    fn into_payload(self, _: SerializationFormat) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(self))
    }
}

impl<const N: usize> IntoPayload for &[u8; N] {
    #[inline]
    fn into_payload(self, _: SerializationFormat) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(self))
    }
}

/// A value that is not already bytes and must go through the fallback encoding.
///
/// ```rust
/// use oblit_protocol::core::payload::{IntoPayload, Structured};
/// use oblit_protocol::core::serialization::SerializationFormat;
///
/// let bytes = Structured(&[1, 2, 3]).into_payload(SerializationFormat::Json).unwrap();
/// assert_eq!(&bytes[..], b"[1,2,3]");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Structured<T>(pub T);

impl<T: Serialize> IntoPayload for Structured<T> {
    fn into_payload(self, format: SerializationFormat) -> Result<Bytes> {
        format.serialize(&self.0).map(Bytes::from)
    }
}

/// Read a payload written through the fallback path.
pub fn from_payload<T: DeserializeOwned>(payload: &[u8], format: SerializationFormat) -> Result<T> {
    format.deserialize(payload)
}
