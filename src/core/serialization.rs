//! # Serialization Formats
//!
//! Fallback encodings for payloads handed over as structured values instead
//! of raw bytes. The frame codec never looks inside a payload, so the receiver
//! has to know (by message type) which format a payload was written in.
//!
//! ## Performance Characteristics
//! - **Bincode**: fastest, binary, not self-describing
//! - **MessagePack**: compact, binary, self-describing
//! - **JSON**: human-readable, largest on the wire (default, matches text-protocol peers)

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};

/// Supported serialization formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializationFormat {
    /// Human-readable JSON format (default)
    #[default]
    Json,
    /// Binary compact format
    Bincode,
    /// Compact binary format (MessagePack)
    MessagePack,
}

impl SerializationFormat {
    /// Get human-readable name
    pub fn name(self) -> &'static str {
        match self {
            SerializationFormat::Bincode => "Bincode",
            SerializationFormat::Json => "JSON",
            SerializationFormat::MessagePack => "MessagePack",
        }
    }

    pub fn serialize<T: Serialize + ?Sized>(self, value: &T) -> Result<Vec<u8>> {
        match self {
            SerializationFormat::Bincode => bincode::serialize(value)
                .map_err(|e| ProtocolError::SerializeError(e.to_string())),
            SerializationFormat::Json => serde_json::to_vec(value)
                .map_err(|e| ProtocolError::SerializeError(e.to_string())),
            SerializationFormat::MessagePack => rmp_serde::to_vec(value)
                .map_err(|e| ProtocolError::SerializeError(e.to_string())),
        }
    }

    pub fn deserialize<T: DeserializeOwned>(self, data: &[u8]) -> Result<T> {
        match self {
            SerializationFormat::Bincode => bincode::deserialize(data)
                .map_err(|e| ProtocolError::DeserializeError(e.to_string())),
            SerializationFormat::Json => serde_json::from_slice(data)
                .map_err(|e| ProtocolError::DeserializeError(e.to_string())),
            SerializationFormat::MessagePack => rmp_serde::from_slice(data)
                .map_err(|e| ProtocolError::DeserializeError(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Move {
        cmd: u8,
        x: f32,
        y: f32,
    }

    #[test]
    fn test_default_format_is_json() {
        assert_eq!(SerializationFormat::default(), SerializationFormat::Json);
        assert_eq!(SerializationFormat::default().name(), "JSON");
    }

    #[test]
    fn test_json_output_is_text() {
        let bytes = SerializationFormat::Json
            .serialize(&Move { cmd: 1, x: 250.5, y: 120.0 })
            .expect("serialize");
        assert_eq!(bytes, br#"{"cmd":1,"x":250.5,"y":120.0}"#);
    }

    #[test]
    fn test_each_format_reads_back_its_own_output() {
        let value = Move { cmd: 1, x: 250.5, y: 120.0 };
        for format in [
            SerializationFormat::Bincode,
            SerializationFormat::Json,
            SerializationFormat::MessagePack,
        ] {
            let bytes = format.serialize(&value).expect("serialize");
            let back: Move = format.deserialize(&bytes).expect("deserialize");
            assert_eq!(back, value, "{}", format.name());
        }
    }

    #[test]
    fn test_garbage_is_a_deserialize_error() {
        let result: Result<Move> = SerializationFormat::Json.deserialize(b"\x00\x01");
        assert!(matches!(result, Err(ProtocolError::DeserializeError(_))));
    }
}
