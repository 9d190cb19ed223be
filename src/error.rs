//! # Error Types
//!
//! Error handling for the framing protocol.
//!
//! An incomplete frame is never an error: the decoder reports it as `None` and
//! the reassembler simply waits for more bytes. Everything that does surface
//! here falls into one of four groups:
//!
//! ## Error Categories
//! - **Transport faults**: socket I/O failures, peer resets, closed connections
//! - **Overflow**: the reassembly buffer grew past the guard threshold
//! - **Caller misuse**: payloads larger than the configured maximum
//! - **Configuration / serialization**: bad config files, fallback-path encoding failures
//!
//! ## Example Usage
//! ```rust
//! use oblit_protocol::core::frame::encode;
//! use oblit_protocol::error::ProtocolError;
//!
//! let too_big = vec![0u8; 70_000];
//! match encode(1, &too_big) {
//!     Err(ProtocolError::OversizedPayload(len)) => assert_eq!(len, 70_000),
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

use std::io;
use thiserror::Error;

/// Error message constants shared by log lines and error strings.
pub mod constants {
    pub const ERR_CONNECTION_CLOSED: &str = "Connection closed";
    pub const ERR_BUFFER_OVERFLOW: &str = "Reassembly buffer exceeded overflow limit";
    pub const ERR_OVERSIZED_PAYLOAD: &str = "Payload exceeds maximum size";
    pub const ERR_CONNECT_TIMEOUT: &str = "Timed out connecting to server";
}

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Deserialize error: {0}")]
    DeserializeError(String),

    #[error("Payload too large: {0} bytes")]
    OversizedPayload(usize),

    #[error("Buffer overflow: {buffered} buffered + {incoming} incoming exceeds limit of {limit} bytes")]
    BufferOverflow {
        buffered: usize,
        incoming: usize,
        limit: usize,
    },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Unknown connection: {0}")]
    UnknownConnection(u64),

    #[error("Timeout occurred")]
    Timeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overflow_message_names_all_sizes() {
        let err = ProtocolError::BufferOverflow {
            buffered: 10,
            incoming: 20,
            limit: 25,
        };
        let text = err.to_string();
        assert!(text.contains("10"));
        assert!(text.contains("20"));
        assert!(text.contains("25"));
    }
}
