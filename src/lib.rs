//! # oblit-protocol
//!
//! A minimal binary wire protocol for typed, length-delimited messages over
//! TCP. Each frame is a 1-byte message type, a 2-byte big-endian payload
//! length and the payload itself, so a 9-byte game update costs 12 bytes on
//! the wire.
//!
//! ## Layers
//! - [`core`]: pure frame codec, payload conversion, overflow guard and
//!   stream reassembler
//! - [`transport`]: per-connection read loop and writer over tokio TCP
//! - [`service`]: client and server connection managers with typed events
//! - [`config`], [`error`], [`utils`]: configuration, errors, logging and metrics
//!
//! ## Example
//! ```rust
//! use oblit_protocol::core::frame::{decode, encode};
//!
//! let wire = encode(1, &[0u8; 9]).unwrap();
//! assert_eq!(wire.len(), 12);
//!
//! let frame = decode(&wire).unwrap();
//! assert_eq!(frame.kind, 1);
//! assert!(frame.remainder.is_empty());
//! ```
//!
//! Encryption, authentication, acknowledgements and retransmission are left
//! to the transport or the application.

pub mod config;
pub mod core;
pub mod error;
pub mod service;
pub mod transport;
pub mod utils;

pub use crate::core::codec::FrameCodec;
pub use crate::core::frame::{decode, encode, Decoded, Frame, WireVersion};
pub use crate::core::payload::{IntoPayload, Structured};
pub use crate::core::reassembler::StreamReassembler;
pub use crate::error::{ProtocolError, Result};
pub use crate::service::client::{Client, ClientEvent};
pub use crate::service::server::{Server, ServerEvent};
pub use crate::transport::ConnectionId;
