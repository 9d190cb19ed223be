//! # Core Protocol Components
//!
//! Framing, payload handling and stream reassembly. Nothing here performs I/O.
//!
//! ## Components
//! - **Frame**: pure encode/decode of one wire frame, per `WireVersion`
//! - **Payload**: raw-bytes fast path and structured-value fallback path
//! - **Serialization**: fallback formats (JSON, Bincode, MessagePack)
//! - **Guard**: overflow bound on unconsumed bytes (`4 × MAX`)
//! - **Reassembler**: per-connection buffer turning chunks into frames
//! - **Codec**: `tokio_util` `Decoder`/`Encoder` over the same format
//!
//! ## Wire Format
//! ```text
//! [Type(1)] [Length(2, big-endian)] [Payload(Length)]
//! ```

pub mod codec;
pub mod frame;
pub mod guard;
pub mod payload;
pub mod reassembler;
pub mod serialization;
