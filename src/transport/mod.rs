//! # Transport Layer
//!
//! TCP plumbing shared by the client and server managers: the per-connection
//! writer and the read loop that drives the stream reassembler.

pub mod connection;

pub use connection::{Connection, ConnectionId};
