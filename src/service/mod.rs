//! # Connection Managers
//!
//! - [`client::Client`]: one outbound connection, `ClientEvent` notifications
//! - [`server::Server`]: listener plus Connection Set, unicast and broadcast,
//!   `ServerEvent` notifications

pub mod client;
pub mod server;
