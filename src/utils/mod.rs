//! # Utility Modules
//!
//! Supporting utilities shared by the connection managers.
//!
//! ## Components
//! - **Logging**: `tracing-subscriber` setup from `LoggingConfig`
//! - **Metrics**: thread-safe frame, byte and connection counters
//! - **Timeout**: async timeout wrappers

pub mod logging;
pub mod metrics;
pub mod timeout;

pub use metrics::{Metrics, MetricsSnapshot};
