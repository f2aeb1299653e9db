//! # Observability
//!
//! Logging setup. Request spans come from `tower_http::trace::TraceLayer` on the
//! router and from `#[instrument]` on the forwarding engine.

pub mod logging;

pub use logging::{init_logging, LogFormat};
