//! # Gateway
//!
//! HTTP server, upstream forwarding and diagnostic endpoints.

pub mod diagnostics;
pub mod forwarder;
pub mod server;

pub use diagnostics::Diagnostics;
pub use forwarder::ForwardingEngine;
pub use server::{build_app, AppState, GatewayServer};
