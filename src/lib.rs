//! # API-Sports Gateway Library
//!
//! An authenticating reverse proxy in front of the API-Football REST API. The
//! gateway holds the upstream credential so clients never see it, checks a
//! shared secret on every gated request, serves curated league lists from
//! disk, and exposes diagnostics for IP allow-listing and credential checks.
//!
//! ## Modules
//! - `core`: configuration, error taxonomy and request/response types
//! - `auth`: the access guard middleware
//! - `gateway`: server, forwarding engine and diagnostic endpoints
//! - `reference`: curated league data
//! - `observability`: logging setup

/// Core functionality including error types, configuration, and basic data structures
pub mod core;

/// Shared-secret access control
pub mod auth;

/// Main gateway server implementation and HTTP handling
pub mod gateway;

/// Curated reference datasets served locally
pub mod reference;

/// Structured logging
pub mod observability;

pub use core::config::GatewayConfig;
pub use core::error::{GatewayError, GatewayResult};
pub use gateway::server::{build_app, AppState, GatewayServer};
