//! # Curated Reference Data
//!
//! Local, read-only datasets served without calling upstream.

pub mod leagues;

pub use leagues::{LeagueCatalog, LeagueRecord};
