//! # geosync-osm
//!
//! [`GeodataService`](geosync_core::GeodataService) implementation for the
//! OpenStreetMap API 0.6 (and compatible servers), over blocking HTTP with
//! Basic authentication.

pub mod client;
pub mod error;
pub mod xml;

pub use client::OsmClient;
pub use error::OsmError;
