//! geonames-api - REST access to a GeoNames postal-code database
//!
//! Coordinate search, postal-code lookup and dataset statistics over a
//! SQLite-backed store.

pub mod cli;
pub mod config;
pub mod geonames;
pub mod http_server;
pub mod observability;
