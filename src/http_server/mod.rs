//! # GeoNames HTTP Server Module
//!
//! Axum server exposing the dataset over JSON.
//!
//! # Endpoints
//!
//! - `/health` - Data directory and database file checks
//! - `/stats` - Row and country counts
//! - `/search/*` - Coordinate, name and country searches
//! - `/location/{country_code}/{postal_code}` - Exact postal-code lookup

pub mod config;
pub mod errors;
pub mod health_routes;
pub mod location_routes;
pub mod search_routes;
pub mod server;
pub mod state;
pub mod stats_routes;
pub mod transform;

pub use config::HttpServerConfig;
pub use errors::{ApiError, ApiResult, ErrorBody};
pub use server::{HttpServer, ServerError};
pub use state::{ConnectionManager, InitMode};
pub use stats_routes::DatabaseStats;
pub use transform::LocationRecord;
