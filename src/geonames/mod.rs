//! # GeoNames Dataset
//!
//! Path configuration, the store seam the HTTP layer calls into, and the
//! SQLite store behind it.

pub mod config;
pub mod sqlite;
pub mod store;

pub use config::GeoNamesConfig;
pub use sqlite::{SqliteGeoStore, SqliteStoreFactory};
pub use store::{GeoStore, RawRecord, StoreError, StoreFactory, StoreResult};
