//! Store seam
//!
//! The HTTP layer talks to the dataset only through these traits. Results
//! come back as loose mappings; shaping them is the caller's job.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use super::config::GeoNamesConfig;

/// One result row, keyed by column name
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by a store backend
#[derive(Debug, Error)]
pub enum StoreError {
    /// The data directory could not be created.
    #[error("failed to create data directory {path}: {source}")]
    CreateDir {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// Opening the SQLite database failed.
    #[error("failed to open SQLite database at {path}: {source}")]
    OpenDatabase {
        /// Location of the database file.
        path: PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },

    /// The handle was disposed.
    #[error("store connection is closed")]
    Closed,

    /// A previous query panicked while holding the connection.
    #[error("store connection lock poisoned")]
    Poisoned,

    /// The blocking worker running a query did not complete.
    #[error("store task failed: {0}")]
    Task(String),

    /// Generic SQLite error.
    #[error(transparent)]
    Database(#[from] rusqlite::Error),

    /// Failure reported by a non-SQLite backend.
    #[error("{0}")]
    Backend(String),
}

/// Query primitives over an open dataset
#[async_trait]
pub trait GeoStore: Send + Sync {
    /// Exact lookup by country code and postal code
    async fn get_geolocation(
        &self,
        country_code: &str,
        postal_code: &str,
    ) -> StoreResult<Vec<RawRecord>>;

    /// Rows within `radius_km` of a point, nearest first
    async fn search_by_coordinates(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
        limit: usize,
    ) -> StoreResult<Vec<RawRecord>>;

    /// Case-insensitive substring match on the place name
    async fn search_by_name(&self, name: &str, limit: usize) -> StoreResult<Vec<RawRecord>>;

    /// Rows for one country
    async fn search_by_country_code(
        &self,
        country_code: &str,
        limit: usize,
    ) -> StoreResult<Vec<RawRecord>>;

    /// Total row count
    async fn get_total_entries(&self) -> StoreResult<u64>;

    /// Number of distinct country codes
    async fn get_country_count(&self) -> StoreResult<u64>;

    /// Release the underlying connection. Later queries fail with
    /// [`StoreError::Closed`].
    async fn dispose(&self) -> StoreResult<()>;
}

/// Opens a store for a resolved configuration
#[async_trait]
pub trait StoreFactory: Send + Sync {
    /// Prepare the dataset on disk and return an open handle.
    ///
    /// May touch the filesystem and take a long time on first run.
    async fn setup_database(&self, config: &GeoNamesConfig) -> StoreResult<Arc<dyn GeoStore>>;
}
