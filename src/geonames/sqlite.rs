//! SQLite-backed GeoNames store
//!
//! `rusqlite` is blocking, so every query runs on the tokio blocking pool.
//! The connection sits behind a mutex and is taken out on dispose.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, Params};
use serde_json::{Number, Value};
use tokio::task;
use tracing::{debug, info};

use super::config::GeoNamesConfig;
use super::store::{GeoStore, RawRecord, StoreError, StoreFactory, StoreResult};

/// Mean Earth radius used for great-circle distances
const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Kilometres per degree of latitude
const KM_PER_DEGREE: f64 = 111.32;

/// Candidates fetched per requested row before haversine re-ranking
const CANDIDATE_FACTOR: usize = 4;

/// Floor on the candidate fetch so small limits still re-rank well
const MIN_CANDIDATES: usize = 64;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS geonames (
    country         TEXT NOT NULL,
    postal_code     TEXT,
    name            TEXT NOT NULL,
    state           TEXT,
    state_code      TEXT,
    province        TEXT,
    province_code   TEXT,
    community       TEXT,
    community_code  TEXT,
    latitude        REAL NOT NULL,
    longitude       REAL NOT NULL,
    accuracy        INTEGER
);
CREATE INDEX IF NOT EXISTS idx_geonames_country_postal ON geonames (country, postal_code);
CREATE INDEX IF NOT EXISTS idx_geonames_lat_lon ON geonames (latitude, longitude);
CREATE INDEX IF NOT EXISTS idx_geonames_name ON geonames (name);
";

const COLUMNS: &str = "name, postal_code, country, state, state_code, province, \
                       province_code, community, community_code, latitude, longitude, accuracy";

/// Opens [`SqliteGeoStore`] handles
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteStoreFactory;

impl SqliteStoreFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StoreFactory for SqliteStoreFactory {
    async fn setup_database(&self, config: &GeoNamesConfig) -> StoreResult<Arc<dyn GeoStore>> {
        let store = SqliteGeoStore::open(config.clone()).await?;
        Ok(Arc::new(store))
    }
}

/// GeoNames store over a single SQLite connection
pub struct SqliteGeoStore {
    path: PathBuf,
    conn: Arc<Mutex<Option<Connection>>>,
}

impl std::fmt::Debug for SqliteGeoStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteGeoStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteGeoStore {
    /// Create the data directory and schema if needed, then open the database.
    pub async fn open(config: GeoNamesConfig) -> StoreResult<Self> {
        task::spawn_blocking(move || Self::open_blocking(&config))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    fn open_blocking(config: &GeoNamesConfig) -> StoreResult<Self> {
        fs::create_dir_all(&config.save_dir).map_err(|source| StoreError::CreateDir {
            path: config.save_dir.clone(),
            source,
        })?;

        let path = config.database_filepath.clone();
        let conn = Connection::open(&path).map_err(|source| StoreError::OpenDatabase {
            path: path.clone(),
            source,
        })?;
        conn.execute_batch(SCHEMA)?;

        info!(path = %path.display(), "opened geonames database");

        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(Some(conn))),
        })
    }

    /// Database file backing this store
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn with_connection<T, F>(&self, op: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| StoreError::Poisoned)?;
            let conn = guard.as_ref().ok_or(StoreError::Closed)?;
            op(conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

#[async_trait]
impl GeoStore for SqliteGeoStore {
    async fn get_geolocation(
        &self,
        country_code: &str,
        postal_code: &str,
    ) -> StoreResult<Vec<RawRecord>> {
        let country_code = country_code.to_string();
        let postal_code = postal_code.to_string();
        self.with_connection(move |conn| {
            let sql = format!(
                "SELECT {COLUMNS} FROM geonames \
                 WHERE country = ?1 AND postal_code = ?2 ORDER BY rowid"
            );
            query_records(conn, &sql, params![country_code, postal_code])
        })
        .await
    }

    async fn search_by_coordinates(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
        limit: usize,
    ) -> StoreResult<Vec<RawRecord>> {
        self.with_connection(move |conn| {
            let bounds = BoundingBox::around(latitude, longitude, radius_km);
            // Capped fetch, pre-ranked by an equirectangular estimate
            let lon_scale = latitude.to_radians().cos().max(0.01);
            let sql = format!(
                "SELECT {COLUMNS} FROM geonames \
                 WHERE latitude BETWEEN ?1 AND ?2 AND longitude BETWEEN ?3 AND ?4 \
                 ORDER BY (latitude - ?5) * (latitude - ?5) \
                        + ((longitude - ?6) * ?7) * ((longitude - ?6) * ?7) \
                 LIMIT ?8"
            );
            let candidates = query_records(
                conn,
                &sql,
                params![
                    bounds.min_lat,
                    bounds.max_lat,
                    bounds.min_lon,
                    bounds.max_lon,
                    latitude,
                    longitude,
                    lon_scale,
                    sql_limit(candidate_limit(limit)),
                ],
            )?;
            debug!(candidates = candidates.len(), "bounding box candidates");

            let mut ranked: Vec<(f64, RawRecord)> = candidates
                .into_iter()
                .filter_map(|record| {
                    let lat = record.get("latitude").and_then(Value::as_f64)?;
                    let lon = record.get("longitude").and_then(Value::as_f64)?;
                    let distance = haversine_km(latitude, longitude, lat, lon);
                    (distance <= radius_km).then_some((distance, record))
                })
                .collect();
            ranked.sort_by(|a, b| a.0.total_cmp(&b.0));
            ranked.truncate(limit);

            Ok(ranked.into_iter().map(|(_, record)| record).collect())
        })
        .await
    }

    async fn search_by_name(&self, name: &str, limit: usize) -> StoreResult<Vec<RawRecord>> {
        let pattern = format!("%{}%", escape_like(name));
        self.with_connection(move |conn| {
            let sql = format!(
                "SELECT {COLUMNS} FROM geonames \
                 WHERE name LIKE ?1 ESCAPE '\\' ORDER BY name, postal_code LIMIT ?2"
            );
            query_records(conn, &sql, params![pattern, sql_limit(limit)])
        })
        .await
    }

    async fn search_by_country_code(
        &self,
        country_code: &str,
        limit: usize,
    ) -> StoreResult<Vec<RawRecord>> {
        let country_code = country_code.to_string();
        self.with_connection(move |conn| {
            let sql = format!(
                "SELECT {COLUMNS} FROM geonames \
                 WHERE country = ?1 ORDER BY postal_code, name LIMIT ?2"
            );
            query_records(conn, &sql, params![country_code, sql_limit(limit)])
        })
        .await
    }

    async fn get_total_entries(&self) -> StoreResult<u64> {
        self.with_connection(|conn| count(conn, "SELECT COUNT(*) FROM geonames"))
            .await
    }

    async fn get_country_count(&self) -> StoreResult<u64> {
        self.with_connection(|conn| count(conn, "SELECT COUNT(DISTINCT country) FROM geonames"))
            .await
    }

    async fn dispose(&self) -> StoreResult<()> {
        let conn = Arc::clone(&self.conn);
        task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| StoreError::Poisoned)?;
            match guard.take() {
                Some(conn) => conn.close().map_err(|(_, e)| StoreError::Database(e)),
                None => Ok(()),
            }
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

// ==================
// Query helpers
// ==================

fn query_records<P: Params>(conn: &Connection, sql: &str, params: P) -> StoreResult<Vec<RawRecord>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut rows = stmt.query(params)?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = RawRecord::new();
        for (idx, column) in columns.iter().enumerate() {
            record.insert(column.clone(), json_value(row.get_ref(idx)?));
        }
        records.push(record);
    }

    Ok(records)
}

fn count(conn: &Connection, sql: &str) -> StoreResult<u64> {
    let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(u64::try_from(n).unwrap_or(0))
}

fn json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null | ValueRef::Blob(_) => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
    }
}

fn candidate_limit(limit: usize) -> usize {
    limit.saturating_mul(CANDIDATE_FACTOR).max(MIN_CANDIDATES)
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

// ==================
// Geometry
// ==================

/// Degree-space rectangle used to prefilter proximity queries
#[derive(Debug, Clone, Copy, PartialEq)]
struct BoundingBox {
    min_lat: f64,
    max_lat: f64,
    min_lon: f64,
    max_lon: f64,
}

impl BoundingBox {
    fn around(latitude: f64, longitude: f64, radius_km: f64) -> Self {
        let lat_delta = radius_km / KM_PER_DEGREE;
        let cos_lat = latitude.to_radians().cos();

        // Near the poles or across the antimeridian the longitude window
        // degenerates; fall back to the full range and let haversine filter.
        let (min_lon, max_lon) = if cos_lat <= f64::EPSILON {
            (-180.0, 180.0)
        } else {
            let lon_delta = radius_km / (KM_PER_DEGREE * cos_lat);
            if lon_delta >= 180.0 || longitude - lon_delta < -180.0 || longitude + lon_delta > 180.0
            {
                (-180.0, 180.0)
            } else {
                (longitude - lon_delta, longitude + lon_delta)
            }
        };

        Self {
            min_lat: (latitude - lat_delta).max(-90.0),
            max_lat: (latitude + lat_delta).min(90.0),
            min_lon,
            max_lon,
        }
    }
}

/// Great-circle distance in kilometres
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}
