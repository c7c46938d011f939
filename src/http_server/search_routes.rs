//! Search HTTP Routes
//!
//! Proximity, name and country searches over the store.

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::geonames::RawRecord;

use super::errors::{ApiError, ApiResult};
use super::state::ConnectionManager;
use super::transform::{raw_coordinates, transform_records, LocationRecord};

// ==================
// Request Types
// ==================

#[derive(Debug, Deserialize)]
pub struct CoordinateQuery {
    pub lat: f64,
    pub lon: f64,
    #[serde(default = "default_radius")]
    pub radius: f64,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub nearest_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct NameQuery {
    pub name: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

/// Largest `limit` any search accepts
pub const MAX_LIMIT: usize = 1000;

fn default_radius() -> f64 {
    10.0
}

fn default_limit() -> usize {
    100
}

impl CoordinateQuery {
    /// Reject points off the globe, negative radii and oversized limits
    pub fn validate(&self) -> ApiResult<()> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(ApiError::InvalidQuery(
                "lat must be a finite number between -90 and 90".to_string(),
            ));
        }
        if !self.lon.is_finite() || !(-180.0..=180.0).contains(&self.lon) {
            return Err(ApiError::InvalidQuery(
                "lon must be a finite number between -180 and 180".to_string(),
            ));
        }
        if !self.radius.is_finite() || self.radius < 0.0 {
            return Err(ApiError::InvalidQuery(
                "radius must be a finite, non-negative number".to_string(),
            ));
        }
        check_limit(self.limit)
    }
}

fn check_limit(limit: usize) -> ApiResult<()> {
    if limit > MAX_LIMIT {
        return Err(ApiError::InvalidQuery(format!(
            "limit must not exceed {MAX_LIMIT}"
        )));
    }
    Ok(())
}

/// Accepts the usual spellings of a boolean query flag
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "invalid boolean value '{other}'"
        ))),
    }
}

fn parse_query<T>(query: Result<Query<T>, QueryRejection>) -> ApiResult<T> {
    query
        .map(|Query(inner)| inner)
        .map_err(|rejection| ApiError::InvalidQuery(rejection.body_text()))
}

// ==================
// Search Routes
// ==================

/// Create search routes
pub fn search_routes(manager: Arc<ConnectionManager>) -> Router {
    Router::new()
        .route("/coordinates", get(search_coordinates_handler))
        .route("/name", get(search_name_handler))
        .route("/country/:country_code", get(search_country_handler))
        .with_state(manager)
}

/// Keep only the row closest to the query point.
///
/// Distance is `|dlat| + |dlon|` in degrees, not geodesic. The first row wins
/// ties, so store order decides between equidistant rows.
pub fn select_nearest(
    records: Vec<RawRecord>,
    latitude: f64,
    longitude: f64,
) -> ApiResult<Option<RawRecord>> {
    let mut best: Option<(f64, RawRecord)> = None;

    for record in records {
        let (lat, lon) = raw_coordinates(&record)?;
        let distance = (lat - latitude).abs() + (lon - longitude).abs();
        let closer = best.as_ref().map_or(true, |(d, _)| distance < *d);
        if closer {
            best = Some((distance, record));
        }
    }

    Ok(best.map(|(_, record)| record))
}

async fn search_coordinates_handler(
    State(manager): State<Arc<ConnectionManager>>,
    query: Result<Query<CoordinateQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<LocationRecord>>> {
    let query = parse_query(query)?;
    query.validate()?;
    let store = manager.acquire().await?;

    let results = store
        .search_by_coordinates(query.lat, query.lon, query.radius, query.limit)
        .await?;

    if results.is_empty() {
        return Err(ApiError::NotFound(format!(
            "No locations found within {:?}km of coordinates ({:?}, {:?})",
            query.radius, query.lat, query.lon
        )));
    }

    let results = if query.nearest_only {
        select_nearest(results, query.lat, query.lon)?
            .into_iter()
            .collect()
    } else {
        results
    };

    let locations = transform_records(&results)?;
    debug!(count = locations.len(), "transformed locations");
    Ok(Json(locations))
}

async fn search_name_handler(
    State(manager): State<Arc<ConnectionManager>>,
    query: Result<Query<NameQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<LocationRecord>>> {
    let query = parse_query(query)?;
    check_limit(query.limit)?;
    let store = manager.acquire().await?;

    let results = store.search_by_name(&query.name, query.limit).await?;
    if results.is_empty() {
        return Err(ApiError::NotFound(format!(
            "No locations found matching name {}",
            query.name
        )));
    }

    Ok(Json(transform_records(&results)?))
}

async fn search_country_handler(
    State(manager): State<Arc<ConnectionManager>>,
    Path(country_code): Path<String>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<LocationRecord>>> {
    let query = parse_query(query)?;
    check_limit(query.limit)?;
    let store = manager.acquire().await?;

    let results = store
        .search_by_country_code(&country_code.to_uppercase(), query.limit)
        .await?;
    if results.is_empty() {
        return Err(ApiError::NotFound(format!(
            "No locations found for country code {country_code}"
        )));
    }

    Ok(Json(transform_records(&results)?))
}
