//! Location HTTP Routes
//!
//! Exact lookup by country code and postal code.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tracing::debug;

use super::errors::{ApiError, ApiResult};
use super::state::ConnectionManager;
use super::transform::{transform_records, LocationRecord};

/// Create location routes
pub fn location_routes(manager: Arc<ConnectionManager>) -> Router {
    Router::new()
        .route("/:country_code/:postal_code", get(get_location_handler))
        .with_state(manager)
}

/// One postal code can map to several rows, e.g. subdivisions sharing it
async fn get_location_handler(
    State(manager): State<Arc<ConnectionManager>>,
    Path((country_code, postal_code)): Path<(String, String)>,
) -> ApiResult<Json<Vec<LocationRecord>>> {
    let store = manager.acquire().await?;

    let results = store
        .get_geolocation(&country_code.to_uppercase(), &postal_code)
        .await?;
    debug!(rows = results.len(), %country_code, %postal_code, "geolocation lookup");

    if results.is_empty() {
        return Err(ApiError::NotFound(format!(
            "Location not found for country code {country_code} and postal code {postal_code}"
        )));
    }

    Ok(Json(transform_records(&results)?))
}
