//! Statistics HTTP Routes

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use super::errors::ApiResult;
use super::state::ConnectionManager;

/// Dataset counts, computed per request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseStats {
    /// Total number of rows
    pub total_entries: u64,
    /// Number of distinct country codes
    pub country_count: u64,
}

/// Create stats routes
pub fn stats_routes(manager: Arc<ConnectionManager>) -> Router {
    Router::new()
        .route("/stats", get(get_stats_handler))
        .with_state(manager)
}

async fn get_stats_handler(
    State(manager): State<Arc<ConnectionManager>>,
) -> ApiResult<Json<DatabaseStats>> {
    let store = manager.acquire().await?;

    // Both counts or neither; the first failure is reported.
    let (total_entries, country_count) =
        tokio::try_join!(store.get_total_entries(), store.get_country_count())?;

    Ok(Json(DatabaseStats {
        total_entries,
        country_count,
    }))
}
