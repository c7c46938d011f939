//! Health HTTP Routes
//!
//! Reports on the database file from configuration alone. The store handle
//! is never touched, so the probe answers even before setup has run.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use tokio::{fs, task};

use crate::geonames::GeoNamesConfig;

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database_directory: String,
    pub database_exists: bool,
    pub database_size: u64,
    pub database_writable: bool,
}

/// Create health routes
pub fn health_routes(config: Arc<GeoNamesConfig>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(config)
}

/// Health check handler
async fn health_handler(State(config): State<Arc<GeoNamesConfig>>) -> impl IntoResponse {
    let (database_exists, database_size) = match fs::metadata(&config.database_filepath).await {
        Ok(meta) if meta.is_file() => (true, meta.len()),
        _ => (false, 0),
    };

    let probe_config = Arc::clone(&config);
    let database_writable = task::spawn_blocking(move || probe_config.is_writable())
        .await
        .unwrap_or(false);

    let response = HealthResponse {
        status: "healthy".to_string(),
        database_directory: config.save_dir.display().to_string(),
        database_exists,
        database_size,
        database_writable,
    };

    (StatusCode::OK, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "healthy".to_string(),
            database_directory: "/srv/geonames_data".to_string(),
            database_exists: false,
            database_size: 0,
            database_writable: true,
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["database_exists"], false);
        assert_eq!(json["database_size"], 0);
    }
}
