//! # HTTP Server
//!
//! Combines the endpoint routers and runs them until shutdown.

use std::future::Future;
use std::io;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use super::config::HttpServerConfig;
use super::errors::ApiError;
use super::health_routes::health_routes;
use super::location_routes::location_routes;
use super::search_routes::search_routes;
use super::state::{ConnectionManager, InitMode};
use super::stats_routes::stats_routes;

/// Errors that stop the server
#[derive(Debug, Error)]
pub enum ServerError {
    /// Eager store setup failed
    #[error("{0}")]
    Initialization(ApiError),

    /// The listener could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The accept loop failed
    #[error("HTTP server failed: {0}")]
    Serve(#[source] io::Error),
}

/// HTTP server for the GeoNames API
pub struct HttpServer {
    config: HttpServerConfig,
    init_mode: InitMode,
    manager: Arc<ConnectionManager>,
    router: Router,
}

impl HttpServer {
    /// Create a server around an existing connection manager
    pub fn new(
        config: HttpServerConfig,
        init_mode: InitMode,
        manager: Arc<ConnectionManager>,
    ) -> Self {
        let router = Self::build_router(&config, Arc::clone(&manager));
        Self {
            config,
            init_mode,
            manager,
            router,
        }
    }

    /// Build the combined router with all endpoints
    pub fn build_router(config: &HttpServerConfig, manager: Arc<ConnectionManager>) -> Router {
        let cors = if config.allows_any_origin() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<HeaderValue> = config
                .cors_origins
                .iter()
                .filter_map(|s| match s.parse() {
                    Ok(origin) => Some(origin),
                    Err(_) => {
                        warn!(origin = %s, "ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        let paths = Arc::new(manager.config().clone());

        Router::new()
            .merge(health_routes(paths))
            .merge(stats_routes(Arc::clone(&manager)))
            .nest("/search", search_routes(Arc::clone(&manager)))
            .nest("/location", location_routes(manager))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(cors),
            )
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until Ctrl-C
    pub async fn start(self) -> Result<(), ServerError> {
        self.start_with_shutdown(shutdown_signal()).await
    }

    /// Serve until `shutdown` resolves, then release the store handle.
    ///
    /// In eager mode the store is set up before the listener is bound, so no
    /// request ever waits on first-time setup.
    pub async fn start_with_shutdown<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.init_mode == InitMode::Eager {
            self.manager
                .acquire()
                .await
                .map_err(ServerError::Initialization)?;
            info!("database initialized successfully");
        }

        let addr = self.config.socket_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;

        info!(%addr, "starting geonames API server");
        info!("health check: http://{}/health", addr);

        let served = axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await;

        self.manager.release().await;
        served.map_err(ServerError::Serve)
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => error!(error = %e, "failed to listen for shutdown signal"),
    }
}
