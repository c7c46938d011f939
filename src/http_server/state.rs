//! Connection lifecycle
//!
//! One store handle per process. It is created at most once, either at
//! startup or by the first request, shared by every handler, and disposed
//! on shutdown.

use std::sync::atomic::{fence, AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{error, info};

use crate::geonames::{GeoNamesConfig, GeoStore, StoreFactory};

use super::errors::{ApiError, ApiResult};

/// When the store handle is created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitMode {
    /// Before the listener is bound; startup fails if setup fails
    #[default]
    Eager,
    /// On the first request that needs the store
    Lazy,
}

/// Owns the process-wide store handle
pub struct ConnectionManager {
    config: GeoNamesConfig,
    factory: Arc<dyn StoreFactory>,
    handle: OnceCell<Arc<dyn GeoStore>>,
    released: AtomicBool,
    disposed: AtomicBool,
}

impl ConnectionManager {
    pub fn new(config: GeoNamesConfig, factory: Arc<dyn StoreFactory>) -> Self {
        Self {
            config,
            factory,
            handle: OnceCell::new(),
            released: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        }
    }

    /// Paths the store is set up with
    pub fn config(&self) -> &GeoNamesConfig {
        &self.config
    }

    /// Whether a handle has been created
    pub fn is_initialized(&self) -> bool {
        self.handle.initialized()
    }

    /// Return the store handle, creating it on first use.
    ///
    /// Concurrent first callers wait on a single setup. A failed setup leaves
    /// the cell empty. Fails once [`release`](Self::release) has run, and a
    /// setup that finishes after release is disposed instead of handed out.
    pub async fn acquire(&self) -> ApiResult<Arc<dyn GeoStore>> {
        if self.released.load(Ordering::Acquire) {
            return Err(released_error());
        }

        let handle = self
            .handle
            .get_or_try_init(|| async {
                info!(
                    path = %self.config.database_filepath.display(),
                    "setting up geonames database"
                );
                self.factory.setup_database(&self.config).await
            })
            .await
            .map_err(|e| {
                error!(error = %e, "failed to set up database");
                ApiError::Initialization(e.to_string())
            })?;

        // Pairs with the fence in release: one side sees the other
        fence(Ordering::SeqCst);
        if self.released.load(Ordering::SeqCst) {
            self.dispose_once(handle).await;
            return Err(released_error());
        }

        Ok(Arc::clone(handle))
    }

    /// Dispose the handle if one was created.
    ///
    /// Disposal errors are logged and swallowed so shutdown always completes.
    pub async fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        fence(Ordering::SeqCst);

        if let Some(handle) = self.handle.get() {
            self.dispose_once(handle).await;
        }
    }

    async fn dispose_once(&self, handle: &Arc<dyn GeoStore>) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        match handle.dispose().await {
            Ok(()) => info!("database connection closed"),
            Err(e) => error!(error = %e, "error closing database connection"),
        }
    }
}

fn released_error() -> ApiError {
    ApiError::Initialization("database connection has been released".to_string())
}
