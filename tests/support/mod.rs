//! Shared fixtures: an in-memory store, a counting factory, and request
//! helpers for driving the router without a socket.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use geonames_api::geonames::{
    GeoNamesConfig, GeoStore, RawRecord, StoreError, StoreFactory, StoreResult,
};
use geonames_api::http_server::{ConnectionManager, HttpServer, HttpServerConfig};

// =============================================================================
// Fake store
// =============================================================================

#[derive(Default)]
pub struct FakeStore {
    pub rows: Vec<RawRecord>,
    pub fail_total: bool,
    pub fail_countries: bool,
    pub fail_dispose: bool,
    pub calls: Mutex<Vec<String>>,
    pub disposed: AtomicUsize,
}

impl FakeStore {
    pub fn with_rows(rows: Vec<RawRecord>) -> Self {
        Self {
            rows,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

fn text(row: &RawRecord, key: &str) -> String {
    row.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl GeoStore for FakeStore {
    async fn get_geolocation(
        &self,
        country_code: &str,
        postal_code: &str,
    ) -> StoreResult<Vec<RawRecord>> {
        self.record(format!("get_geolocation:{country_code}:{postal_code}"));
        Ok(self
            .rows
            .iter()
            .filter(|r| text(r, "country") == country_code && text(r, "postal_code") == postal_code)
            .cloned()
            .collect())
    }

    async fn search_by_coordinates(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
        limit: usize,
    ) -> StoreResult<Vec<RawRecord>> {
        self.record(format!(
            "search_by_coordinates:{latitude}:{longitude}:{radius_km}:{limit}"
        ));
        Ok(self.rows.iter().take(limit).cloned().collect())
    }

    async fn search_by_name(&self, name: &str, limit: usize) -> StoreResult<Vec<RawRecord>> {
        self.record(format!("search_by_name:{name}:{limit}"));
        let needle = name.to_lowercase();
        Ok(self
            .rows
            .iter()
            .filter(|r| text(r, "name").to_lowercase().contains(&needle))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn search_by_country_code(
        &self,
        country_code: &str,
        limit: usize,
    ) -> StoreResult<Vec<RawRecord>> {
        self.record(format!("search_by_country_code:{country_code}:{limit}"));
        Ok(self
            .rows
            .iter()
            .filter(|r| text(r, "country") == country_code)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_total_entries(&self) -> StoreResult<u64> {
        if self.fail_total {
            return Err(StoreError::Backend("total count exploded".to_string()));
        }
        Ok(self.rows.len() as u64)
    }

    async fn get_country_count(&self) -> StoreResult<u64> {
        if self.fail_countries {
            return Err(StoreError::Backend("country count exploded".to_string()));
        }
        let mut countries: Vec<String> = self.rows.iter().map(|r| text(r, "country")).collect();
        countries.sort();
        countries.dedup();
        Ok(countries.len() as u64)
    }

    async fn dispose(&self) -> StoreResult<()> {
        self.disposed.fetch_add(1, Ordering::SeqCst);
        if self.fail_dispose {
            return Err(StoreError::Backend("dispose exploded".to_string()));
        }
        Ok(())
    }
}

// =============================================================================
// Counting factory
// =============================================================================

pub struct FakeFactory {
    pub store: Arc<FakeStore>,
    pub setups: AtomicUsize,
    pub fail: AtomicBool,
    pub delay: Duration,
}

impl FakeFactory {
    pub fn new(store: FakeStore) -> Self {
        Self {
            store: Arc::new(store),
            setups: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            delay: Duration::ZERO,
        }
    }

    pub fn failing(store: FakeStore) -> Self {
        let factory = Self::new(store);
        factory.fail.store(true, Ordering::SeqCst);
        factory
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn setups(&self) -> usize {
        self.setups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreFactory for FakeFactory {
    async fn setup_database(&self, _config: &GeoNamesConfig) -> StoreResult<Arc<dyn GeoStore>> {
        self.setups.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("disk on fire at /secret/path".to_string()));
        }
        let store: Arc<dyn GeoStore> = self.store.clone();
        Ok(store)
    }
}

// =============================================================================
// Builders and request helpers
// =============================================================================

pub fn row(value: Value) -> RawRecord {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

pub fn manager(paths: GeoNamesConfig, factory: Arc<FakeFactory>) -> Arc<ConnectionManager> {
    Arc::new(ConnectionManager::new(paths, factory))
}

pub fn router(manager: Arc<ConnectionManager>) -> Router {
    HttpServer::build_router(&HttpServerConfig::default(), manager)
}

pub async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request");
    let response = router.clone().oneshot(request).await.expect("response");

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    (status, body)
}
