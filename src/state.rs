//! Application state shared across components (web handlers, services).

use crate::cache::ResultCache;
use crate::portal::PortalClient;
use crate::web::session::SessionStore;
use crate::webdriver::ChromePool;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Health status of a service.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Starting,
    Active,
    Disabled,
    Error,
}

/// A timestamped status entry for a service.
#[derive(Debug, Clone)]
pub struct StatusEntry {
    pub status: ServiceStatus,
    #[allow(dead_code)]
    pub updated_at: Instant,
}

/// Thread-safe registry for services to self-report their health status.
#[derive(Debug, Clone, Default)]
pub struct ServiceStatusRegistry {
    inner: Arc<DashMap<String, StatusEntry>>,
}

impl ServiceStatusRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or updates the status for a named service.
    pub fn set(&self, name: &str, status: ServiceStatus) {
        self.inner.insert(
            name.to_owned(),
            StatusEntry {
                status,
                updated_at: Instant::now(),
            },
        );
    }

    /// Returns a snapshot of all service statuses.
    pub fn all(&self) -> Vec<(String, ServiceStatus)> {
        self.inner
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().status.clone()))
            .collect()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub portal: Arc<PortalClient>,
    pub session_pool: Arc<ChromePool>,
    pub result_cache: ResultCache,
    pub sessions: SessionStore,
    pub service_statuses: ServiceStatusRegistry,
    pub cache_ttl: Duration,
}

impl AppState {
    pub fn new(
        portal: Arc<PortalClient>,
        session_pool: Arc<ChromePool>,
        result_cache: ResultCache,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            portal,
            session_pool,
            result_cache,
            sessions: SessionStore::new(),
            service_statuses: ServiceStatusRegistry::new(),
            cache_ttl,
        }
    }
}
