//! Short-TTL result cache keyed by user identity.
//!
//! Backed by an Upstash Redis REST endpoint when configured; every remote
//! failure falls back to an in-process TTL map so a cache outage never turns
//! into a scrape failure. Last-write-wins, no transactional guarantees.

use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Clone)]
struct RemoteStore {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl RemoteStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, anyhow::Error> {
        let response = self
            .http
            .get(format!("{}/get/{key}", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?;
        let body: Value = response.json().await?;
        let Some(raw) = body.get("result").and_then(Value::as_str) else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(raw)?))
    }

    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), anyhow::Error> {
        self.http
            .post(format!("{}/set/{key}?EX={}", self.base_url, ttl.as_secs()))
            .bearer_auth(&self.token)
            .body(serde_json::to_string(value)?)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

struct LocalEntry {
    expires_at: Instant,
    value: Value,
}

/// `get`/`set` cache with TTL expiry. Cloning shares the underlying store.
#[derive(Clone)]
pub struct ResultCache {
    remote: Option<RemoteStore>,
    local: Arc<DashMap<String, LocalEntry>>,
}

impl ResultCache {
    /// `remote` is `(rest_url, token)` for an Upstash endpoint; `None` keeps
    /// everything in-process.
    pub fn new(remote: Option<(String, String)>, http: reqwest::Client) -> Self {
        Self {
            remote: remote.map(|(base_url, token)| RemoteStore {
                http,
                base_url: base_url.trim_end_matches('/').to_owned(),
                token,
            }),
            local: Arc::new(DashMap::new()),
        }
    }

    pub fn is_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        if let Some(remote) = &self.remote {
            match remote.get(key).await {
                Ok(value) => return value,
                Err(e) => warn!(key, error = %e, "remote cache get failed, using local"),
            }
        }

        let entry = self.local.get(key)?;
        if Instant::now() > entry.expires_at {
            drop(entry);
            self.local.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    pub async fn set(&self, key: &str, value: &Value, ttl: Duration) {
        if let Some(remote) = &self.remote {
            match remote.set(key, value, ttl).await {
                Ok(()) => {
                    debug!(key, ttl_secs = ttl.as_secs(), "cached to remote store");
                    return;
                }
                Err(e) => warn!(key, error = %e, "remote cache set failed, using local"),
            }
        }

        self.local.insert(
            key.to_owned(),
            LocalEntry {
                expires_at: Instant::now() + ttl,
                value: value.clone(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn local_cache() -> ResultCache {
        ResultCache::new(None, reqwest::Client::new())
    }

    #[tokio::test]
    async fn set_then_get_returns_value() {
        let cache = local_cache();
        let value = json!({"overall": {"present": 10}});
        cache.set("att:22891A0501", &value, Duration::from_secs(60)).await;
        assert_eq!(cache.get("att:22891A0501").await, Some(value));
    }

    #[tokio::test]
    async fn missing_key_is_none() {
        let cache = local_cache();
        assert_eq!(cache.get("att:nobody").await, None);
    }

    #[tokio::test]
    async fn expired_entry_is_gone() {
        let cache = local_cache();
        cache.set("att:x", &json!(1), Duration::ZERO).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(cache.get("att:x").await, None);
        // The lazy expiry also removed the entry.
        assert!(cache.local.get("att:x").is_none());
    }

    #[tokio::test]
    async fn overwrite_wins() {
        let cache = local_cache();
        cache.set("att:x", &json!(1), Duration::from_secs(60)).await;
        cache.set("att:x", &json!(2), Duration::from_secs(60)).await;
        assert_eq!(cache.get("att:x").await, Some(json!(2)));
    }
}
