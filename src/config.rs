//! Process configuration, loaded from the environment at startup.

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Port for the web service.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Base log level for this crate's targets (see logging setup).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Where the chromedriver instance is listening.
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Chromium binary the driver should launch.
    #[serde(default = "default_chrome_bin")]
    pub chrome_bin: String,

    /// Root of the college portal.
    #[serde(default = "default_portal_base_url")]
    pub portal_base_url: String,

    /// Maximum concurrently live browser sessions.
    #[serde(default = "default_pool_capacity")]
    pub pool_capacity: usize,

    /// How long a request may wait for a session before failing as busy.
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,

    /// TTL for cached attendance results.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Year assumed for portal dates rendered without one. The portal drops
    /// the year inside a semester, so this needs a bump at year boundaries.
    #[serde(default = "default_reference_year")]
    pub reference_year: i32,

    /// Upstash Redis REST endpoint; in-process caching when unset.
    #[serde(default)]
    pub upstash_redis_rest_url: Option<String>,
    #[serde(default)]
    pub upstash_redis_rest_token: Option<String>,

    /// Grace period for services to drain on shutdown.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,
}

impl Config {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }

    /// Remote cache settings, present only when both halves are configured.
    pub fn remote_cache(&self) -> Option<(String, String)> {
        match (&self.upstash_redis_rest_url, &self.upstash_redis_rest_token) {
            (Some(url), Some(token)) if !url.is_empty() && !token.is_empty() => {
                Some((url.clone(), token.clone()))
            }
            _ => None,
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_webdriver_url() -> String {
    "http://localhost:9515".to_owned()
}

fn default_chrome_bin() -> String {
    "/usr/bin/chromium".to_owned()
}

fn default_portal_base_url() -> String {
    "https://samvidha.iare.ac.in/".to_owned()
}

fn default_pool_capacity() -> usize {
    4
}

fn default_acquire_timeout_secs() -> u64 {
    30
}

fn default_cache_ttl_secs() -> u64 {
    1800
}

fn default_reference_year() -> i32 {
    2025
}

fn default_shutdown_timeout() -> u64 {
    10
}
