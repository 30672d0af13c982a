use std::time::Duration;

use serde::Deserialize;

use crate::{
    api::{DEFAULT_RECOMMENDATION_LIMIT, DEFAULT_SIMILAR_LIMIT},
    query::QueryConfig,
};

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Base URL of the recommendation backend
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Seconds a cached query result counts as fresh
    #[serde(default = "default_stale_time_secs")]
    pub stale_time_secs: u64,

    /// Seconds an unobserved cache entry is retained before collection
    #[serde(default = "default_gc_time_secs")]
    pub gc_time_secs: u64,

    /// Seconds between garbage-collection sweeps
    #[serde(default = "default_gc_interval_secs")]
    pub gc_interval_secs: u64,

    /// Search input debounce in milliseconds
    #[serde(default = "default_search_debounce_ms")]
    pub search_debounce_ms: u64,

    /// Placeholder signed-in user
    #[serde(default = "default_user_id")]
    pub user_id: u64,

    #[serde(default = "default_recommendation_limit")]
    pub recommendation_limit: u32,

    #[serde(default = "default_similar_limit")]
    pub similar_limit: u32,

    /// Per-request timeout; unset leaves the transport default
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_api_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_stale_time_secs() -> u64 {
    300
}

fn default_gc_time_secs() -> u64 {
    300
}

fn default_gc_interval_secs() -> u64 {
    60
}

fn default_search_debounce_ms() -> u64 {
    500
}

fn default_user_id() -> u64 {
    1
}

fn default_recommendation_limit() -> u32 {
    DEFAULT_RECOMMENDATION_LIMIT
}

fn default_similar_limit() -> u32 {
    DEFAULT_SIMILAR_LIMIT
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            stale_time_secs: default_stale_time_secs(),
            gc_time_secs: default_gc_time_secs(),
            gc_interval_secs: default_gc_interval_secs(),
            search_debounce_ms: default_search_debounce_ms(),
            user_id: default_user_id(),
            recommendation_limit: default_recommendation_limit(),
            similar_limit: default_similar_limit(),
            request_timeout_secs: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = envy::from_env::<Config>()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
        config.api_base_url = config.api_base_url.trim_end_matches('/').to_string();
        Ok(config)
    }

    pub fn query_config(&self) -> QueryConfig {
        QueryConfig {
            stale_time: Duration::from_secs(self.stale_time_secs),
            gc_time: Duration::from_secs(self.gc_time_secs),
        }
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn gc_interval(&self) -> Duration {
        Duration::from_secs(self.gc_interval_secs.max(1))
    }
}
