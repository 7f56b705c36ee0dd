//! In-process cache client.
//!
//! The client is wired into the application state but carries no caching
//! policy of its own; callers decide what goes in and when it is invalidated.

use std::time::Duration;

use moka::future::Cache;

use crate::config::CacheConfig;

#[derive(Clone)]
pub struct CacheClient {
    inner: Cache<String, String>,
}

impl CacheClient {
    pub fn new(config: &CacheConfig) -> Self {
        let inner = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(Duration::from_secs(config.ttl_secs))
            .build();

        tracing::info!(
            max_capacity = config.max_capacity,
            ttl_secs = config.ttl_secs,
            "Cache client ready"
        );
        Self { inner }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).await
    }

    pub async fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.inner.insert(key.into(), value.into()).await;
    }

    pub async fn invalidate(&self, key: &str) {
        self.inner.invalidate(key).await;
    }

    /// Approximate number of live entries.
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    /// Apply pending maintenance so `entry_count` reflects recent writes.
    pub async fn sync(&self) {
        self.inner.run_pending_tasks().await;
    }
}
