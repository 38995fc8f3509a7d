//! Remote KV-shaped backend (`§4.2` "Store model", option b).
//!
//! `SETEX`-style writes under a global key prefix, pattern deletion via a
//! key scan. Requires the `remote-cache` feature (a `fred` client), kept
//! behind a feature flag the same way the rest of this workspace gates an
//! optional networked dependency.

#![cfg(feature = "remote-cache")]

use crate::backend::CacheBackend;
use crate::entry::CacheEntry;
use crate::error::CacheError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fred::prelude::*;

/// A remote-KV-backed cache. `prefix` is prepended to every key so
/// multiple gateway deployments can share one store without collision.
pub struct RemoteBackend {
    client: fred::clients::Client,
    prefix: String,
}

impl RemoteBackend {
    pub async fn connect(url: &str, prefix: impl Into<String>) -> Result<Self, CacheError> {
        let config = Config::from_url(url).map_err(|e| CacheError::BackendUnavailable(e.to_string()))?;
        let client = Builder::from_config(config)
            .build()
            .map_err(|e| CacheError::BackendUnavailable(e.to_string()))?;
        client.init().await.map_err(|e| CacheError::BackendUnavailable(e.to_string()))?;
        Ok(Self { client, prefix: prefix.into() })
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }
}

#[async_trait]
impl CacheBackend for RemoteBackend {
    async fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>, CacheError> {
        let raw: Option<String> = self
            .client
            .get(self.namespaced(key))
            .await
            .map_err(|e| CacheError::BackendUnavailable(e.to_string()))?;
        let Some(raw) = raw else { return Ok(None) };
        let entry: CacheEntry = serde_json::from_str(&raw)?;
        if entry.is_expired(now) {
            return Ok(None);
        }
        Ok(Some(entry))
    }

    async fn set(&self, key: &str, entry: CacheEntry) -> Result<(), CacheError> {
        let ttl_secs = (entry.expires_at - entry.inserted_at).num_seconds().max(1) as i64;
        let raw = serde_json::to_string(&entry)?;
        self.client
            .set::<(), _, _>(self.namespaced(key), raw, Some(Expiration::EX(ttl_secs)), None, false)
            .await
            .map_err(|e| CacheError::BackendUnavailable(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let removed: i64 = self
            .client
            .del(self.namespaced(key))
            .await
            .map_err(|e| CacheError::BackendUnavailable(e.to_string()))?;
        Ok(removed > 0)
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let keys = self.scan_prefix("").await?;
        for key in keys {
            self.client
                .del::<i64, _>(self.namespaced(&key))
                .await
                .map_err(|e| CacheError::BackendUnavailable(e.to_string()))?;
        }
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        use futures::TryStreamExt;
        let pattern = format!("{}:{}*", self.prefix, prefix);
        let mut stream = self.client.scan(pattern, Some(200), None);
        let mut keys = Vec::new();
        while let Some(page) = stream.try_next().await.map_err(|e| CacheError::BackendUnavailable(e.to_string()))? {
            for key in page.results().iter().flatten() {
                if let Some(k) = key.as_str() {
                    if let Some(stripped) = k.strip_prefix(&format!("{}:", self.prefix)) {
                        keys.push(stripped.to_string());
                    }
                }
            }
        }
        Ok(keys)
    }

    async fn sweep_expired(&self, _now: DateTime<Utc>) -> Result<usize, CacheError> {
        // The remote store expires entries autonomously via SETEX.
        Ok(0)
    }
}
