//! Pluggable cache storage (`§4.2` "Store model").

use crate::entry::CacheEntry;
use crate::error::CacheError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Storage interface every cache backend implements. `scan_prefix` backs
/// pattern-based invalidation; backends that can't scan efficiently
/// should still implement it correctly, just not cheaply.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>, CacheError>;
    async fn set(&self, key: &str, entry: CacheEntry) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;
    async fn clear(&self) -> Result<(), CacheError>;
    /// Keys whose prefix matches `prefix`, for hierarchical-key pattern
    /// invalidation.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheError>;
    /// Drop every entry expired as of `now`. Backends that expire entries
    /// autonomously (a real remote KV store's `SETEX`) can no-op this.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize, CacheError>;
}

/// In-process LRU-with-TTL backend. `max_size` bounds the number of
/// entries; the oldest-touched entry is evicted once a `set` would exceed
/// it. O(1) get/set via the map, O(k) prefix scan over its keys.
pub struct InProcessBackend {
    entries: DashMap<String, CacheEntry>,
    recency: Mutex<VecDeque<String>>,
    max_size: usize,
}

impl InProcessBackend {
    pub fn new(max_size: usize) -> Arc<Self> {
        Arc::new(Self { entries: DashMap::new(), recency: Mutex::new(VecDeque::new()), max_size })
    }

    fn touch(&self, key: &str) {
        let mut recency = self.recency.lock();
        recency.retain(|k| k != key);
        recency.push_back(key.to_string());
    }

    fn evict_if_over_capacity(&self) {
        while self.entries.len() > self.max_size {
            let oldest = {
                let mut recency = self.recency.lock();
                recency.pop_front()
            };
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

#[async_trait]
impl CacheBackend for InProcessBackend {
    async fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>, CacheError> {
        let Some(entry) = self.entries.get(key) else { return Ok(None) };
        if entry.is_expired(now) {
            drop(entry);
            self.entries.remove(key);
            return Ok(None);
        }
        let value = entry.clone();
        drop(entry);
        self.touch(key);
        Ok(Some(value))
    }

    async fn set(&self, key: &str, entry: CacheEntry) -> Result<(), CacheError> {
        self.entries.insert(key.to_string(), entry);
        self.touch(key);
        self.evict_if_over_capacity();
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let removed = self.entries.remove(key).is_some();
        self.recency.lock().retain(|k| k != key);
        Ok(removed)
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.entries.clear();
        self.recency.lock().clear();
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        Ok(self.entries.iter().map(|e| e.key().clone()).filter(|k| k.starts_with(prefix)).collect())
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize, CacheError> {
        let expired: Vec<String> =
            self.entries.iter().filter(|e| e.value().is_expired(now)).map(|e| e.key().clone()).collect();
        let count = expired.len();
        for key in expired {
            self.entries.remove(&key);
            self.recency.lock().retain(|k| k != &key);
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn t(offset_secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::seconds(offset_secs)
    }

    #[tokio::test]
    async fn get_after_set_round_trips() {
        let backend = InProcessBackend::new(10);
        let entry = CacheEntry::new(json!({"a": 1}), t(0), chrono::Duration::seconds(60));
        backend.set("k1", entry).await.unwrap();
        let got = backend.get("k1", t(1)).await.unwrap();
        assert_eq!(got.unwrap().value, json!({"a": 1}));
    }

    #[tokio::test]
    async fn expired_entry_reads_as_miss() {
        let backend = InProcessBackend::new(10);
        let entry = CacheEntry::new(json!({"a": 1}), t(0), chrono::Duration::seconds(10));
        backend.set("k1", entry).await.unwrap();
        let got = backend.get("k1", t(20)).await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn eviction_drops_the_least_recently_touched() {
        let backend = InProcessBackend::new(2);
        let entry = || CacheEntry::new(json!(1), t(0), chrono::Duration::seconds(60));
        backend.set("a", entry()).await.unwrap();
        backend.set("b", entry()).await.unwrap();
        backend.get("a", t(1)).await.unwrap();
        backend.set("c", entry()).await.unwrap();
        assert!(backend.get("b", t(2)).await.unwrap().is_none(), "b was least recently touched");
        assert!(backend.get("a", t(2)).await.unwrap().is_some());
        assert!(backend.get("c", t(2)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn scan_prefix_matches_hierarchical_keys() {
        let backend = InProcessBackend::new(10);
        let entry = || CacheEntry::new(json!(1), t(0), chrono::Duration::seconds(60));
        backend.set("llm_gateway:openai:gpt-4o:chat:aaa", entry()).await.unwrap();
        backend.set("llm_gateway:gemini:flash:chat:bbb", entry()).await.unwrap();
        let matches = backend.scan_prefix("llm_gateway:openai:").await.unwrap();
        assert_eq!(matches.len(), 1);
    }
}
