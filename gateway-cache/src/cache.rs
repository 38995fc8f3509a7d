//! `RequestCache` — the public cache contract (`§4.2`).

use crate::backend::CacheBackend;
use crate::entry::{CacheEntry, RequestMeta};
use crate::error::CacheError;
use crate::fingerprint::{self, CacheKeyComponents, CacheKeyStrategy, NormalizedRequest, RequestType};
use crate::invalidation::InvalidateCriteria;
use crate::stats::{CacheStats, StatsSnapshot};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Tunables for key generation and default TTL, read from `cache.*`
/// config (`§6`).
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub strategy: CacheKeyStrategy,
    pub components: CacheKeyComponents,
    pub key_hex_len: usize,
    pub default_ttl_seconds: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            strategy: CacheKeyStrategy::Default,
            components: CacheKeyComponents::all(),
            key_hex_len: 32,
            default_ttl_seconds: 300,
        }
    }
}

/// Whether a response sampled the health-check round trip as healthy.
#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub detail: String,
}

/// Fingerprint-keyed, TTL-bounded cache in front of a pluggable
/// [`CacheBackend`]. Backend errors never propagate to callers: a `get`
/// failure degrades to a miss, a `set` failure is logged and swallowed.
pub struct RequestCache {
    backend: Arc<dyn CacheBackend>,
    config: CacheConfig,
    stats: CacheStats,
}

impl RequestCache {
    pub fn new(backend: Arc<dyn CacheBackend>, config: CacheConfig) -> Self {
        Self { backend, config, stats: CacheStats::new() }
    }

    /// The cache key for a normalized request under this cache's
    /// configured strategy.
    pub fn key_for(&self, req: &NormalizedRequest, request_type: RequestType) -> String {
        fingerprint::build_key(self.config.strategy, req, request_type, self.config.components, self.config.key_hex_len)
    }

    pub async fn get(&self, key: &str, meta: &RequestMeta) -> Option<Value> {
        let start = Instant::now();
        let now = Utc::now();
        match self.backend.get(key, now).await {
            Ok(Some(entry)) => {
                self.stats.record_hit(&meta.endpoint, meta.model.as_deref(), start.elapsed());
                debug!(endpoint = %meta.endpoint, %key, "cache hit");
                Some(entry.value)
            }
            Ok(None) => {
                self.stats.record_miss(&meta.endpoint, meta.model.as_deref(), start.elapsed());
                None
            }
            Err(err) => {
                self.stats.record_error("get", error_name(&err));
                warn!(endpoint = %meta.endpoint, %key, error = %err, "cache get failed, treating as miss");
                None
            }
        }
    }

    pub async fn set(&self, key: &str, value: Value, ttl: Option<ChronoDuration>) -> bool {
        let now = Utc::now();
        let ttl = ttl.unwrap_or_else(|| ChronoDuration::seconds(self.config.default_ttl_seconds));
        let entry = CacheEntry::new(value, now, ttl);
        match self.backend.set(key, entry).await {
            Ok(()) => true,
            Err(err) => {
                self.stats.record_error("set", error_name(&err));
                warn!(%key, error = %err, "cache set failed");
                false
            }
        }
    }

    pub async fn delete(&self, key: &str) -> bool {
        match self.backend.delete(key).await {
            Ok(removed) => removed,
            Err(err) => {
                self.stats.record_error("delete", error_name(&err));
                false
            }
        }
    }

    pub async fn clear(&self) -> bool {
        match self.backend.clear().await {
            Ok(()) => true,
            Err(err) => {
                self.stats.record_error("clear", error_name(&err));
                false
            }
        }
    }

    /// Remove every entry matching `criteria`, returning the count
    /// removed.
    pub async fn invalidate(&self, criteria: InvalidateCriteria) -> usize {
        if criteria.clear_all {
            let count = self.backend.scan_prefix("").await.map(|k| k.len()).unwrap_or(0);
            return if self.clear().await { count } else { 0 };
        }

        let candidates = match criteria.key_prefix() {
            Some(prefix) => match self.backend.scan_prefix(&prefix).await {
                Ok(keys) => keys,
                Err(err) => {
                    self.stats.record_error("invalidate", error_name(&err));
                    return 0;
                }
            },
            None => match self.backend.scan_prefix("").await {
                Ok(keys) => keys,
                Err(err) => {
                    self.stats.record_error("invalidate", error_name(&err));
                    return 0;
                }
            },
        };

        let mut count = 0;
        let now = Utc::now();
        for key in candidates {
            if criteria.expired_only {
                match self.backend.get(&key, now).await {
                    Ok(None) => {}
                    _ => continue,
                }
            }
            if let Some(older_than) = criteria.older_than {
                match self.backend.get(&key, now).await {
                    Ok(Some(entry)) if entry.inserted_at >= older_than => continue,
                    Ok(Some(_)) => {}
                    _ => continue,
                }
            }
            if self.delete(&key).await {
                count += 1;
            }
        }
        count
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Write/read/delete round trip with a 1 s TTL; fails if the value
    /// read back doesn't match byte-for-byte.
    pub async fn health_check(&self) -> HealthStatus {
        let probe_key = "gw:healthcheck:probe";
        let probe_value = json!({ "probe": Utc::now().timestamp_nanos_opt().unwrap_or_default() });
        if !self.set(probe_key, probe_value.clone(), Some(ChronoDuration::seconds(1))).await {
            return HealthStatus { healthy: false, detail: "write failed".to_string() };
        }
        let meta = RequestMeta { endpoint: "healthcheck".to_string(), model: None };
        let read_back = self.get(probe_key, &meta).await;
        self.delete(probe_key).await;
        match read_back {
            Some(v) if v == probe_value => HealthStatus { healthy: true, detail: "round trip ok".to_string() },
            Some(_) => HealthStatus { healthy: false, detail: "round trip mismatch".to_string() },
            None => HealthStatus { healthy: false, detail: "read-after-write miss".to_string() },
        }
    }

    /// Drop entries expired as of `now`. Intended to run on a 5-minute
    /// interval for backends that don't expire entries autonomously.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        self.backend.sweep_expired(now).await.unwrap_or(0)
    }

    /// Safety-floor sweep: remove anything inserted more than 24h ago,
    /// regardless of its configured TTL. Intended to run hourly.
    pub async fn sweep_stale(&self, now: DateTime<Utc>) -> usize {
        self.invalidate(InvalidateCriteria { older_than: Some(now - ChronoDuration::hours(24)), ..Default::default() })
            .await
    }
}

/// Whether `method`/`route`/`stream`/`has_user_identifier` describe a
/// cacheable request (`§4.2` "Cacheability rule"). Listed POST routes are
/// chat/completions, embeddings, and models; everything else bypasses
/// the cache.
pub fn is_cacheable(method: &str, route: &str, stream: bool, has_user_identifier: bool) -> bool {
    if method.eq_ignore_ascii_case("GET") {
        return true;
    }
    if !method.eq_ignore_ascii_case("POST") {
        return false;
    }
    const CACHEABLE_POST_ROUTES: &[&str] = &["/v1/chat/completions", "/v1/embeddings", "/v1/models"];
    CACHEABLE_POST_ROUTES.contains(&route) && !stream && !has_user_identifier
}

fn error_name(err: &CacheError) -> &'static str {
    match err {
        CacheError::BackendUnavailable(_) => "BackendUnavailable",
        CacheError::Serialization(_) => "Serialization",
        CacheError::HealthCheckMismatch => "HealthCheckMismatch",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InProcessBackend;

    fn cache() -> RequestCache {
        RequestCache::new(InProcessBackend::new(100), CacheConfig::default())
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = cache();
        cache.set("k1", json!({"x": 1}), None).await;
        let meta = RequestMeta { endpoint: "chat".to_string(), model: Some("gpt-4o".to_string()) };
        assert_eq!(cache.get("k1", &meta).await, Some(json!({"x": 1})));
    }

    #[tokio::test]
    async fn miss_records_stats_without_erroring() {
        let cache = cache();
        let meta = RequestMeta::default();
        assert_eq!(cache.get("missing", &meta).await, None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn health_check_round_trips() {
        let cache = cache();
        let status = cache.health_check().await;
        assert!(status.healthy);
    }

    #[tokio::test]
    async fn invalidate_by_model_prefix_removes_matching_keys() {
        let cache = cache();
        cache.set("llm_gateway:openai:gpt-4o:chat:aaa", json!(1), None).await;
        cache.set("llm_gateway:openai:gpt-3.5:chat:bbb", json!(1), None).await;
        let removed = cache
            .invalidate(InvalidateCriteria { provider: Some("openai".into()), model: Some("gpt-4o".into()), ..Default::default() })
            .await;
        assert_eq!(removed, 1);
    }

    #[test]
    fn get_requests_are_always_cacheable() {
        assert!(is_cacheable("GET", "/v1/models", false, false));
    }

    #[test]
    fn streaming_post_is_never_cacheable() {
        assert!(!is_cacheable("POST", "/v1/chat/completions", true, false));
    }

    #[test]
    fn post_with_user_identifier_is_not_cacheable() {
        assert!(!is_cacheable("POST", "/v1/chat/completions", false, true));
    }

    #[test]
    fn unlisted_post_route_is_not_cacheable() {
        assert!(!is_cacheable("POST", "/v1/audio/transcriptions", false, false));
    }
}
