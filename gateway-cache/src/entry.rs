//! A stored cache value and its expiry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata passed alongside a `get`/`set`, used purely for telemetry
/// bucketing (`§4.2` "Telemetry").
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub endpoint: String,
    pub model: Option<String>,
}

/// A cached response body plus its lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: Value,
    pub inserted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(value: Value, now: DateTime<Utc>, ttl: chrono::Duration) -> Self {
        Self { value, inserted_at: now, expires_at: now + ttl }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
