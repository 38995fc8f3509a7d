//! `KeyInfo` — identity record for a credential (`§3`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where a credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
    /// Issued by the gateway operator.
    Gateway,
    /// A client-supplied provider key (`sk-...`, `AIza...`), recognized by
    /// prefix and given tighter default quotas.
    Client,
}

/// Per-hour/per-day request and token caps for a key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuotaDescriptor {
    pub requests_per_hour: Option<u64>,
    pub requests_per_day: Option<u64>,
    pub tokens_per_hour: Option<u64>,
    pub tokens_per_day: Option<u64>,
}

impl QuotaDescriptor {
    /// No caps at all.
    pub const fn unlimited() -> Self {
        Self {
            requests_per_hour: None,
            requests_per_day: None,
            tokens_per_hour: None,
            tokens_per_day: None,
        }
    }

    /// Conservative defaults applied to client-supplied provider keys.
    pub const fn client_default() -> Self {
        Self {
            requests_per_hour: Some(500),
            requests_per_day: Some(5_000),
            tokens_per_hour: Some(500_000),
            tokens_per_day: Some(5_000_000),
        }
    }
}

impl Default for QuotaDescriptor {
    fn default() -> Self {
        Self::unlimited()
    }
}

/// Identity record for an inbound credential, resolved once by
/// `gateway-auth` and consulted by the limiter/quota and realtime layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyInfo {
    pub id: String,
    pub display_name: String,
    pub kind: KeyKind,
    pub provider: Option<String>,
    pub enabled: bool,
    pub quota: QuotaDescriptor,
    /// Requests-per-minute cap used by the token-bucket/fixed-window
    /// limiters (`§4.3`); independent of the hourly/daily quota.
    pub requests_per_minute: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub metadata: Option<Value>,
}

impl KeyInfo {
    /// Build a gateway-issued key with unlimited quota (the operator's own
    /// provider keys loaded from config/env).
    pub fn gateway(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            kind: KeyKind::Gateway,
            provider: None,
            enabled: true,
            quota: QuotaDescriptor::unlimited(),
            requests_per_minute: None,
            created_at: Utc::now(),
            metadata: None,
        }
    }

    /// Build a `KeyInfo` for a client-supplied provider key recognized by
    /// prefix (`§4.4`), first-sighted at request time.
    pub fn client_provider_key(id: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: "client-provided key".to_string(),
            kind: KeyKind::Client,
            provider: Some(provider.into()),
            enabled: true,
            quota: QuotaDescriptor::client_default(),
            requests_per_minute: Some(60),
            created_at: Utc::now(),
            metadata: None,
        }
    }

    /// The rate-limiter bucket key for this identity (`§4.3` key selection).
    pub fn bucket_key(&self) -> String {
        format!("api:{}", self.id)
    }
}

/// Recognize a client-supplied provider key by its prefix.
///
/// `sk-...` → openai, `AIza...` → gemini. Returns `None` for credentials
/// that don't look like a raw provider key (gateway-issued keys use their
/// own id format and never hit this path).
pub fn infer_provider_from_prefix(credential: &str) -> Option<&'static str> {
    if credential.starts_with("sk-") {
        Some("openai")
    } else if credential.starts_with("AIza") {
        Some("gemini")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_openai_prefix() {
        assert_eq!(infer_provider_from_prefix("sk-abc123"), Some("openai"));
    }

    #[test]
    fn recognizes_gemini_prefix() {
        assert_eq!(infer_provider_from_prefix("AIzaSyXXXXX"), Some("gemini"));
    }

    #[test]
    fn unknown_prefix_is_none() {
        assert_eq!(infer_provider_from_prefix("gw_live_abc"), None);
    }

    #[test]
    fn bucket_key_is_prefixed() {
        let key = KeyInfo::gateway("abc", "test");
        assert_eq!(key.bucket_key(), "api:abc");
    }
}
