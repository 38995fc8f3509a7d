//! Key selection and per-route strategy defaults (`§4.3`, `§4.4`).

use crate::limiter::RateLimitStrategy;
use gateway_core::KeyInfo;
use std::net::IpAddr;

/// Which identity a bucket key is derived from, in the fallback order
/// `§4.4` defines: authenticated key, else a caller-supplied user id, else
/// the client's IP.
#[derive(Debug, Clone)]
pub enum KeySelector {
    Api(String),
    User(String),
    Ip(IpAddr),
}

impl KeySelector {
    /// Pick a selector for a request, preferring the resolved [`KeyInfo`],
    /// falling back to a caller-supplied user id header, falling back to
    /// the socket's IP.
    pub fn resolve(key: Option<&KeyInfo>, user_id: Option<&str>, ip: IpAddr) -> Self {
        if let Some(key) = key {
            return Self::Api(key.id.clone());
        }
        if let Some(user_id) = user_id {
            return Self::User(user_id.to_string());
        }
        Self::Ip(ip)
    }

    pub fn bucket_key(&self) -> String {
        match self {
            Self::Api(id) => format!("api:{id}"),
            Self::User(id) => format!("user:{id}"),
            Self::Ip(addr) => format!("ip:{addr}"),
        }
    }
}

/// Coarse classification of a route, used to pick the default limiter
/// strategy when a key has no per-route override (`§4.3`'s defaults
/// table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    ChatCompletions,
    Embeddings,
    Audio,
    ModelsList,
    Health,
    Other,
}

impl RouteClass {
    /// Classify a request path into a route class for the purposes of
    /// picking a default limiter strategy. Unknown paths fall into
    /// [`RouteClass::Other`].
    pub fn from_path(path: &str) -> Self {
        if path.starts_with("/health") {
            Self::Health
        } else if path == "/v1/chat/completions" {
            Self::ChatCompletions
        } else if path == "/v1/embeddings" {
            Self::Embeddings
        } else if path.starts_with("/v1/audio/") {
            Self::Audio
        } else if path.starts_with("/v1/models") {
            Self::ModelsList
        } else {
            Self::Other
        }
    }

    /// Default limiter strategy for this route class, absent any
    /// per-key or per-route config override.
    pub fn default_strategy(&self) -> RateLimitStrategy {
        match self {
            Self::ChatCompletions => RateLimitStrategy::TokenBucket {
                capacity: 120,
                refill_amount: 60,
                refill_period_ms: 60_000,
            },
            Self::Embeddings => RateLimitStrategy::FixedWindow { window_ms: 60_000, max: 30 },
            Self::Audio => RateLimitStrategy::SlidingWindow { window_ms: 5 * 60_000, max: 20 },
            Self::ModelsList => RateLimitStrategy::FixedWindow { window_ms: 60_000, max: 200 },
            Self::Health => RateLimitStrategy::FixedWindow { window_ms: 60_000, max: 300 },
            Self::Other => RateLimitStrategy::FixedWindow { window_ms: 15 * 60_000, max: 100 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_through_api_user_ip() {
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        let selector = KeySelector::resolve(None, None, ip);
        assert_eq!(selector.bucket_key(), "ip:127.0.0.1");

        let selector = KeySelector::resolve(None, Some("u1"), ip);
        assert_eq!(selector.bucket_key(), "user:u1");

        let key = KeyInfo::gateway("k1", "test");
        let selector = KeySelector::resolve(Some(&key), Some("u1"), ip);
        assert_eq!(selector.bucket_key(), "api:k1", "an authenticated key always wins");
    }

    #[test]
    fn classifies_known_paths() {
        assert_eq!(RouteClass::from_path("/v1/chat/completions"), RouteClass::ChatCompletions);
        assert_eq!(RouteClass::from_path("/v1/audio/transcriptions"), RouteClass::Audio);
        assert_eq!(RouteClass::from_path("/health/detailed"), RouteClass::Health);
        assert_eq!(RouteClass::from_path("/v1/unknown"), RouteClass::Other);
    }

    #[test]
    fn chat_completions_uses_a_token_bucket() {
        let strategy = RouteClass::ChatCompletions.default_strategy();
        assert_eq!(
            strategy,
            RateLimitStrategy::TokenBucket { capacity: 120, refill_amount: 60, refill_period_ms: 60_000 }
        );
    }
}
