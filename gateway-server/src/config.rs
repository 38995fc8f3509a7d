//! Configuration loading: `server.* / auth.* / providers.* / cache.* /
//! logging.* / realtime.*` YAML, overridden by environment variables
//! (`§6` "Environment/config surface").

use gateway_cache::CacheKeyStrategy;
use gateway_ratelimit::RateLimitStrategy;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    pub request_timeout_seconds: u64,
    pub max_body_bytes: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8080, request_timeout_seconds: 30, max_body_bytes: 25 * 1024 * 1024 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    /// Gateway-issued keys, `id -> display name`. Loaded at startup and
    /// registered into the `KeyStore`.
    pub gateway_keys: Vec<GatewayKeyEntry>,
    pub allow_client_provider_keys: bool,
    /// Paths exempt from auth/rate-limit entirely (health checks).
    pub bypass_prefixes: Vec<String>,
    pub bypass_loopback: bool,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            gateway_keys: Vec::new(),
            allow_client_provider_keys: true,
            bypass_prefixes: vec!["/health".to_string()],
            bypass_loopback: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayKeyEntry {
    pub credential: String,
    pub id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersSection {
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub openai_use_responses_api: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub enabled: bool,
    pub ttl_seconds: i64,
    pub backend: CacheBackendKind,
    pub redis_url: Option<String>,
    pub strategy: CacheKeyStrategy,
    pub cacheable_routes: Vec<String>,
    pub exclude_user_field: bool,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: 300,
            backend: CacheBackendKind::Memory,
            redis_url: None,
            strategy: CacheKeyStrategy::Default,
            cacheable_routes: vec!["/v1/chat/completions".to_string(), "/v1/embeddings".to_string(), "/v1/models".to_string()],
            exclude_user_field: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackendKind {
    #[default]
    Memory,
    Remote,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub ansi: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self { level: "info".to_string(), ansi: true }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RealtimeSection {
    pub max_buffer_ms: u32,
    pub max_idle_seconds: u64,
    pub max_session_minutes: u64,
    pub global_session_cap: usize,
    pub per_key_session_cap: usize,
}

impl Default for RealtimeSection {
    fn default() -> Self {
        Self { max_buffer_ms: 5000, max_idle_seconds: 60, max_session_minutes: 15, global_session_cap: 500, per_key_session_cap: 5 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitSection {
    pub enabled: bool,
    pub default_strategy: Option<RateLimitStrategy>,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self { enabled: true, default_strategy: None }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerSection,
    pub auth: AuthSection,
    pub providers: ProvidersSection,
    pub cache: CacheSection,
    pub logging: LoggingSection,
    pub realtime: RealtimeSection,
    pub rate_limiting: RateLimitSection,
}

impl GatewayConfig {
    /// Load from a YAML file if present, otherwise start from defaults,
    /// then apply the documented environment variable overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
                serde_yaml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?
            }
            _ => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("GATEWAY_PORT").or_else(|_| std::env::var("PORT")) {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(host) = std::env::var("GATEWAY_HOST").or_else(|_| std::env::var("HOST")) {
            self.server.host = host;
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.providers.openai_api_key = Some(key);
        }
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            self.providers.gemini_api_key = Some(key);
        }
        if let Ok(flag) = std::env::var("OPENAI_USE_RESPONSES_API") {
            self.providers.openai_use_responses_api = parse_bool(&flag);
        }
        if let Ok(flag) = std::env::var("CACHE_ENABLED") {
            self.cache.enabled = parse_bool(&flag);
        }
        if let Ok(ttl) = std::env::var("CACHE_TTL") {
            if let Ok(ttl) = ttl.parse() {
                self.cache.ttl_seconds = ttl;
            }
        }
        if let Ok(backend) = std::env::var("CACHE_BACKEND") {
            self.cache.backend = match backend.as_str() {
                "remote" => CacheBackendKind::Remote,
                _ => CacheBackendKind::Memory,
            };
        }
        if let Ok(url) = std::env::var("REDIS_URL") {
            self.cache.redis_url = Some(url);
        }
        if let Ok(flag) = std::env::var("RATE_LIMITING_ENABLED") {
            self.rate_limiting.enabled = parse_bool(&flag);
        }
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Startup-failure checks matching `§6` "Exit codes" — a missing
    /// provider key when client keys are disallowed is unrecoverable.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be nonzero".to_string()));
        }
        if !self.auth.allow_client_provider_keys
            && self.providers.openai_api_key.is_none()
            && self.providers.gemini_api_key.is_none()
        {
            return Err(ConfigError::Invalid(
                "no provider key configured and client-supplied provider keys are disallowed".to_string(),
            ));
        }
        if self.cache.backend == CacheBackendKind::Remote && self.cache.redis_url.is_none() {
            return Err(ConfigError::Invalid("cache.backend is remote but no redis_url/REDIS_URL is set".to_string()));
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(String),
    #[error("failed to parse config file: {0}")]
    Parse(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate_clean() {
        let config = GatewayConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn disallowing_client_keys_without_a_provider_key_is_invalid() {
        let mut config = GatewayConfig::default();
        config.auth.allow_client_provider_keys = false;
        assert!(config.validate().is_err());
    }

    #[test]
    fn remote_backend_without_url_is_invalid() {
        let mut config = GatewayConfig::default();
        config.cache.backend = CacheBackendKind::Remote;
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_truthy_env_values() {
        assert!(parse_bool("true"));
        assert!(parse_bool("1"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool(""));
    }
}
