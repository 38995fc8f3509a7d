//! Process-wide shared state (`§5` "Shared resources").

use crate::config::GatewayConfig;
use crate::providers::ProviderRegistry;
use chrono::Utc;
use gateway_auth::{AuthState, KeyStore};
use gateway_cache::{CacheConfig, RequestCache};
use gateway_ratelimit::{LimiterRegistry, QuotaTracker};
use gateway_realtime::SessionRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Everything an axum handler needs, cloned cheaply via `Arc` fields.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub cache: Arc<RequestCache>,
    pub auth: Arc<AuthState>,
    pub quota: Arc<QuotaTracker>,
    pub limiter: Arc<LimiterRegistry>,
    pub sessions: Arc<SessionRegistry>,
    pub providers: Arc<ProviderRegistry>,
}

impl AppState {
    pub async fn new(config: GatewayConfig) -> Self {
        let keys = Arc::new(KeyStore::new());
        for entry in &config.auth.gateway_keys {
            keys.register(entry.credential.clone(), gateway_core::KeyInfo::gateway(&entry.id, &entry.display_name));
        }

        let limiter = Arc::new(LimiterRegistry::new());
        let quota = Arc::new(QuotaTracker::new());

        let auth = Arc::new(AuthState {
            keys,
            limiter: limiter.clone(),
            quota: quota.clone(),
            bypass_prefixes: config.auth.bypass_prefixes.clone(),
            bypass_loopback: config.auth.bypass_loopback,
        });

        let backend = crate::cache_backend::build_backend(&config.cache).await;
        let cache_config = CacheConfig {
            strategy: config.cache.strategy,
            default_ttl_seconds: config.cache.ttl_seconds,
            ..CacheConfig::default()
        };
        let cache = Arc::new(RequestCache::new(backend, cache_config));

        let sessions = Arc::new(SessionRegistry::new(config.realtime.global_session_cap, config.realtime.per_key_session_cap));
        let providers = Arc::new(ProviderRegistry::from_config(&config.providers));

        Self { config: Arc::new(config), cache, auth, quota, limiter, sessions, providers }
    }

    /// Start the periodic housekeeping loop (`§5` "a small pool of
    /// periodic housekeeping tasks"): cache TTL/stale sweeps, idle
    /// rate-limit bucket cleanup, and quota counter reaping. Each task
    /// exits as soon as `shutdown` is signalled, so the process can drain
    /// them during graceful shutdown instead of abandoning them mid-tick.
    pub fn spawn_housekeeping(&self, shutdown: watch::Receiver<bool>) {
        spawn_periodic(shutdown.clone(), Duration::from_secs(5 * 60), "cache sweep_expired", {
            let cache = self.cache.clone();
            move || {
                let cache = cache.clone();
                async move {
                    let removed = cache.sweep_expired(Utc::now()).await;
                    tracing::debug!(removed, "cache sweep_expired ran");
                }
            }
        });

        spawn_periodic(shutdown.clone(), Duration::from_secs(60 * 60), "cache sweep_stale", {
            let cache = self.cache.clone();
            move || {
                let cache = cache.clone();
                async move {
                    let removed = cache.sweep_stale(Utc::now()).await;
                    tracing::debug!(removed, "cache sweep_stale ran");
                }
            }
        });

        spawn_periodic(shutdown.clone(), Duration::from_secs(60 * 60), "rate limit bucket cleanup", {
            let limiter = self.limiter.clone();
            move || {
                let limiter = limiter.clone();
                async move {
                    limiter.cleanup(Utc::now());
                    tracing::debug!(buckets = limiter.len(), "rate limit bucket cleanup ran");
                }
            }
        });

        spawn_periodic(shutdown, Duration::from_secs(60 * 60), "quota counter reap", {
            let quota = self.quota.clone();
            move || {
                let quota = quota.clone();
                async move {
                    quota.reap_stale(Utc::now());
                    tracing::debug!("quota counter reap ran");
                }
            }
        });
    }
}

/// Run `make_tick` on a fixed `period`, stopping as soon as `shutdown`
/// observes `true`.
fn spawn_periodic<F, Fut>(mut shutdown: watch::Receiver<bool>, period: Duration, name: &'static str, mut make_tick: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        interval.tick().await; // first tick fires immediately; skip it, the state is fresh at startup
        loop {
            tokio::select! {
                _ = interval.tick() => make_tick().await,
                _ = shutdown.changed() => {
                    tracing::debug!(task = name, "housekeeping task stopping on shutdown");
                    return;
                }
            }
        }
    });
}
