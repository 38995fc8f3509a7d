//! Picks the configured [`CacheBackend`] (`§4.2` "Store model").

use crate::config::{CacheBackendKind, CacheSection};
use gateway_cache::{CacheBackend, InProcessBackend};
use std::sync::Arc;
use tracing::warn;

/// In-process by default; `remote` degrades to in-process with a warning
/// if the configured store can't be reached at startup, matching `§7`'s
/// "cache backend failures are swallowed into miss + telemetry" rule.
pub async fn build_backend(cache: &CacheSection) -> Arc<dyn CacheBackend> {
    match cache.backend {
        CacheBackendKind::Memory => InProcessBackend::new(10_000),
        CacheBackendKind::Remote => {
            let Some(url) = cache.redis_url.as_deref() else {
                warn!("cache.backend is remote but no redis_url is configured, falling back to in-process");
                return InProcessBackend::new(10_000);
            };
            match gateway_cache::RemoteBackend::connect(url, "llm_gateway").await {
                Ok(backend) => Arc::new(backend),
                Err(err) => {
                    warn!(%err, "failed to connect to the remote cache backend, falling back to in-process");
                    InProcessBackend::new(10_000)
                }
            }
        }
    }
}
