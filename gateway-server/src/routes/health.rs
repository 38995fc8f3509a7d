//! `GET /health`, `/health/detailed`, `/health/providers` (`§6`).

use crate::state::AppState;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub async fn basic() -> Response {
    Json(json!({ "status": "ok" })).into_response()
}

pub async fn detailed(State(state): State<AppState>) -> Response {
    let cache_health = state.cache.health_check().await;
    let cache_stats = state.cache.stats();
    Json(json!({
        "status": if cache_health.healthy { "ok" } else { "degraded" },
        "cache": {
            "healthy": cache_health.healthy,
            "detail": cache_health.detail,
            "hits": cache_stats.hits,
            "misses": cache_stats.misses,
            "hit_rate": cache_stats.hit_rate,
        },
        "realtime_sessions": {
            "global": state.sessions.global_count(),
            "global_cap": state.config.realtime.global_session_cap,
        },
        "keys_registered": state.auth.keys.len(),
    }))
    .into_response()
}

pub async fn providers(State(state): State<AppState>) -> Response {
    Json(json!({
        "openai": { "configured": state.config.providers.openai_api_key.is_some() },
        "gemini": { "configured": state.config.providers.gemini_api_key.is_some() },
        "allow_client_provider_keys": state.config.auth.allow_client_provider_keys,
    }))
    .into_response()
}
