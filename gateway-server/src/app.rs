//! Router assembly (`§6` "External interfaces").

use crate::middleware::assign_correlation_id;
use crate::routes;
use crate::state::AppState;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Build the full router: every route group, the ambient middleware
/// stack, and auth/rate-limit/quota enforcement in front of everything
/// except the bypassed health-check prefixes.
pub fn create_app(state: AppState) -> Router {
    let request_timeout = Duration::from_secs(state.config.server.request_timeout_seconds);
    let max_body_bytes = state.config.server.max_body_bytes;
    let auth_state = state.auth.clone();

    Router::new()
        .route("/v1/chat/completions", post(routes::chat::completions))
        .route("/v1/embeddings", post(routes::embeddings::create))
        .route("/v1/audio/transcriptions", post(routes::audio::transcriptions))
        .route("/v1/audio/translations", post(routes::audio::translations))
        .route("/v1/audio/speech", post(routes::audio::speech))
        .route("/v1/models", get(routes::models::list))
        .route("/v1/models/capability/{capability}", get(routes::models::by_capability))
        .route("/v1/models/{id}", get(routes::models::get))
        .route("/v1/realtime/transcription", get(routes::realtime::handler))
        .route("/health", get(routes::health::basic))
        .route("/health/detailed", get(routes::health::detailed))
        .route("/health/providers", get(routes::health::providers))
        .layer(from_fn_with_state(auth_state, gateway_auth::enforce))
        .layer(axum::middleware::from_fn(assign_correlation_id))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
