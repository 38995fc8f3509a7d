//! `POST /v1/embeddings` (`§6`). Non-streaming only.

use crate::error::ApiError;
use crate::normalize;
use crate::providers::ProviderTarget;
use crate::state::AppState;
use axum::extract::{Extension, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use gateway_auth::AuthContext;
use gateway_cache::{is_cacheable, RequestMeta, RequestType};
use gateway_core::{GatewayError, KeyKind};
use reqwest::Method;
use serde_json::Value;

pub async fn create(
    State(state): State<AppState>,
    auth: Option<Extension<AuthContext>>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let model = body
        .get("model")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::validation("model is required"))?
        .to_string();
    let has_user = body.get("user").and_then(Value::as_str).is_some();

    let target = ProviderTarget::from_model(&model);
    let key = auth.and_then(|Extension(ctx)| ctx.key);
    let client_supplied = key.as_ref().filter(|k| k.kind == KeyKind::Client).map(|k| k.id.clone());
    let credential = state.providers.credential_for(target, client_supplied.as_deref())?;

    let cacheable = is_cacheable("POST", "/v1/embeddings", false, has_user) && state.config.cache.enabled;
    let normalized = normalize::embeddings_request(target.name(), &body);
    let key_for_cache = state.cache.key_for(&normalized, RequestType::Embedding);
    let meta = RequestMeta { endpoint: "embeddings".to_string(), model: Some(model.clone()) };
    let ttl_seconds = state.config.cache.ttl_seconds;

    if cacheable {
        if let Some(cached) = state.cache.get(&key_for_cache, &meta).await {
            let mut response = Json(cached).into_response();
            apply_cache_headers(&mut response, "HIT", &key_for_cache, ttl_seconds);
            return Ok(response);
        }
    }

    let (status, value) = state.providers.forward_json(target, "/embeddings", Method::POST, &credential, Some(body)).await?;
    if cacheable && (200..300).contains(&status) {
        state.cache.set(&key_for_cache, value.clone(), None).await;
    }
    let mut response = (StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY), Json(value)).into_response();
    if cacheable {
        apply_cache_headers(&mut response, "MISS", &key_for_cache, ttl_seconds);
    }
    Ok(response)
}

/// `§4.4` "Cache headers": hits and misses on a cacheable route both carry
/// `X-Cache`/`X-Cache-Key`/`X-Cache-TTL` for observability.
fn apply_cache_headers(response: &mut Response, status: &'static str, key: &str, ttl_seconds: i64) {
    let headers = response.headers_mut();
    headers.insert("x-cache", HeaderValue::from_static(status));
    if let Ok(value) = HeaderValue::from_str(key) {
        headers.insert("x-cache-key", value);
    }
    if let Ok(value) = HeaderValue::from_str(&ttl_seconds.to_string()) {
        headers.insert("x-cache-ttl", value);
    }
}
