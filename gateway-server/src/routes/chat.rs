//! `POST /v1/chat/completions` (`§6`).

use crate::error::ApiError;
use crate::normalize;
use crate::providers::ProviderTarget;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Extension, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use gateway_auth::AuthContext;
use gateway_cache::{is_cacheable, RequestMeta, RequestType};
use gateway_core::{GatewayError, KeyKind};
use reqwest::Method;
use serde_json::Value;

pub async fn completions(
    State(state): State<AppState>,
    auth: Option<Extension<AuthContext>>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let model = body
        .get("model")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::validation("model is required"))?
        .to_string();
    let stream = body.get("stream").and_then(Value::as_bool).unwrap_or(false);
    let has_user = body.get("user").and_then(Value::as_str).is_some();

    let target = ProviderTarget::from_model(&model);
    let key = auth.and_then(|Extension(ctx)| ctx.key);
    let client_supplied = key.as_ref().filter(|k| k.kind == KeyKind::Client).map(|k| k.id.clone());
    let credential = state.providers.credential_for(target, client_supplied.as_deref())?;

    if stream {
        let upstream = state.providers.forward_stream(target, "/chat/completions", &credential, body).await?;
        return Ok(sse_passthrough(upstream));
    }

    let cacheable = is_cacheable("POST", "/v1/chat/completions", false, has_user) && state.config.cache.enabled;
    let normalized = normalize::chat_request(target.name(), &body);
    let key_for_cache = state.cache.key_for(&normalized, RequestType::Chat);
    let meta = RequestMeta { endpoint: "chat".to_string(), model: Some(model.clone()) };
    let ttl_seconds = state.config.cache.ttl_seconds;

    if cacheable {
        if let Some(cached) = state.cache.get(&key_for_cache, &meta).await {
            return Ok(cache_response(cached, "HIT", &key_for_cache, ttl_seconds));
        }
    }

    let (status, value) = state.providers.forward_json(target, "/chat/completions", Method::POST, &credential, Some(body)).await?;
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
fn cache_response(value: Value, status: &'static str, key: &str, ttl_seconds: i64) -> Response {
    let mut response = Json(value).into_response();
    apply_cache_headers(&mut response, status, key, ttl_seconds);
    response
}

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

fn sse_passthrough(upstream: reqwest::Response) -> Response {
    let status = StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let body = Body::from_stream(upstream.bytes_stream());
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response.headers_mut().insert("content-type", HeaderValue::from_static("text/event-stream"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_missing_is_a_validation_error() {
        let body = serde_json::json!({"messages": []});
        assert!(body.get("model").and_then(Value::as_str).is_none());
    }
}
