//! Axum middleware resolving a request to a [`KeyInfo`] and enforcing
//! the limiter + quota layer (`§4.3`, `§4.4`, `§6`).

use crate::credential::extract_credential;
use crate::store::KeyStore;
use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use gateway_core::GatewayError;
use gateway_ratelimit::{KeySelector, LimitDecision, LimiterRegistry, QuotaTracker, RouteClass};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::warn;

/// Shared state the auth middleware needs: the key store and the
/// rate-limit/quota layers it enforces against.
pub struct AuthState {
    pub keys: Arc<KeyStore>,
    pub limiter: Arc<LimiterRegistry>,
    pub quota: Arc<QuotaTracker>,
    /// Paths that bypass both authentication and rate limiting.
    pub bypass_prefixes: Vec<String>,
    /// Loopback callers bypass rate limiting when this is set.
    pub bypass_loopback: bool,
}

/// Resolved identity attached to the request's extensions for downstream
/// handlers to read.
#[derive(Clone)]
pub struct AuthContext {
    pub key: Option<gateway_core::KeyInfo>,
}

pub async fn enforce(
    State(state): State<Arc<AuthState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();

    if state.bypass_prefixes.iter().any(|p| path.starts_with(p.as_str())) {
        return next.run(req).await;
    }

    let credential = extract_credential(req.headers());
    let key = credential.as_deref().and_then(|c| state.keys.resolve(c));

    if credential.is_some() && key.is_none() {
        return error_response(GatewayError::authentication("unrecognized credential"));
    }
    if let Some(ref key) = key {
        if !key.enabled {
            return error_response(GatewayError::authentication("key disabled"));
        }
    }

    let loopback = addr.ip() == IpAddr::from([127, 0, 0, 1]) || addr.ip().is_loopback();
    let skip_rate_limit = state.bypass_loopback && loopback;

    let mut rate_limit_decision: Option<LimitDecision> = None;

    if !skip_rate_limit {
        let route_class = RouteClass::from_path(&path);
        let selector = KeySelector::resolve(key.as_ref(), None, addr.ip());
        let strategy = route_class.default_strategy();
        let decision = state.limiter.hit(&selector.bucket_key(), strategy, Utc::now(), 1);
        if !decision.allowed {
            warn!(%path, key = %selector.bucket_key(), "rate limit exceeded");
            let retry_after = gateway_ratelimit::retry_after(&decision, Utc::now());
            let mut response = error_response(GatewayError::RateLimit(gateway_core::error::LimitDetails {
                limit: decision.limit,
                used: decision.limit.saturating_sub(decision.remaining),
                reset_time: decision.reset,
                retry_after,
            }));
            apply_rate_limit_headers(&mut response, &decision);
            return response;
        }
        rate_limit_decision = Some(decision);

        if let Some(ref key) = key {
            if let Err(err) = state.quota.check_and_record_request(key, Utc::now()) {
                warn!(%path, key_id = %key.id, "quota exceeded");
                return error_response(err);
            }
        }
    }

    req.extensions_mut().insert(AuthContext { key });
    let mut response = next.run(req).await;
    if let Some(ref decision) = rate_limit_decision {
        apply_rate_limit_headers(&mut response, decision);
    }
    response
}

/// Every successful response in a limited class carries `X-RateLimit-*`
/// (`§4.4`); `reset` is seconds-since-epoch so clients don't need to parse
/// an RFC3339 timestamp just to compute a wait.
fn apply_rate_limit_headers(response: &mut Response, decision: &LimitDecision) {
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&decision.limit.to_string()) {
        headers.insert("x-ratelimit-limit", value);
    }
    if let Ok(value) = HeaderValue::from_str(&decision.remaining.to_string()) {
        headers.insert("x-ratelimit-remaining", value);
    }
    if let Ok(value) = HeaderValue::from_str(&decision.reset.timestamp().to_string()) {
        headers.insert("x-ratelimit-reset", value);
    }
    if let Ok(value) = HeaderValue::from_str(decision.strategy_name) {
        headers.insert("x-ratelimit-strategy", value);
    }
}

fn error_response(err: GatewayError) -> Response {
    let status = axum::http::StatusCode::from_u16(err.status_code()).unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    let body = serde_json::json!({
        "error": {
            "type": err.code(),
            "code": err.code(),
            "message": err.to_string(),
        }
    });
    let mut response = (status, axum::Json(body)).into_response();
    if let GatewayError::RateLimit(ref details) | GatewayError::QuotaExceeded(ref details) = err {
        if let Ok(value) = HeaderValue::from_str(&details.retry_after.as_secs().to_string()) {
            response.headers_mut().insert("retry-after", value);
        }
    }
    response
}
