//! `GatewayError` → HTTP response, producing the `§7` JSON error shape.

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use gateway_core::GatewayError;
use serde_json::json;

/// Newtype so `gateway-server` handlers can `?`-propagate a
/// [`GatewayError`] straight into an axum [`Response`].
pub struct ApiError(pub GatewayError);

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = json!({
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode as AxumStatus;

    #[test]
    fn not_found_maps_to_404() {
        let response = ApiError(GatewayError::NotFound("model".to_string())).into_response();
        assert_eq!(response.status(), AxumStatus::NOT_FOUND);
    }
}
