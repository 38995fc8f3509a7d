//! Gateway-wide error taxonomy (`§7`).
//!
//! Every surface (HTTP and realtime) eventually maps its failures onto
//! this enum so the `{ error: { type, code, message, details? } }` shape
//! in `§7` is produced in exactly one place.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Extra fields carried by rate-limit and quota errors, used to populate
/// both the JSON `details` and the `Retry-After`/`X-RateLimit-*` headers.
#[derive(Debug, Clone, Serialize)]
pub struct LimitDetails {
    pub limit: u64,
    pub used: u64,
    pub reset_time: DateTime<Utc>,
    pub retry_after: Duration,
}

/// The gateway error taxonomy (`§7`). `kind()` gives the HTTP status / WS
/// close-code family; `code()` gives the stable machine-readable string
/// used in the `error.code` field and in realtime `error` messages.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("authentication error: {0}")]
    Authentication(String),

    #[error("authorization error: {0}")]
    Authorization(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("rate limit exceeded")]
    RateLimit(LimitDetails),

    #[error("quota exceeded")]
    QuotaExceeded(LimitDetails),

    #[error("upstream provider error: {0}")]
    Upstream(String),

    #[error("upstream timeout")]
    Timeout,

    #[error("internal server error: {0}")]
    Internal(String),
}

/// Coarse classification used to pick an HTTP status / default handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayErrorKind {
    Validation,
    Authentication,
    Authorization,
    NotFound,
    PayloadTooLarge,
    UnsupportedMediaType,
    RateLimit,
    QuotaExceeded,
    Upstream,
    Timeout,
    Internal,
}

impl GatewayError {
    pub fn kind(&self) -> GatewayErrorKind {
        match self {
            Self::Validation(_) => GatewayErrorKind::Validation,
            Self::Authentication(_) => GatewayErrorKind::Authentication,
            Self::Authorization(_) => GatewayErrorKind::Authorization,
            Self::NotFound(_) => GatewayErrorKind::NotFound,
            Self::PayloadTooLarge(_) => GatewayErrorKind::PayloadTooLarge,
            Self::UnsupportedMediaType(_) => GatewayErrorKind::UnsupportedMediaType,
            Self::RateLimit(_) => GatewayErrorKind::RateLimit,
            Self::QuotaExceeded(_) => GatewayErrorKind::QuotaExceeded,
            Self::Upstream(_) => GatewayErrorKind::Upstream,
            Self::Timeout => GatewayErrorKind::Timeout,
            Self::Internal(_) => GatewayErrorKind::Internal,
        }
    }

    /// HTTP status code for this error, per `§7`'s taxonomy table.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            GatewayErrorKind::Validation => 400,
            GatewayErrorKind::Authentication => 401,
            GatewayErrorKind::Authorization => 403,
            GatewayErrorKind::NotFound => 404,
            GatewayErrorKind::PayloadTooLarge => 413,
            GatewayErrorKind::UnsupportedMediaType => 415,
            GatewayErrorKind::RateLimit | GatewayErrorKind::QuotaExceeded => 429,
            GatewayErrorKind::Upstream => 502,
            GatewayErrorKind::Timeout => 504,
            GatewayErrorKind::Internal => 500,
        }
    }

    /// Stable machine-readable error code (`error.code` / realtime `code`).
    pub fn code(&self) -> &'static str {
        match self.kind() {
            GatewayErrorKind::Validation => "validation_error",
            GatewayErrorKind::Authentication => "authentication_error",
            GatewayErrorKind::Authorization => "authorization_error",
            GatewayErrorKind::NotFound => "not_found",
            GatewayErrorKind::PayloadTooLarge => "payload_too_large",
            GatewayErrorKind::UnsupportedMediaType => "unsupported_media_type",
            GatewayErrorKind::RateLimit => "rate_limit_exceeded",
            GatewayErrorKind::QuotaExceeded => "quota_exceeded",
            GatewayErrorKind::Upstream => "upstream_error",
            GatewayErrorKind::Timeout => "timeout",
            GatewayErrorKind::Internal => "server_error",
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_exceeded_is_429() {
        let err = GatewayError::QuotaExceeded(LimitDetails {
            limit: 100,
            used: 100,
            reset_time: Utc::now(),
            retry_after: Duration::from_secs(60),
        });
        assert_eq!(err.status_code(), 429);
        assert_eq!(err.code(), "quota_exceeded");
    }

    #[test]
    fn not_found_is_404() {
        assert_eq!(GatewayError::NotFound("model".into()).status_code(), 404);
    }
}
