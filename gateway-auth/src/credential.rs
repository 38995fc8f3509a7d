//! Credential extraction from inbound headers (`§4.4`).

use axum::http::HeaderMap;
use gateway_core::key_info::infer_provider_from_prefix;

/// Examine `Authorization: Bearer <token>`, `X-API-Key`, and
/// `OpenAI-API-Key` in that order, returning the first credential found.
pub fn extract_credential(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(axum::http::header::AUTHORIZATION) {
        if let Ok(value) = value.to_str() {
            if let Some(token) = value.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }
    if let Some(value) = headers.get("x-api-key") {
        if let Ok(value) = value.to_str() {
            return Some(value.trim().to_string());
        }
    }
    if let Some(value) = headers.get("openai-api-key") {
        if let Ok(value) = value.to_str() {
            return Some(value.trim().to_string());
        }
    }
    None
}

/// Whether `credential` looks like a client-supplied raw provider key
/// rather than a gateway-issued one, and if so which provider it's for.
pub fn recognize_provider_key(credential: &str) -> Option<&'static str> {
    infer_provider_from_prefix(credential)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn prefers_authorization_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static("Bearer sk-abc"));
        headers.insert("x-api-key", HeaderValue::from_static("other"));
        assert_eq!(extract_credential(&headers), Some("sk-abc".to_string()));
    }

    #[test]
    fn falls_back_to_x_api_key() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("sk-xyz"));
        assert_eq!(extract_credential(&headers), Some("sk-xyz".to_string()));
    }

    #[test]
    fn falls_back_to_openai_api_key() {
        let mut headers = HeaderMap::new();
        headers.insert("openai-api-key", HeaderValue::from_static("sk-legacy"));
        assert_eq!(extract_credential(&headers), Some("sk-legacy".to_string()));
    }

    #[test]
    fn no_header_is_none() {
        assert_eq!(extract_credential(&HeaderMap::new()), None);
    }
}
