//! Thin proxy to the upstream OpenAI-style and Gemini-style HTTP APIs.
//!
//! Provider wire format is an explicit external contract (`§1` non-goals);
//! this module only resolves which base URL/credential a request goes to
//! and forwards bytes, it never inspects the body.

use crate::config::ProvidersSection;
use gateway_core::GatewayError;
use reqwest::{Client, Method};
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderTarget {
    OpenAI,
    Gemini,
}

impl ProviderTarget {
    /// Classify a model id by its naming convention, falling back to
    /// OpenAI (the gateway's primary wire contract).
    pub fn from_model(model: &str) -> Self {
        if model.starts_with("gemini") || model.starts_with("models/gemini") {
            Self::Gemini
        } else {
            Self::OpenAI
        }
    }

    fn base_url(&self) -> &'static str {
        match self {
            Self::OpenAI => "https://api.openai.com/v1",
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Gemini => "gemini",
        }
    }
}

/// The gateway's own provider keys plus an HTTP client shared across
/// requests (`§5` "Cancellation and timeouts": 30s default deadline).
pub struct ProviderRegistry {
    http: Client,
    openai_api_key: Option<String>,
    gemini_api_key: Option<String>,
}

impl ProviderRegistry {
    pub fn from_config(providers: &ProvidersSection) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client with static TLS config builds");
        Self { http, openai_api_key: providers.openai_api_key.clone(), gemini_api_key: providers.gemini_api_key.clone() }
    }

    /// The bearer credential to use for `target`: the caller's own
    /// client-supplied provider key if they have one, else the gateway's
    /// configured operator key.
    pub fn credential_for(&self, target: ProviderTarget, client_supplied: Option<&str>) -> Result<String, GatewayError> {
        if let Some(key) = client_supplied {
            return Ok(key.to_string());
        }
        let configured = match target {
            ProviderTarget::OpenAI => &self.openai_api_key,
            ProviderTarget::Gemini => &self.gemini_api_key,
        };
        configured
            .clone()
            .ok_or_else(|| GatewayError::authentication(format!("no {} credential available", target.name())))
    }

    /// Forward a JSON request to `target`'s `path`, returning the
    /// upstream status and parsed body. Non-streaming only; streaming
    /// responses use [`Self::forward_stream`].
    pub async fn forward_json(
        &self,
        target: ProviderTarget,
        path: &str,
        method: Method,
        credential: &str,
        body: Option<Value>,
    ) -> Result<(u16, Value), GatewayError> {
        let url = format!("{}{}", target.base_url(), path);
        let mut request = self.http.request(method, url).bearer_auth(credential);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.map_err(map_reqwest_err)?;
        let status = response.status().as_u16();
        let value = response.json::<Value>().await.unwrap_or(Value::Null);
        Ok((status, value))
    }

    /// Forward a streaming request, returning the raw upstream response
    /// for the caller to re-frame as Server-Sent Events.
    pub async fn forward_stream(
        &self,
        target: ProviderTarget,
        path: &str,
        credential: &str,
        body: Value,
    ) -> Result<reqwest::Response, GatewayError> {
        let url = format!("{}{}", target.base_url(), path);
        self.http.post(url).bearer_auth(credential).json(&body).send().await.map_err(map_reqwest_err)
    }

    /// Forward a multipart request (audio transcription/translation).
    pub async fn forward_multipart(
        &self,
        target: ProviderTarget,
        path: &str,
        credential: &str,
        form: reqwest::multipart::Form,
    ) -> Result<(u16, Value), GatewayError> {
        let url = format!("{}{}", target.base_url(), path);
        let response = self.http.post(url).bearer_auth(credential).multipart(form).send().await.map_err(map_reqwest_err)?;
        let status = response.status().as_u16();
        let value = response.json::<Value>().await.unwrap_or(Value::Null);
        Ok((status, value))
    }
}

fn map_reqwest_err(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::upstream(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_gemini_models_by_prefix() {
        assert_eq!(ProviderTarget::from_model("gemini-1.5-pro"), ProviderTarget::Gemini);
        assert_eq!(ProviderTarget::from_model("gpt-4o-mini"), ProviderTarget::OpenAI);
    }

    #[test]
    fn client_supplied_credential_wins_over_configured() {
        let registry = ProviderRegistry::from_config(&ProvidersSection::default());
        let resolved = registry.credential_for(ProviderTarget::OpenAI, Some("sk-client")).unwrap();
        assert_eq!(resolved, "sk-client");
    }

    #[test]
    fn missing_credential_is_an_authentication_error() {
        let registry = ProviderRegistry::from_config(&ProvidersSection::default());
        assert!(registry.credential_for(ProviderTarget::OpenAI, None).is_err());
    }
}
