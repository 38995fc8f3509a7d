//! `POST /v1/audio/transcriptions`, `/translations`, `/speech` (`§6`).

use crate::error::ApiError;
use crate::providers::ProviderTarget;
use crate::state::AppState;
use axum::extract::{Extension, Multipart, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use gateway_auth::AuthContext;
use gateway_core::{GatewayError, KeyKind};
use reqwest::multipart::{Form, Part};
use serde_json::Value;

pub async fn transcriptions(
    state: State<AppState>,
    auth: Option<Extension<AuthContext>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    forward_multipart(state, auth, multipart, "/audio/transcriptions").await
}

pub async fn translations(
    state: State<AppState>,
    auth: Option<Extension<AuthContext>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    forward_multipart(state, auth, multipart, "/audio/translations").await
}

pub async fn speech(
    State(state): State<AppState>,
    auth: Option<Extension<AuthContext>>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let model = body
        .get("model")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::validation("model is required"))?
        .to_string();
    let target = ProviderTarget::from_model(&model);
    let credential = resolve_credential(&state, &auth, target)?;

    let upstream = state.providers.forward_stream(target, "/audio/speech", &credential, body).await?;
    let status = StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = upstream
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("audio/mpeg")
        .to_string();
    let bytes = upstream.bytes().await.map_err(|e| GatewayError::upstream(e.to_string()))?;

    let mut response = (status, bytes).into_response();
    if let Ok(value) = HeaderValue::from_str(&content_type) {
        response.headers_mut().insert(reqwest::header::CONTENT_TYPE.as_str(), value);
    }
    Ok(response)
}

async fn forward_multipart(
    State(state): State<AppState>,
    auth: Option<Extension<AuthContext>>,
    mut multipart: Multipart,
    path: &str,
) -> Result<Response, ApiError> {
    let mut form = Form::new();
    let mut model: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| GatewayError::validation(e.to_string()))? {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(|s| s.to_string());
        let content_type = field.content_type().map(|s| s.to_string());
        let bytes = field.bytes().await.map_err(|e| GatewayError::validation(e.to_string()))?;

        if name == "model" {
            model = Some(String::from_utf8_lossy(&bytes).trim().to_string());
        }

        let mut part = Part::bytes(bytes.to_vec());
        if let Some(ref file_name) = file_name {
            part = part.file_name(file_name.clone());
        }
        if let Some(ref content_type) = content_type {
            part = match part.mime_str(content_type) {
                Ok(part) => part,
                Err(_) => {
                    let mut fallback = Part::bytes(bytes.to_vec());
                    if let Some(file_name) = file_name {
                        fallback = fallback.file_name(file_name);
                    }
                    fallback
                }
            };
        }
        form = form.part(name, part);
    }

    let model = model.ok_or_else(|| GatewayError::validation("model is required"))?;
    let target = ProviderTarget::from_model(&model);
    let credential = resolve_credential(&state, &auth, target)?;

    let (status, value) = state.providers.forward_multipart(target, path, &credential, form).await?;
    Ok((StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY), Json(value)).into_response())
}

fn resolve_credential(state: &AppState, auth: &Option<Extension<AuthContext>>, target: ProviderTarget) -> Result<String, ApiError> {
    let client_supplied = auth
        .as_ref()
        .and_then(|Extension(ctx)| ctx.key.as_ref())
        .filter(|k| k.kind == KeyKind::Client)
        .map(|k| k.id.clone());
    Ok(state.providers.credential_for(target, client_supplied.as_deref())?)
}
