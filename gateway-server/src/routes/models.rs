//! `GET /v1/models`, `/v1/models/{id}`, `/v1/models/capability/{cap}` (`§6`).

use crate::error::ApiError;
use crate::models::{self, ModelFilter};
use axum::extract::{Path, Query};
use axum::response::{IntoResponse, Response};
use axum::Json;
use gateway_core::GatewayError;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize, Default)]
pub struct ListQuery {
    provider: Option<String>,
    capability: Option<String>,
    #[serde(rename = "type")]
    model_type: Option<String>,
    search: Option<String>,
    limit: Option<usize>,
    offset: Option<usize>,
}

pub async fn list(Query(query): Query<ListQuery>) -> Response {
    let filter = ModelFilter {
        provider: query.provider.as_deref(),
        capability: query.capability.as_deref(),
        model_type: query.model_type.as_deref(),
        search: query.search.as_deref(),
        limit: query.limit,
        offset: query.offset,
    };
    let entries = models::list(&filter);
    Json(json!({ "object": "list", "data": entries })).into_response()
}

pub async fn get(Path(id): Path<String>) -> Result<Response, ApiError> {
    let entry = models::find(&id).ok_or_else(|| GatewayError::NotFound(format!("model '{id}' not found")))?;
    Ok(Json(entry).into_response())
}

pub async fn by_capability(Path(capability): Path<String>) -> Response {
    let filter = ModelFilter { capability: Some(&capability), ..Default::default() };
    let entries = models::list(&filter);
    Json(json!({ "object": "list", "data": entries })).into_response()
}
