//! Correlation-id assignment (`§6` "Headers"). `tower-http`'s `request-id`
//! feature isn't part of this workspace's dependency set, so this is a
//! small hand-rolled equivalent built directly on [`gateway_core::CorrelationId`].

use axum::body::Body;
use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use gateway_core::CorrelationId;

const HEADER: &str = "x-correlation-id";

pub async fn assign_correlation_id(mut req: Request<Body>, next: Next) -> Response {
    let incoming = req
        .headers()
        .get(HEADER)
        .or_else(|| req.headers().get("x-request-id"))
        .and_then(|v| v.to_str().ok());
    let id = CorrelationId::from_header(incoming);

    req.extensions_mut().insert(id.clone());
    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(id.as_str()) {
        response.headers_mut().insert(HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    #[tokio::test]
    async fn generates_a_correlation_id_when_absent() {
        let app: Router = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn(assign_correlation_id));
        let response = app.oneshot(HttpRequest::builder().uri("/").body(Body::empty()).unwrap()).await.unwrap();
        assert!(response.headers().contains_key(HEADER));
    }

    #[tokio::test]
    async fn echoes_a_client_supplied_correlation_id() {
        let app: Router = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn(assign_correlation_id));
        let response = app
            .oneshot(HttpRequest::builder().uri("/").header(HEADER, "req-123").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.headers().get(HEADER).unwrap(), "req-123");
    }
}
