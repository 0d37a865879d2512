use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};
use std::time::Instant;
use tower_http::request_id::{
    MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};

/// Probes hit these every few seconds; they only log at debug.
fn is_probe(path: &str) -> bool {
    path == "/health" || path.starts_with("/health/")
}

fn outcome(status: StatusCode) -> &'static str {
    if status.is_server_error() {
        "request completed with error"
    } else if status.is_client_error() {
        "request completed with client error"
    } else {
        "request completed successfully"
    }
}

pub async fn log_request(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let req_id: String = request
        .extensions()
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    if is_probe(&path) {
        let response = next.run(request).await;
        tracing::debug!(
            request_id = %req_id,
            uri = %path,
            status = %response.status(),
            "health probe"
        );
        return response;
    }

    // Query strings are left out: they carry emails and submission ids.
    tracing::info!(request_id = %req_id, method = %method, uri = %path, "incoming request");

    let response = next.run(request).await;

    let duration_ms = start.elapsed().as_millis();
    let status = response.status();
    let message = outcome(status);

    if status.is_server_error() {
        tracing::error!(request_id = %req_id, method = %method, uri = %path, status = %status, duration_ms = %duration_ms, "{}", message);
    } else if status.is_client_error() {
        tracing::warn!(request_id = %req_id, method = %method, uri = %path, status = %status, duration_ms = %duration_ms, "{}", message);
    } else {
        tracing::info!(request_id = %req_id, method = %method, uri = %path, status = %status, duration_ms = %duration_ms, "{}", message);
    }

    response
}

pub fn request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    #[test]
    fn test_probe_paths() {
        assert!(is_probe("/health"));
        assert!(is_probe("/health/ready"));
        assert!(!is_probe("/healthz-not"));
        assert!(!is_probe("/api/check-email"));
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let app = Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(propagate_request_id_layer())
            .layer(axum::middleware::from_fn(log_request))
            .layer(request_id_layer());

        let res = app
            .oneshot(Request::get("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().contains_key("x-request-id"));
    }
}
