/**
 * Routes Module
 * API route handlers
 */
use axum::{
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

pub mod auth;
pub mod blueprint;
pub mod content;
pub mod forms;
pub mod health;
pub mod public;
pub mod site;

/// JSON error body shared by every handler.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            message: None,
        }),
    )
}

/// Logs the cause and hides it from the client.
pub fn internal_error(context: &str, err: impl std::fmt::Display) -> ApiError {
    tracing::error!(error = %err, "{}", context);
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

/// First `X-Forwarded-For` hop, else the peer address.
pub fn client_ip(headers: &HeaderMap, addr: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| addr.ip().to_string())
}

/// Public origin used to build links back to this service.
pub fn base_url(configured: Option<&str>, headers: &HeaderMap) -> String {
    if let Some(url) = configured {
        return url.to_string();
    }
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(',').next().unwrap_or(v).trim().to_string())
            .filter(|v| !v.is_empty())
    };
    let proto = header("x-forwarded-proto").unwrap_or_else(|| "http".to_string());
    let host = header("x-forwarded-host")
        .or_else(|| header("host"))
        .unwrap_or_else(|| "localhost".to_string());
    format!("{proto}://{host}")
}

pub fn blueprint_page_url(base: &str, submission_id: &str) -> String {
    format!("{base}/api/get-blueprint-page?submissionId={submission_id}")
}


#[cfg(test)]
pub(crate) mod test_helpers {
    use axum::body::{Body, Bytes};
    use axum::http::{HeaderMap, Request, StatusCode};
    use axum::Router;
    use tower::ServiceExt;

    pub async fn send(app: Router, req: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let headers = res.headers().clone();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, bytes)
    }

    pub async fn post_json(
        app: Router,
        uri: &str,
        json: &impl serde::Serialize,
    ) -> (StatusCode, HeaderMap, Bytes) {
        let req = Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(json).unwrap()))
            .unwrap();
        send(app, req).await
    }

    pub async fn get_with_headers(
        app: Router,
        uri: &str,
        headers: &[(&str, &str)],
    ) -> (StatusCode, Bytes) {
        let mut req = Request::get(uri);
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        let (status, _, bytes) = send(app, req.body(Body::empty()).unwrap()).await;
        (status, bytes)
    }
}
