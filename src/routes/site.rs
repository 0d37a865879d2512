/**
 * Admin Site Settings Routes
 * Site configuration document and theme switch
 */
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::models::Theme;
use crate::routes::{api_error, auth::require_admin, internal_error};
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct SavedResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ThemeResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub theme: Theme,
}

#[derive(Debug, Deserialize)]
pub struct ThemeRequest {
    #[serde(default)]
    pub theme: Option<String>,
}

/// GET /api/admin/config
pub async fn get_config(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    if let Err(err) = require_admin(&state, &jar, &headers) {
        return err.into_response();
    }

    match state.site.config().await {
        Ok(config) => (StatusCode::OK, Json(config)).into_response(),
        Err(e) => internal_error("failed to load site config", e).into_response(),
    }
}

/// POST /api/admin/config
pub async fn save_config(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(config): Json<Value>,
) -> Response {
    if let Err(err) = require_admin(&state, &jar, &headers) {
        return err.into_response();
    }

    if !config.is_object() {
        return api_error(StatusCode::BAD_REQUEST, "Invalid configuration").into_response();
    }

    match state.site.save_config(&config).await {
        Ok(()) => (
            StatusCode::OK,
            Json(SavedResponse {
                success: true,
                message: "Configuration saved successfully".to_string(),
            }),
        )
            .into_response(),
        Err(e) => internal_error("failed to save site config", e).into_response(),
    }
}

/// GET /api/admin/theme
pub async fn get_theme(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    if let Err(err) = require_admin(&state, &jar, &headers) {
        return err.into_response();
    }
    theme_response(&state).await
}

/// Current theme; shared with the public endpoint.
pub(crate) async fn theme_response(state: &AppState) -> Response {
    match state.site.theme().await {
        Ok(theme) => (
            StatusCode::OK,
            Json(ThemeResponse {
                success: true,
                message: None,
                theme,
            }),
        )
            .into_response(),
        Err(e) => internal_error("failed to load theme", e).into_response(),
    }
}

/// POST /api/admin/theme
pub async fn set_theme(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(body): Json<ThemeRequest>,
) -> Response {
    if let Err(err) = require_admin(&state, &jar, &headers) {
        return err.into_response();
    }

    let Some(theme) = body.theme.as_deref().and_then(Theme::parse) else {
        return api_error(
            StatusCode::BAD_REQUEST,
            "Invalid theme. Must be \"dark\" or \"light\"",
        )
        .into_response();
    };

    match state.site.set_theme(theme).await {
        Ok(()) => {
            tracing::info!(theme = %theme, "theme changed");
            (
                StatusCode::OK,
                Json(ThemeResponse {
                    success: true,
                    message: Some(format!("Theme set to {theme}")),
                    theme,
                }),
            )
                .into_response()
        }
        Err(e) => internal_error("failed to save theme", e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_helpers::send;
    use crate::state::test_support::test_state;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::get;
    use axum::Router;
    use chrono::Utc;
    use serde_json::json;

    fn site_router(state: AppState) -> Router {
        Router::new()
            .route("/api/admin/config", get(get_config).post(save_config))
            .route("/api/admin/theme", get(get_theme).post(set_theme))
            .with_state(state)
    }

    async fn call(state: &AppState, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let (token, _) = state.sessions.issue("admin", Utc::now()).unwrap();
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("cookie", format!("admin_token={token}"))
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let (status, _, bytes) = send(site_router(state.clone()), req).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_config_defaults_and_save() {
        let state = test_state();
        let (status, config) = call(&state, "GET", "/api/admin/config", Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(config["colors"]["heroBg"], "#0a0a0a");

        let (status, _) = call(&state, "POST", "/api/admin/config", json!("nope")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(
            &state,
            "POST",
            "/api/admin/config",
            json!({"colors": {"heroBg": "#222222"}}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let css = state.site.css_overrides().await.unwrap();
        assert!(css.contains("--hero-bg: #222222;"));
    }

    #[tokio::test]
    async fn test_theme_switch_validates_value() {
        let state = test_state();
        let (_, body) = call(&state, "GET", "/api/admin/theme", Value::Null).await;
        assert_eq!(body["theme"], "dark");

        let (status, _) = call(&state, "POST", "/api/admin/theme", json!({"theme": "blue"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) =
            call(&state, "POST", "/api/admin/theme", json!({"theme": "light"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Theme set to light");
    }

    #[tokio::test]
    async fn test_theme_requires_session() {
        let req = Request::get("/api/admin/theme").body(Body::empty()).unwrap();
        let (status, _, _) = send(site_router(test_state()), req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
