/**
 * Public Site Routes
 * Unauthenticated reads used by the marketing pages
 */
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::ContentItem;
use crate::routes::{internal_error, site::theme_response};
use crate::state::AppState;

const CONTENT_CACHE_CONTROL: &str = "public, s-maxage=60, stale-while-revalidate=120";
const CSS_CACHE_CONTROL: &str = "public, max-age=60";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicContentResponse {
    pub success: bool,
    pub count: usize,
    pub content: Vec<ContentItem>,
    pub cached_at: DateTime<Utc>,
}

/// GET /api/public/content
pub async fn get_content(State(state): State<AppState>) -> Response {
    match state.content.get_all().await {
        Ok(content) => {
            tracing::debug!(count = content.len(), "serving public content");
            (
                StatusCode::OK,
                [(header::CACHE_CONTROL, CONTENT_CACHE_CONTROL)],
                Json(PublicContentResponse {
                    success: true,
                    count: content.len(),
                    content,
                    cached_at: Utc::now(),
                }),
            )
                .into_response()
        }
        Err(e) => internal_error("failed to load public content", e).into_response(),
    }
}

/// GET /api/public/theme
pub async fn get_theme(State(state): State<AppState>) -> Response {
    theme_response(&state).await
}

/// GET /api/public/admin-overrides.css
pub async fn get_css_overrides(State(state): State<AppState>) -> Response {
    match state.site.css_overrides().await {
        Ok(css) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/css; charset=utf-8"),
                (header::CACHE_CONTROL, CSS_CACHE_CONTROL),
            ],
            css,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to load css overrides");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
                "/* overrides unavailable */",
            )
                .into_response()
        }
    }
}
