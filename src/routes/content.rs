/**
 * Admin Content Routes
 * CRUD, history, bulk update, initialization and import/export of editable content
 */
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::models::{ContentData, ContentItem, HistoryEntry};
use crate::routes::{api_error, auth::require_admin, internal_error};
use crate::state::AppState;
use crate::store::content::{
    BulkResult, ContentExport, ContentUpdate, ImportReport, InitializeReport, ScannedElement,
};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ContentQuery {
    pub id: Option<String>,
    pub history: Option<String>,
    pub export: Option<String>,
}

fn is_truthy(flag: &Option<String>) -> bool {
    matches!(flag.as_deref(), Some("true") | Some("1"))
}

/// Body of `POST /api/admin/content`. The flags select the operation.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentPost {
    #[serde(default)]
    pub bulk_update: bool,
    #[serde(default)]
    pub updates: Option<Vec<ContentUpdate>>,
    #[serde(default)]
    pub initialize: bool,
    #[serde(default)]
    pub elements: Option<Vec<ScannedElement>>,
    #[serde(default)]
    pub import: bool,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub element_id: Option<String>,
    #[serde(default)]
    pub content_data: Option<ContentData>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct InitializeRequest {
    #[serde(default)]
    pub elements: Option<Vec<ScannedElement>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContentListResponse {
    pub success: bool,
    pub count: usize,
    pub content: Vec<ContentItem>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContentItemResponse {
    pub success: bool,
    pub content: ContentItem,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub success: bool,
    pub element_id: String,
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExportResponse {
    pub success: bool,
    #[serde(flatten)]
    pub export: ContentExport,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSaved {
    pub success: bool,
    pub message: String,
    pub element_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BulkResponse {
    pub success: bool,
    pub message: String,
    pub updated: usize,
    pub failed: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InitializeResponse {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub report: InitializeReport,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImportResponse {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub report: ImportReport,
}

async fn run_initialize(state: &AppState, elements: Vec<ScannedElement>) -> Response {
    let report = state.content.initialize(elements).await;
    (
        StatusCode::OK,
        Json(InitializeResponse {
            success: true,
            message: format!(
                "Initialized {} elements, updated {}, skipped {}",
                report.stats.initialized, report.stats.updated, report.stats.skipped
            ),
            report,
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/admin/content
/// `?id=` one item, `?id=&history=true` its history, `?export=true` everything
pub async fn get_content(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Query(query): Query<ContentQuery>,
) -> Response {
    if let Err(err) = require_admin(&state, &jar, &headers) {
        return err.into_response();
    }

    if let Some(id) = query.id.as_deref().filter(|id| !id.is_empty()) {
        if is_truthy(&query.history) {
            return match state.content.history(id).await {
                Ok(history) => (
                    StatusCode::OK,
                    Json(HistoryResponse {
                        success: true,
                        element_id: id.to_string(),
                        history,
                    }),
                )
                    .into_response(),
                Err(e) => internal_error("failed to load content history", e).into_response(),
            };
        }

        return match state.content.get(id).await {
            Ok(Some(content)) => (
                StatusCode::OK,
                Json(ContentItemResponse {
                    success: true,
                    content,
                }),
            )
                .into_response(),
            Ok(None) => api_error(StatusCode::NOT_FOUND, "Content not found").into_response(),
            Err(e) => internal_error("failed to load content", e).into_response(),
        };
    }

    if is_truthy(&query.export) {
        return match state.content.export().await {
            Ok(export) => (
                StatusCode::OK,
                Json(ExportResponse {
                    success: true,
                    export,
                }),
            )
                .into_response(),
            Err(e) => internal_error("failed to export content", e).into_response(),
        };
    }

    match state.content.get_all().await {
        Ok(content) => (
            StatusCode::OK,
            Json(ContentListResponse {
                success: true,
                count: content.len(),
                content,
            }),
        )
            .into_response(),
        Err(e) => internal_error("failed to list content", e).into_response(),
    }
}

/// POST /api/admin/content
pub async fn post_content(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(body): Json<ContentPost>,
) -> Response {
    if let Err(err) = require_admin(&state, &jar, &headers) {
        return err.into_response();
    }

    if body.bulk_update {
        let Some(updates) = body.updates else {
            return api_error(StatusCode::BAD_REQUEST, "updates array is required").into_response();
        };
        let BulkResult { success, failed } = state.content.bulk_update(updates).await;
        tracing::info!(success, failed, "bulk content update");
        return (
            StatusCode::OK,
            Json(BulkResponse {
                success: true,
                message: format!("Updated {success} items, {failed} failed"),
                updated: success,
                failed,
            }),
        )
            .into_response();
    }

    if body.initialize {
        let Some(elements) = body.elements else {
            return api_error(StatusCode::BAD_REQUEST, "elements array is required").into_response();
        };
        return run_initialize(&state, elements).await;
    }

    if body.import {
        let Some(data) = body.data else {
            return api_error(StatusCode::BAD_REQUEST, "data is required").into_response();
        };
        let report = state.content.import(&data).await;
        tracing::info!(imported = report.imported, errors = report.errors.len(), "content import");
        return (
            StatusCode::OK,
            Json(ImportResponse {
                success: true,
                message: format!("Imported {} items", report.imported),
                report,
            }),
        )
            .into_response();
    }

    let (Some(element_id), Some(content_data)) = (
        body.element_id.filter(|id| !id.trim().is_empty()),
        body.content_data,
    ) else {
        return api_error(StatusCode::BAD_REQUEST, "elementId and contentData are required")
            .into_response();
    };

    match state.content.save(&element_id, content_data).await {
        Ok(_) => (
            StatusCode::OK,
            Json(ContentSaved {
                success: true,
                message: "Content updated successfully".to_string(),
                element_id,
            }),
        )
            .into_response(),
        Err(e) => internal_error("failed to save content", e).into_response(),
    }
}

/// DELETE /api/admin/content?id=
pub async fn delete_content(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Query(query): Query<ContentQuery>,
) -> Response {
    if let Err(err) = require_admin(&state, &jar, &headers) {
        return err.into_response();
    }

    let Some(element_id) = query.id.filter(|id| !id.is_empty()) else {
        return api_error(StatusCode::BAD_REQUEST, "elementId is required").into_response();
    };

    match state.content.delete(&element_id).await {
        Ok(true) => (
            StatusCode::OK,
            Json(ContentSaved {
                success: true,
                message: "Content deleted successfully".to_string(),
                element_id,
            }),
        )
            .into_response(),
        Ok(false) => api_error(StatusCode::NOT_FOUND, "Content not found").into_response(),
        Err(e) => internal_error("failed to delete content", e).into_response(),
    }
}

/// POST /api/admin/initialize-content
pub async fn initialize_content(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(body): Json<InitializeRequest>,
) -> Response {
    if let Err(err) = require_admin(&state, &jar, &headers) {
        return err.into_response();
    }

    match body.elements {
        Some(elements) => run_initialize(&state, elements).await,
        None => api_error(
            StatusCode::BAD_REQUEST,
            "Invalid request: elements array required",
        )
        .into_response(),
    }
}
