/**
 * Blueprint Routes
 * Generator callback, retrieval, and the customer-facing blueprint pages
 */
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::models::{BlueprintRecord, BlueprintStatus};
use crate::pages;
use crate::routes::{api_error, base_url, blueprint_page_url, internal_error};
use crate::state::AppState;
use crate::store::BlueprintError;
use crate::validation::{is_valid_email, is_valid_submission_id};

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReceiveBlueprintRequest {
    pub submission_id: Option<String>,
    #[serde(alias = "blueprint")]
    pub blueprint_content: Option<Value>,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub business_description: Option<String>,
    pub status: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveBlueprintResponse {
    pub success: bool,
    pub message: String,
    pub submission_id: String,
    pub status: BlueprintStatus,
    pub blueprint_url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmissionQuery {
    pub submission_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlueprintStatusResponse {
    pub success: bool,
    pub status: BlueprintStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blueprint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmailQuery {
    pub email: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckEmailResponse {
    pub success: bool,
    pub exists: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<BlueprintStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blueprint_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DuplicateRequest {
    pub email: Option<String>,
    pub submission_id: Option<String>,
    pub contact_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FailureResponse {
    pub success: bool,
    pub message: String,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn html(status: StatusCode, body: String) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        body,
    )
        .into_response()
}

fn failure(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(FailureResponse {
            success: false,
            message: message.to_string(),
        }),
    )
        .into_response()
}

fn wants_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}

/// Generator output arrives as text or as a JSON document.
fn content_to_text(content: Value) -> Option<String> {
    match content {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s),
        other => serde_json::to_string_pretty(&other).ok(),
    }
}

// ============================================================================
// Generator callback
// ============================================================================

/// POST /api/receive-blueprint
pub async fn receive_blueprint(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ReceiveBlueprintRequest>,
) -> Response {
    let Some(submission_id) = non_blank(body.submission_id.as_deref()).map(str::to_string) else {
        return api_error(StatusCode::BAD_REQUEST, "Submission ID is required").into_response();
    };
    if !is_valid_submission_id(&submission_id) {
        return api_error(StatusCode::BAD_REQUEST, "Invalid submission ID").into_response();
    }

    let status = match body.status.as_deref().map(str::trim) {
        None | Some("") | Some("completed") => BlueprintStatus::Completed,
        Some("error") => BlueprintStatus::Error,
        Some(other) => {
            tracing::warn!(submission_id = %submission_id, status = %other, "unknown blueprint status");
            return api_error(
                StatusCode::BAD_REQUEST,
                "Status must be \"completed\" or \"error\"",
            )
            .into_response();
        }
    };

    let content = body.blueprint_content.and_then(content_to_text);
    if status == BlueprintStatus::Completed && content.is_none() {
        return api_error(StatusCode::BAD_REQUEST, "Blueprint content is required").into_response();
    }

    // Fields the generator omits are carried over from the pending submission.
    let pending = match state.blueprints.retrieve(&submission_id).await {
        Ok(pending) => pending,
        Err(e) => return internal_error("failed to load pending blueprint", e).into_response(),
    };
    let mut record = pending.unwrap_or_else(|| BlueprintRecord::processing(&submission_id));
    if let Some(name) = non_blank(body.contact_name.as_deref()) {
        record.contact_name = Some(name.to_string());
    }
    if let Some(email) = non_blank(body.contact_email.as_deref()) {
        record.contact_email = Some(email.to_string());
    }
    if let Some(description) = non_blank(body.business_description.as_deref()) {
        record.business_description = Some(description.to_string());
    }

    let now = Utc::now();
    record.status = status;
    match status {
        BlueprintStatus::Error => {
            record.error = Some(
                non_blank(body.error.as_deref())
                    .unwrap_or("Blueprint generation failed")
                    .to_string(),
            );
            record.error_at = Some(now);
            record.blueprint_content = content;
        }
        _ => {
            record.blueprint_content = content;
            record.generated_at = Some(now);
        }
    }

    let record = match state.blueprints.store(&submission_id, record).await {
        Ok(record) => record,
        Err(BlueprintError::Finalized(_)) => {
            tracing::warn!(submission_id = %submission_id, "rejected overwrite of finalized blueprint");
            return api_error(StatusCode::CONFLICT, "Blueprint already finalized").into_response();
        }
        Err(e) => return internal_error("failed to store blueprint", e).into_response(),
    };

    let url = blueprint_page_url(
        &base_url(state.config.public_base_url.as_deref(), &headers),
        &submission_id,
    );

    if wants_html(&headers) {
        return html(StatusCode::OK, pages::render_receipt_page(&record, &url));
    }

    (
        StatusCode::OK,
        Json(ReceiveBlueprintResponse {
            success: true,
            message: "Blueprint stored successfully".to_string(),
            submission_id,
            status: record.status,
            blueprint_url: url,
        }),
    )
        .into_response()
}

// ============================================================================
// Retrieval
// ============================================================================

/// GET /api/get-blueprint?submissionId=
pub async fn get_blueprint(
    State(state): State<AppState>,
    Query(query): Query<SubmissionQuery>,
) -> Response {
    let Some(submission_id) = non_blank(query.submission_id.as_deref()) else {
        return api_error(StatusCode::BAD_REQUEST, "Submission ID is required").into_response();
    };

    let record = match state.blueprints.retrieve(submission_id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            return api_error(StatusCode::NOT_FOUND, "Submission not found").into_response()
        }
        Err(e) => return internal_error("failed to retrieve blueprint", e).into_response(),
    };

    let (code, response) = match record.status {
        BlueprintStatus::Completed => (
            StatusCode::OK,
            BlueprintStatusResponse {
                success: true,
                status: record.status,
                submission_id: Some(record.submission_id),
                blueprint: record.blueprint_content,
                contact_name: record.contact_name,
                generated_at: record.generated_at,
                message: None,
            },
        ),
        BlueprintStatus::Error => (
            StatusCode::INTERNAL_SERVER_ERROR,
            BlueprintStatusResponse {
                success: false,
                status: record.status,
                submission_id: Some(record.submission_id),
                blueprint: None,
                contact_name: None,
                generated_at: None,
                message: Some(
                    record
                        .error
                        .unwrap_or_else(|| "Blueprint generation failed".to_string()),
                ),
            },
        ),
        BlueprintStatus::Processing => (
            StatusCode::ACCEPTED,
            BlueprintStatusResponse {
                success: false,
                status: record.status,
                submission_id: Some(record.submission_id),
                blueprint: None,
                contact_name: None,
                generated_at: None,
                message: Some("Blueprint is still being generated".to_string()),
            },
        ),
    };

    (code, Json(response)).into_response()
}

/// GET /api/get-blueprint-page?submissionId=
pub async fn get_blueprint_page(
    State(state): State<AppState>,
    Query(query): Query<SubmissionQuery>,
) -> Response {
    blueprint_page(&state, query.submission_id.as_deref()).await
}

/// POST /api/get-blueprint-page
pub async fn post_blueprint_page(
    State(state): State<AppState>,
    Json(body): Json<SubmissionQuery>,
) -> Response {
    blueprint_page(&state, body.submission_id.as_deref()).await
}

async fn blueprint_page(state: &AppState, submission_id: Option<&str>) -> Response {
    let Some(submission_id) = non_blank(submission_id) else {
        return html(StatusCode::BAD_REQUEST, pages::render_not_found_page());
    };

    match state.blueprints.retrieve(submission_id).await {
        Ok(None) => html(StatusCode::NOT_FOUND, pages::render_not_found_page()),
        Ok(Some(record)) => match record.status {
            BlueprintStatus::Completed => html(StatusCode::OK, pages::render_blueprint_page(&record)),
            BlueprintStatus::Processing => html(
                StatusCode::ACCEPTED,
                pages::render_processing_page(record.contact_name.as_deref()),
            ),
            BlueprintStatus::Error => html(
                StatusCode::OK,
                pages::render_error_page(
                    "We hit a snag generating your blueprint. Our team has been notified.",
                    record.contact_name.as_deref(),
                ),
            ),
        },
        Err(e) => {
            tracing::error!(submission_id = %submission_id, error = %e, "failed to load blueprint page");
            html(
                StatusCode::INTERNAL_SERVER_ERROR,
                pages::render_error_page("Internal server error", None),
            )
        }
    }
}

// ============================================================================
// Duplicate detection
// ============================================================================

/// GET /api/check-email?email=
pub async fn check_email_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<EmailQuery>,
) -> Response {
    check_email(&state, &headers, query.email.as_deref()).await
}

/// POST /api/check-email
pub async fn check_email_body(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<EmailQuery>,
) -> Response {
    check_email(&state, &headers, body.email.as_deref()).await
}

async fn check_email(state: &AppState, headers: &HeaderMap, email: Option<&str>) -> Response {
    let Some(email) = non_blank(email) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(CheckEmailResponse {
                message: "Email address is required".to_string(),
                ..CheckEmailResponse::default()
            }),
        )
            .into_response();
    };
    if !is_valid_email(email) {
        return (
            StatusCode::BAD_REQUEST,
            Json(CheckEmailResponse {
                message: "Invalid email format".to_string(),
                ..CheckEmailResponse::default()
            }),
        )
            .into_response();
    }

    let response = match state.blueprints.retrieve_by_email(email).await {
        Ok(Some(record)) => {
            tracing::debug!(submission_id = %record.submission_id, "email has existing blueprint");
            let base = base_url(state.config.public_base_url.as_deref(), headers);
            CheckEmailResponse {
                success: true,
                exists: true,
                message: "Email has existing blueprint".to_string(),
                blueprint_url: Some(blueprint_page_url(&base, &record.submission_id)),
                submission_id: Some(record.submission_id),
                contact_name: record.contact_name,
                generated_at: record.generated_at,
                status: Some(record.status),
                email: None,
            }
        }
        Ok(None) => CheckEmailResponse {
            success: true,
            exists: false,
            message: "No existing blueprint found for this email".to_string(),
            email: Some(email.to_string()),
            ..CheckEmailResponse::default()
        },
        Err(e) => {
            tracing::error!(error = %e, "email lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CheckEmailResponse {
                    message: "Internal server error".to_string(),
                    ..CheckEmailResponse::default()
                }),
            )
                .into_response();
        }
    };

    (StatusCode::OK, Json(response)).into_response()
}

/// POST /api/handle-duplicate
pub async fn handle_duplicate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<DuplicateRequest>,
) -> Response {
    let Some(email) = non_blank(body.email.as_deref()) else {
        return failure(StatusCode::BAD_REQUEST, "Email address is required");
    };
    if !is_valid_email(email) {
        return failure(StatusCode::BAD_REQUEST, "Invalid email format");
    }

    let existing = match non_blank(body.submission_id.as_deref()) {
        Some(id) => state.blueprints.retrieve(id).await,
        None => state.blueprints.retrieve_by_email(email).await,
    };
    let existing = match existing {
        Ok(existing) => existing,
        Err(e) => {
            tracing::error!(error = %e, "duplicate lookup failed");
            return html(
                StatusCode::INTERNAL_SERVER_ERROR,
                pages::render_error_page("Internal server error", None),
            );
        }
    };

    let contact_name = non_blank(body.contact_name.as_deref())
        .map(str::to_string)
        .or_else(|| existing.as_ref().and_then(|r| r.contact_name.clone()));
    let url = existing.as_ref().map(|record| {
        blueprint_page_url(
            &base_url(state.config.public_base_url.as_deref(), &headers),
            &record.submission_id,
        )
    });

    tracing::info!(found = existing.is_some(), "duplicate submission handled");

    html(
        StatusCode::OK,
        pages::render_duplicate_page(contact_name.as_deref(), email, url.as_deref()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_helpers::{get_with_headers, post_json, send};
    use crate::state::test_support::test_state;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::{get, post};
    use axum::Router;
    use serde_json::json;

    fn blueprint_router(state: AppState) -> Router {
        Router::new()
            .route("/api/receive-blueprint", post(receive_blueprint))
            .route("/api/get-blueprint", get(get_blueprint))
            .route(
                "/api/get-blueprint-page",
                get(get_blueprint_page).post(post_blueprint_page),
            )
            .route(
                "/api/check-email",
                get(check_email_query).post(check_email_body),
            )
            .route("/api/handle-duplicate", post(handle_duplicate))
            .with_state(state)
    }

    fn completed_callback(id: &str) -> Value {
        json!({
            "submissionId": id,
            "blueprint": "Automate order intake with a chat assistant",
            "contactName": "Ada Lovelace",
            "contactEmail": "Ada@Example.com",
            "status": "completed"
        })
    }

    #[tokio::test]
    async fn test_receive_then_retrieve_completed_blueprint() {
        let state = test_state();
        let app = blueprint_router(state.clone());

        let (status, _, bytes) =
            post_json(app.clone(), "/api/receive-blueprint", &completed_callback("sub-1")).await;
        assert_eq!(status, StatusCode::OK);
        let body: ReceiveBlueprintResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.status, BlueprintStatus::Completed);
        assert_eq!(
            body.blueprint_url,
            "https://revamply.test/api/get-blueprint-page?submissionId=sub-1"
        );

        let (status, bytes) =
            get_with_headers(app.clone(), "/api/get-blueprint?submissionId=sub-1", &[]).await;
        assert_eq!(status, StatusCode::OK);
        let body: BlueprintStatusResponse = serde_json::from_slice(&bytes).unwrap();
        assert!(body.success);
        assert_eq!(
            body.blueprint.as_deref(),
            Some("Automate order intake with a chat assistant")
        );

        let (status, bytes) =
            get_with_headers(app, "/api/get-blueprint-page?submissionId=sub-1", &[]).await;
        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8_lossy(&bytes).contains("Automate order intake"));
    }

    #[tokio::test]
    async fn test_finalized_blueprint_cannot_be_overwritten() {
        let app = blueprint_router(test_state());
        let (status, _, _) =
            post_json(app.clone(), "/api/receive-blueprint", &completed_callback("sub-1")).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _, _) = post_json(
            app,
            "/api/receive-blueprint",
            &json!({"submissionId": "sub-1", "status": "error", "error": "late failure"}),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_receive_validates_body() {
        let app = blueprint_router(test_state());

        let (status, _, _) =
            post_json(app.clone(), "/api/receive-blueprint", &json!({"blueprint": "x"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, _) = post_json(
            app.clone(),
            "/api/receive-blueprint",
            &json!({"submissionId": "sub-1", "status": "completed"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, _) = post_json(
            app.clone(),
            "/api/receive-blueprint",
            &json!({"submissionId": "sub-1", "status": "done", "blueprint": "x"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Ids that would break the blueprint link are refused.
        for id in ["a&admin=1", "a#frag", "a b"] {
            let (status, _, _) = post_json(
                app.clone(),
                "/api/receive-blueprint",
                &json!({"submissionId": id, "blueprint": "x"}),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn test_receive_answers_html_to_browsers() {
        let app = blueprint_router(test_state());
        let req = Request::post("/api/receive-blueprint")
            .header("content-type", "application/json")
            .header("accept", "text/html,application/xhtml+xml")
            .body(Body::from(completed_callback("sub-9").to_string()))
            .unwrap();
        let (status, headers, bytes) = send(app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers["content-type"].to_str().unwrap().starts_with("text/html"));
        assert!(String::from_utf8_lossy(&bytes).contains("sub-9"));
    }

    #[tokio::test]
    async fn test_not_found_is_distinct_from_error_status() {
        let state = test_state();
        let app = blueprint_router(state.clone());

        let (status, _) =
            get_with_headers(app.clone(), "/api/get-blueprint?submissionId=missing", &[]).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, _) = post_json(
            app.clone(),
            "/api/receive-blueprint",
            &json!({"submissionId": "sub-err", "status": "error", "error": "model timeout"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, bytes) =
            get_with_headers(app.clone(), "/api/get-blueprint?submissionId=sub-err", &[]).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let body: BlueprintStatusResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.status, BlueprintStatus::Error);
        assert_eq!(body.message.as_deref(), Some("model timeout"));

        let (status, _) =
            get_with_headers(app.clone(), "/api/get-blueprint-page?submissionId=sub-err", &[]).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = get_with_headers(app, "/api/get-blueprint", &[]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_processing_record_reports_accepted() {
        let state = test_state();
        state
            .blueprints
            .mark_processing("sub-p", BlueprintRecord::processing("sub-p"))
            .await
            .unwrap();
        let app = blueprint_router(state);

        let (status, _) =
            get_with_headers(app.clone(), "/api/get-blueprint?submissionId=sub-p", &[]).await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let (status, _, bytes) = post_json(
            app.clone(),
            "/api/get-blueprint-page",
            &json!({"submissionId": "sub-p"}),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert!(String::from_utf8_lossy(&bytes).contains("Being Generated"));

        let (status, _) = get_with_headers(app, "/api/get-blueprint-page", &[]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_check_email_finds_blueprint_case_insensitively() {
        let app = blueprint_router(test_state());
        post_json(app.clone(), "/api/receive-blueprint", &completed_callback("sub-1")).await;

        let (status, bytes) =
            get_with_headers(app.clone(), "/api/check-email?email=ada@example.com", &[]).await;
        assert_eq!(status, StatusCode::OK);
        let body: CheckEmailResponse = serde_json::from_slice(&bytes).unwrap();
        assert!(body.exists);
        assert_eq!(body.submission_id.as_deref(), Some("sub-1"));
        assert_eq!(body.contact_name.as_deref(), Some("Ada Lovelace"));

        let (status, _, bytes) = post_json(
            app.clone(),
            "/api/check-email",
            &json!({"email": "nobody@example.com"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let body: CheckEmailResponse = serde_json::from_slice(&bytes).unwrap();
        assert!(!body.exists);
        assert_eq!(body.email.as_deref(), Some("nobody@example.com"));

        let (status, _) = get_with_headers(app, "/api/check-email?email=bogus", &[]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_handle_duplicate_links_existing_blueprint() {
        let app = blueprint_router(test_state());
        post_json(app.clone(), "/api/receive-blueprint", &completed_callback("sub-1")).await;

        let (status, headers, bytes) = post_json(
            app.clone(),
            "/api/handle-duplicate",
            &json!({"email": "ada@example.com"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers["content-type"].to_str().unwrap().starts_with("text/html"));
        let page = String::from_utf8_lossy(&bytes);
        assert!(page.contains("Ada Lovelace"));
        assert!(page.contains("submissionId=sub-1"));

        let (status, _, _) =
            post_json(app, "/api/handle-duplicate", &json!({"email": "not-an-email"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
