/**
 * Form Intake Routes
 * Relays site forms to the blueprint generator webhook
 */
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::{BlueprintRecord, NextSteps};
use crate::routes::{api_error, internal_error};
use crate::state::AppState;
use crate::validation::{is_valid_email, is_valid_full_name};
use crate::webhook::WebhookReply;

const FORM_SUBMISSION: &str = "form_submission";
const NEXT_STEPS_SUBMISSION: &str = "next_steps_submission";
const DEFAULT_SOURCE: &str = "website";

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmitFormRequest {
    pub business_description: Option<String>,
    pub full_name: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub timestamp: Option<String>,
    pub source: Option<String>,
}

/// Body sent to the generator for a new submission.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSubmissionPayload {
    pub submission_id: String,
    pub business_description: String,
    pub full_name: String,
    pub name: String,
    pub email: String,
    pub timestamp: String,
    pub source: String,
    pub status: &'static str,
    pub created_at: DateTime<Utc>,
    pub webhook_type: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitFormResponse {
    pub success: bool,
    pub submission_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NextStepsRequest {
    pub business_name: Option<String>,
    pub phone: Option<String>,
    pub submission_id: Option<String>,
    pub timestamp: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginalSubmission {
    pub business_description: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub blueprint: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextStepsPayload<'a> {
    pub business_name: &'a str,
    pub phone: &'a str,
    pub submission_id: Option<&'a str>,
    pub timestamp: String,
    pub webhook_type: &'static str,
    pub original_submission: Option<OriginalSubmission>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ValidateEmailRequest {
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateEmailFailure {
    pub valid: bool,
    pub reason: String,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/submit-form
pub async fn submit_form(
    State(state): State<AppState>,
    Json(body): Json<SubmitFormRequest>,
) -> Response {
    let Some(business_description) = non_blank(&body.business_description) else {
        return api_error(StatusCode::BAD_REQUEST, "Business description is required")
            .into_response();
    };
    let full_name = non_blank(&body.full_name).or(non_blank(&body.name));
    let Some(full_name) = full_name.filter(|n| is_valid_full_name(n)) else {
        return api_error(
            StatusCode::BAD_REQUEST,
            "Please enter your full name (first and last)",
        )
        .into_response();
    };
    let Some(email) = non_blank(&body.email).filter(|e| is_valid_email(e)) else {
        return api_error(StatusCode::BAD_REQUEST, "A valid email address is required")
            .into_response();
    };

    let submission_id = Uuid::new_v4().to_string();
    let now = Utc::now();

    let mut pending = BlueprintRecord::processing(&submission_id);
    pending.contact_name = Some(full_name.to_string());
    pending.contact_email = Some(email.to_string());
    pending.business_description = Some(business_description.to_string());
    if let Err(e) = state.blueprints.mark_processing(&submission_id, pending).await {
        return internal_error("failed to record pending submission", e).into_response();
    }

    let payload = FormSubmissionPayload {
        submission_id: submission_id.clone(),
        business_description: business_description.to_string(),
        full_name: full_name.to_string(),
        name: full_name.to_string(),
        email: email.to_string(),
        timestamp: body.timestamp.clone().unwrap_or_else(|| now.to_rfc3339()),
        source: body.source.clone().unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
        status: "processing",
        created_at: now,
        webhook_type: FORM_SUBMISSION,
    };

    tracing::info!(submission_id = %submission_id, "relaying form submission");

    match state.webhook.post(&payload).await {
        Ok(WebhookReply::Html { status, body }) => {
            // Duplicate-email page from the generator; nothing will call back.
            discard_pending(&state, &submission_id).await;
            (
                StatusCode::from_u16(status).unwrap_or(StatusCode::OK),
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response()
        }
        Ok(WebhookReply::Json { status, body }) => {
            // A rejected submission never gets a callback.
            let accepted = (200..300).contains(&status)
                && body.get("success") != Some(&serde_json::Value::Bool(false));
            if !accepted {
                tracing::warn!(submission_id = %submission_id, status, "generator rejected submission");
                discard_pending(&state, &submission_id).await;
            }
            (
                StatusCode::from_u16(status).unwrap_or(StatusCode::OK),
                Json(body),
            )
                .into_response()
        }
        Ok(WebhookReply::Empty { .. }) => (
            StatusCode::OK,
            Json(SubmitFormResponse {
                success: true,
                submission_id,
                status: Some("processing".to_string()),
                message: "Form submitted successfully. Generating your AI blueprint...".to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(submission_id = %submission_id, error = %e, "form submission relay failed");
            discard_pending(&state, &submission_id).await;
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SubmitFormResponse {
                    success: false,
                    submission_id,
                    status: None,
                    message: "We couldn't start generating your blueprint. Please try again in a few minutes."
                        .to_string(),
                }),
            )
                .into_response()
        }
    }
}

async fn discard_pending(state: &AppState, submission_id: &str) {
    if let Err(e) = state.blueprints.delete(submission_id).await {
        tracing::warn!(submission_id = %submission_id, error = %e, "failed to discard pending submission");
    }
}

/// POST /api/submit-next-steps
pub async fn submit_next_steps(
    State(state): State<AppState>,
    Json(body): Json<NextStepsRequest>,
) -> Response {
    let (Some(business_name), Some(phone)) = (non_blank(&body.business_name), non_blank(&body.phone))
    else {
        return api_error(
            StatusCode::BAD_REQUEST,
            "Business name and phone number are required",
        )
        .into_response();
    };
    let submission_id = non_blank(&body.submission_id);

    let original = match submission_id {
        Some(id) => match state.blueprints.retrieve(id).await {
            Ok(record) => record,
            Err(e) => {
                return internal_error("failed to load original submission", e).into_response()
            }
        },
        None => None,
    };

    let now = Utc::now();
    let payload = NextStepsPayload {
        business_name,
        phone,
        submission_id,
        timestamp: body.timestamp.clone().unwrap_or_else(|| now.to_rfc3339()),
        webhook_type: NEXT_STEPS_SUBMISSION,
        original_submission: original.map(|record| OriginalSubmission {
            business_description: record.business_description,
            name: record.contact_name,
            email: record.contact_email,
            blueprint: record.blueprint_content,
        }),
    };

    if let Err(e) = state.webhook.post(&payload).await {
        tracing::warn!(error = %e, "next steps relay failed");
    }

    let next_steps = NextSteps {
        submission_id: submission_id.map(str::to_string),
        business_name: business_name.to_string(),
        phone: phone.to_string(),
        submitted_at: now,
    };
    if let Err(e) = state.blueprints.attach_next_steps(&next_steps).await {
        return internal_error("failed to store next steps", e).into_response();
    }

    tracing::info!(submission_id = ?submission_id, "next steps submitted");

    (
        StatusCode::OK,
        Json(MessageResponse {
            success: true,
            message: "Next steps submission successful. We will contact you soon!".to_string(),
        }),
    )
        .into_response()
}

/// POST /api/validate-email
pub async fn validate_email(
    State(state): State<AppState>,
    Json(body): Json<ValidateEmailRequest>,
) -> Response {
    let Some(email) = non_blank(&body.email) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ValidateEmailFailure {
                valid: false,
                reason: "Email is required".to_string(),
            }),
        )
            .into_response();
    };

    let result = state.email_validator.validate(email).await;
    (StatusCode::OK, Json(result)).into_response()
}
