//! Outbound relay to the workflow engine that generates blueprints.

use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("webhook request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("webhook returned status {status}")]
    Upstream { status: u16 },
}

/// What the webhook answered, reduced to the shapes the site forwards.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookReply {
    /// A rendered page, e.g. the duplicate-email notice.
    Html { status: u16, body: String },
    /// A JSON document carrying its own `success` flag.
    Json { status: u16, body: Value },
    /// A 2xx with nothing worth forwarding.
    Empty { status: u16 },
}

/// Classifies a raw webhook response.
pub fn classify(
    status: u16,
    content_type: Option<&str>,
    body: &str,
) -> Result<WebhookReply, WebhookError> {
    let trimmed = body.trim_start();
    let is_html = content_type.is_some_and(|ct| ct.contains("text/html")) || trimmed.starts_with('<');

    if is_html && !trimmed.is_empty() {
        return Ok(WebhookReply::Html {
            status,
            body: body.to_string(),
        });
    }

    if let Ok(json) = serde_json::from_str::<Value>(trimmed) {
        if json.get("success").is_some() {
            return Ok(WebhookReply::Json { status, body: json });
        }
    }

    if (200..300).contains(&status) {
        Ok(WebhookReply::Empty { status })
    } else {
        Err(WebhookError::Upstream { status })
    }
}

#[derive(Clone)]
pub struct WebhookClient {
    http: reqwest::Client,
    url: String,
}

impl WebhookClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    /// POSTs `payload` as JSON once. No retry.
    pub async fn post<T: Serialize + ?Sized>(&self, payload: &T) -> Result<WebhookReply, WebhookError> {
        let response = self
            .http
            .post(&self.url)
            .timeout(WEBHOOK_TIMEOUT)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "webhook request failed");
                WebhookError::Request(e)
            })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        let reply = classify(status, content_type.as_deref(), &body);
        match &reply {
            Ok(WebhookReply::Html { .. }) => {
                tracing::info!(status, "webhook answered with html")
            }
            Ok(_) => tracing::debug!(status, "webhook accepted payload"),
            Err(e) => tracing::warn!(status, error = %e, "webhook rejected payload"),
        }
        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_html_is_forwarded_with_upstream_status() {
        let reply = classify(409, Some("text/html; charset=utf-8"), "<html>dup</html>").unwrap();
        assert_eq!(
            reply,
            WebhookReply::Html {
                status: 409,
                body: "<html>dup</html>".to_string()
            }
        );

        // sniffed without a content type
        assert!(matches!(
            classify(200, None, "  <!DOCTYPE html>"),
            Ok(WebhookReply::Html { status: 200, .. })
        ));
    }

    #[test]
    fn test_json_with_success_flag_is_forwarded() {
        let reply = classify(200, Some("application/json"), r#"{"success":false,"message":"dup"}"#).unwrap();
        assert_eq!(
            reply,
            WebhookReply::Json {
                status: 200,
                body: json!({"success": false, "message": "dup"})
            }
        );
    }

    #[test]
    fn test_other_success_bodies_are_acknowledged() {
        assert_eq!(
            classify(200, Some("application/json"), r#"{"ok":true}"#).unwrap(),
            WebhookReply::Empty { status: 200 }
        );
        assert_eq!(classify(204, None, "").unwrap(), WebhookReply::Empty { status: 204 });
    }

    #[test]
    fn test_failure_without_usable_body_is_an_error() {
        assert!(matches!(
            classify(502, Some("text/plain"), "Bad Gateway"),
            Err(WebhookError::Upstream { status: 502 })
        ));
        assert!(matches!(
            classify(500, Some("text/html"), ""),
            Err(WebhookError::Upstream { status: 500 })
        ));
    }
}
