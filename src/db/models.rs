//! Persisted documents. Each is stored as a camelCase JSON value in the key-value table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_CONTENT_TYPE: &str = "text";

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_string()
}

/// One editable unit of marketing-page text and style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub element_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "type", default = "default_content_type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default)]
    pub styles: BTreeMap<String, String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Editable fields accepted by a content save.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentData {
    #[serde(default)]
    pub text: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub styles: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A superseded version of a content item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub item: ContentItem,
    pub archived_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlueprintStatus {
    Processing,
    Completed,
    Error,
}

impl BlueprintStatus {
    /// Completed and error records never change again.
    pub fn is_final(self) -> bool {
        matches!(self, BlueprintStatus::Completed | BlueprintStatus::Error)
    }
}

impl std::fmt::Display for BlueprintStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlueprintStatus::Processing => write!(f, "processing"),
            BlueprintStatus::Completed => write!(f, "completed"),
            BlueprintStatus::Error => write!(f, "error"),
        }
    }
}

/// Generated document for one form submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlueprintRecord {
    pub submission_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blueprint_content: Option<String>,
    pub status: BlueprintStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stored_at: Option<DateTime<Utc>>,
}

impl BlueprintRecord {
    pub fn processing(submission_id: impl Into<String>) -> Self {
        Self {
            submission_id: submission_id.into(),
            contact_name: None,
            contact_email: None,
            business_description: None,
            blueprint_content: None,
            status: BlueprintStatus::Processing,
            error: None,
            generated_at: None,
            error_at: None,
            stored_at: None,
        }
    }
}

/// Per-client login failure counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginAttempts {
    pub count: u32,
    pub last_attempt: DateTime<Utc>,
    pub locked_until: Option<DateTime<Utc>>,
}

/// Follow-up lead details sent after a blueprint was delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextSteps {
    pub submission_id: Option<String>,
    pub business_name: String,
    pub phone: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "dark" => Some(Theme::Dark),
            "light" => Some(Theme::Light),
            _ => None,
        }
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Theme::Dark => write!(f, "dark"),
            Theme::Light => write!(f, "light"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_item_wire_format_is_camel_case() {
        let item: ContentItem = serde_json::from_value(json!({
            "elementId": "hero-title",
            "text": "AI Solutions",
            "type": "h1",
            "className": "heading",
            "styles": { "color": "#ffffff" }
        }))
        .unwrap();

        assert_eq!(item.kind, "h1");
        assert_eq!(item.class_name.as_deref(), Some("heading"));
        assert_eq!(item.styles.get("color").map(String::as_str), Some("#ffffff"));

        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["elementId"], "hero-title");
        assert_eq!(value["type"], "h1");
    }

    #[test]
    fn test_history_entry_flattens_item() {
        let entry = HistoryEntry {
            item: ContentItem {
                element_id: "a".to_string(),
                text: "old".to_string(),
                kind: "text".to_string(),
                class_name: None,
                styles: BTreeMap::new(),
                created_at: None,
                updated_at: None,
            },
            archived_at: Utc::now(),
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["elementId"], "a");
        assert!(value["archivedAt"].is_string());
    }

    #[test]
    fn test_blueprint_status_finality() {
        assert!(!BlueprintStatus::Processing.is_final());
        assert!(BlueprintStatus::Completed.is_final());
        assert!(BlueprintStatus::Error.is_final());
        assert_eq!(serde_json::to_string(&BlueprintStatus::Error).unwrap(), "\"error\"");
    }

    #[test]
    fn test_theme_parse() {
        assert_eq!(Theme::parse("light"), Some(Theme::Light));
        assert_eq!(Theme::parse("Dark"), None);
        assert_eq!(Theme::default().to_string(), "dark");
    }
}
