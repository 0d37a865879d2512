//! Editable site content and its revision history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{get_json, set_json, KvStore, StoreError};
use crate::db::models::{ContentData, ContentItem, HistoryEntry, DEFAULT_CONTENT_TYPE};

const CONTENT_PREFIX: &str = "content:";
const HISTORY_PREFIX: &str = "history:";

/// Versions kept per element, newest first.
pub const MAX_HISTORY_ENTRIES: usize = 50;

pub const EXPORT_VERSION: &str = "1.0";

/// One entry of a bulk update request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentUpdate {
    pub element_id: String,
    pub content_data: ContentData,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkResult {
    pub success: usize,
    pub failed: usize,
}

/// Element scanned from the live page by the admin panel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannedElement {
    #[serde(default)]
    pub element_id: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub styles: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitAction {
    Initialized,
    Updated,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitResult {
    pub element_id: Option<String>,
    pub action: InitAction,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitStats {
    pub total: usize,
    pub initialized: usize,
    pub updated: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitializeReport {
    pub stats: InitStats,
    pub results: Vec<InitResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentExport {
    pub exported_at: DateTime<Utc>,
    pub version: String,
    pub content_count: usize,
    pub content: Vec<ContentItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportIssue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportReport {
    pub imported: usize,
    pub errors: Vec<ImportIssue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportItem {
    #[serde(default)]
    element_id: Option<String>,
    #[serde(flatten)]
    data: ContentData,
}

fn default_styles() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("color".to_string(), "#000000".to_string()),
        ("fontSize".to_string(), "16px".to_string()),
    ])
}

/// Repository for [`ContentItem`]s.
#[derive(Clone)]
pub struct ContentStore {
    store: Arc<dyn KvStore>,
}

impl ContentStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    fn content_key(element_id: &str) -> String {
        format!("{CONTENT_PREFIX}{element_id}")
    }

    fn history_key(element_id: &str) -> String {
        format!("{HISTORY_PREFIX}{element_id}")
    }

    pub async fn get(&self, element_id: &str) -> Result<Option<ContentItem>, StoreError> {
        get_json(self.store.as_ref(), &Self::content_key(element_id)).await
    }

    /// All items ordered by element id.
    pub async fn get_all(&self) -> Result<Vec<ContentItem>, StoreError> {
        let keys = self.store.keys(CONTENT_PREFIX).await?;
        let mut items = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(item) = get_json::<ContentItem>(self.store.as_ref(), &key).await? {
                items.push(item);
            }
        }
        items.sort_by(|a, b| a.element_id.cmp(&b.element_id));
        Ok(items)
    }

    /// Upserts an item. A previous version, if any, is archived to history.
    pub async fn save(
        &self,
        element_id: &str,
        data: ContentData,
    ) -> Result<ContentItem, StoreError> {
        let existing = self.get(element_id).await?;
        let now = Utc::now();

        let item = ContentItem {
            element_id: element_id.to_string(),
            text: data.text,
            kind: data
                .kind
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            class_name: data.class_name,
            styles: data.styles.unwrap_or_default(),
            created_at: existing
                .as_ref()
                .and_then(|previous| previous.created_at)
                .or(data.created_at)
                .or(Some(now)),
            updated_at: Some(now),
        };

        set_json(
            self.store.as_ref(),
            &Self::content_key(element_id),
            &item,
            None,
        )
        .await?;

        if let Some(previous) = existing {
            self.archive(previous, now).await?;
        }

        tracing::debug!(element_id = %element_id, "content saved");
        Ok(item)
    }

    async fn archive(&self, previous: ContentItem, at: DateTime<Utc>) -> Result<(), StoreError> {
        let key = Self::history_key(&previous.element_id);
        let mut history: Vec<HistoryEntry> = get_json(self.store.as_ref(), &key)
            .await?
            .unwrap_or_default();

        history.insert(
            0,
            HistoryEntry {
                item: previous,
                archived_at: at,
            },
        );
        history.truncate(MAX_HISTORY_ENTRIES);

        set_json(self.store.as_ref(), &key, &history, None).await
    }

    /// Previous versions, newest first.
    pub async fn history(&self, element_id: &str) -> Result<Vec<HistoryEntry>, StoreError> {
        Ok(get_json(self.store.as_ref(), &Self::history_key(element_id))
            .await?
            .unwrap_or_default())
    }

    /// Removes the item. Its history is kept.
    pub async fn delete(&self, element_id: &str) -> Result<bool, StoreError> {
        self.store.delete(&Self::content_key(element_id)).await
    }

    pub async fn bulk_update(&self, updates: Vec<ContentUpdate>) -> BulkResult {
        let mut result = BulkResult::default();
        for update in updates {
            match self.save(&update.element_id, update.content_data).await {
                Ok(_) => result.success += 1,
                Err(e) => {
                    tracing::error!(element_id = %update.element_id, error = %e, "bulk update failed");
                    result.failed += 1;
                }
            }
        }
        result
    }

    /// Seeds content from elements scanned on the page.
    ///
    /// Missing elements are created, elements whose text changed are updated,
    /// everything else is skipped.
    pub async fn initialize(&self, elements: Vec<ScannedElement>) -> InitializeReport {
        let mut report = InitializeReport {
            stats: InitStats {
                total: elements.len(),
                ..InitStats::default()
            },
            results: Vec::with_capacity(elements.len()),
        };

        for element in elements {
            let Some(element_id) = element.element_id.clone().filter(|id| !id.is_empty()) else {
                tracing::warn!("skipping scanned element without elementId");
                report.stats.skipped += 1;
                report.results.push(InitResult {
                    element_id: None,
                    action: InitAction::Skipped,
                    kind: element.kind,
                });
                continue;
            };

            let action = match self.initialize_one(&element_id, element.clone()).await {
                Ok(action) => action,
                Err(e) => {
                    tracing::error!(element_id = %element_id, error = %e, "content initialization failed");
                    InitAction::Failed
                }
            };

            match action {
                InitAction::Initialized => report.stats.initialized += 1,
                InitAction::Updated => report.stats.updated += 1,
                InitAction::Skipped | InitAction::Failed => report.stats.skipped += 1,
            }
            report.results.push(InitResult {
                element_id: Some(element_id),
                action,
                kind: element.kind,
            });
        }

        tracing::info!(
            total = report.stats.total,
            initialized = report.stats.initialized,
            updated = report.stats.updated,
            skipped = report.stats.skipped,
            "content initialization complete"
        );
        report
    }

    async fn initialize_one(
        &self,
        element_id: &str,
        element: ScannedElement,
    ) -> Result<InitAction, StoreError> {
        match self.get(element_id).await? {
            Some(existing) if existing.text == element.text => Ok(InitAction::Skipped),
            Some(existing) => {
                self.save(
                    element_id,
                    ContentData {
                        text: element.text,
                        kind: element.kind.or(Some(existing.kind)),
                        class_name: element.class_name.or(existing.class_name),
                        styles: element.styles.or(Some(existing.styles)),
                        created_at: None,
                    },
                )
                .await?;
                Ok(InitAction::Updated)
            }
            None => {
                self.save(
                    element_id,
                    ContentData {
                        text: element.text,
                        kind: element.kind,
                        class_name: element.class_name,
                        styles: element.styles.or_else(|| Some(default_styles())),
                        created_at: Some(Utc::now()),
                    },
                )
                .await?;
                Ok(InitAction::Initialized)
            }
        }
    }

    pub async fn export(&self) -> Result<ContentExport, StoreError> {
        let content = self.get_all().await?;
        Ok(ContentExport {
            exported_at: Utc::now(),
            version: EXPORT_VERSION.to_string(),
            content_count: content.len(),
            content,
        })
    }

    /// Restores items from an [`ContentExport`]-shaped document.
    pub async fn import(&self, data: &Value) -> ImportReport {
        let mut report = ImportReport::default();

        let Some(items) = data.get("content").and_then(Value::as_array) else {
            report.errors.push(ImportIssue {
                element_id: None,
                error: "Invalid data format".to_string(),
            });
            return report;
        };

        for raw in items {
            let item: ImportItem = match serde_json::from_value(raw.clone()) {
                Ok(item) => item,
                Err(e) => {
                    report.errors.push(ImportIssue {
                        element_id: raw
                            .get("elementId")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            let Some(element_id) = item.element_id.filter(|id| !id.is_empty()) else {
                report.errors.push(ImportIssue {
                    element_id: None,
                    error: "elementId is required".to_string(),
                });
                continue;
            };

            match self.save(&element_id, item.data).await {
                Ok(_) => report.imported += 1,
                Err(e) => report.errors.push(ImportIssue {
                    element_id: Some(element_id),
                    error: e.to_string(),
                }),
            }
        }

        report
    }
}
