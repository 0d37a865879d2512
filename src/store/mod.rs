//! Key-value storage.
//!
//! Every piece of mutable state the site keeps (content items, blueprint
//! records, login counters, site settings) is a JSON document behind the
//! [`KvStore`] trait. Handlers never touch a backend directly; they go through
//! the typed repositories in this module which are handed an
//! `Arc<dyn KvStore>` at startup.
//!
//! ## Key layout
//!
//! ```text
//! content:{elementId}              → ContentItem
//! history:{elementId}              → [HistoryEntry] (newest first)
//! blueprint:{submissionId}         → BlueprintRecord
//! blueprint-email:{sha256(email)}  → submissionId
//! next-steps:{submissionId}        → NextSteps
//! ratelimit:login:{client}         → LoginAttempts (expires with the window)
//! site:config | site:css-overrides | site:theme
//! ```

pub mod blueprint;
pub mod content;
pub mod memory;
pub mod postgres;
pub mod rate_limit;
pub mod site;

pub use blueprint::{BlueprintError, BlueprintStore};
pub use content::ContentStore;
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use rate_limit::{LoginRateLimiter, RateLimitStatus};
pub use site::SiteSettingsStore;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

/// Errors raised by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error for key '{key}': {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Minimal async key-value capability shared by all backends.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Returns the value stored under `key`, ignoring expired entries.
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Inserts or replaces `key`. `ttl` of `None` keeps the entry forever.
    async fn set(
        &self,
        key: &str,
        value: Value,
        ttl: Option<chrono::Duration>,
    ) -> Result<(), StoreError>;

    /// Removes `key`, returning whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Lists live keys starting with `prefix`, sorted ascending.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Round-trips the backend and reports the latency.
    async fn ping(&self) -> Result<std::time::Duration, StoreError>;
}

/// Reads `key` and deserializes it into `T`.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn KvStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(key).await? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|source| StoreError::Serialization {
                key: key.to_string(),
                source,
            }),
        None => Ok(None),
    }
}

/// Serializes `value` and writes it under `key`.
pub async fn set_json<T: Serialize>(
    store: &dyn KvStore,
    key: &str,
    value: &T,
    ttl: Option<chrono::Duration>,
) -> Result<(), StoreError> {
    let value = serde_json::to_value(value).map_err(|source| StoreError::Serialization {
        key: key.to_string(),
        source,
    })?;
    store.set(key, value, ttl).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[tokio::test]
    async fn test_json_helpers_round_trip_typed_documents() {
        let store = MemoryStore::new();
        let sample = Sample {
            name: "hero".to_string(),
            count: 3,
        };
        set_json(&store, "sample:1", &sample, None).await.unwrap();

        let loaded: Option<Sample> = get_json(&store, "sample:1").await.unwrap();
        assert_eq!(loaded, Some(sample));
    }

    #[tokio::test]
    async fn test_get_json_reports_shape_mismatch() {
        let store = MemoryStore::new();
        store
            .set("sample:bad", serde_json::json!("not an object"), None)
            .await
            .unwrap();

        let err = get_json::<Sample>(&store, "sample:bad").await.unwrap_err();
        assert!(matches!(err, StoreError::Serialization { .. }));
        assert!(err.to_string().contains("sample:bad"));
    }
}
