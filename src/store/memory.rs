//! Process-local [`KvStore`] used by tests and by local runs without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{KvStore, StoreError};

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// In-memory store. Expired entries are dropped lazily on access.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let now = Utc::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        self.entries.write().await.remove(key);
        Ok(None)
    }

    async fn set(
        &self,
        key: &str,
        value: Value,
        ttl: Option<chrono::Duration>,
    ) -> Result<(), StoreError> {
        let expires_at = ttl.map(|ttl| Utc::now() + ttl);
        self.entries
            .write()
            .await
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let now = Utc::now();
        let removed = self.entries.write().await.remove(key);
        Ok(removed.is_some_and(|entry| entry.is_live(now)))
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.is_live(now));

        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn ping(&self) -> Result<std::time::Duration, StoreError> {
        let start = std::time::Instant::now();
        let _ = self.entries.read().await.len();
        Ok(start.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryStore::new();
        store.set("a", json!({"x": 1}), None).await.unwrap();

        assert_eq!(store.get("a").await.unwrap(), Some(json!({"x": 1})));
        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
        assert_eq!(store.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_entries_are_invisible() {
        let store = MemoryStore::new();
        store
            .set("gone", json!(1), Some(chrono::Duration::seconds(-1)))
            .await
            .unwrap();
        store
            .set("kept", json!(2), Some(chrono::Duration::minutes(5)))
            .await
            .unwrap();

        assert_eq!(store.get("gone").await.unwrap(), None);
        assert_eq!(store.get("kept").await.unwrap(), Some(json!(2)));
        assert_eq!(store.keys("").await.unwrap(), vec!["kept".to_string()]);
    }

    #[tokio::test]
    async fn test_keys_filters_by_prefix_in_order() {
        let store = MemoryStore::new();
        for key in ["content:b", "history:a", "content:a", "contents"] {
            store.set(key, json!(null), None).await.unwrap();
        }

        let keys = store.keys("content:").await.unwrap();
        assert_eq!(keys, vec!["content:a".to_string(), "content:b".to_string()]);
    }
}
