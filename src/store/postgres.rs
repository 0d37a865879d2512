//! PostgreSQL-backed [`KvStore`] over the `kv_entries` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use std::sync::Arc;

use super::{KvStore, StoreError};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: Arc<PgPool>,
}

impl PgStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Deletes rows whose TTL has passed. Reads already ignore them.
    pub async fn purge_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "DELETE FROM kv_entries WHERE expires_at IS NOT NULL AND expires_at <= now()",
        )
        .execute(self.pool.as_ref())
        .await?;
        Ok(result.rows_affected())
    }
}

/// Escapes LIKE metacharacters so a prefix is matched literally.
fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[async_trait]
impl KvStore for PgStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let row: Option<(Value,)> = sqlx::query_as(
            r#"
            SELECT value FROM kv_entries
            WHERE key = $1 AND (expires_at IS NULL OR expires_at > now())
            "#,
        )
        .bind(key)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(|(value,)| value))
    }

    async fn set(
        &self,
        key: &str,
        value: Value,
        ttl: Option<chrono::Duration>,
    ) -> Result<(), StoreError> {
        let expires_at: Option<DateTime<Utc>> = ttl.map(|ttl| Utc::now() + ttl);

        sqlx::query(
            r#"
            INSERT INTO kv_entries (key, value, expires_at, updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (key) DO UPDATE SET
                value = EXCLUDED.value,
                expires_at = EXCLUDED.expires_at,
                updated_at = now()
            "#,
        )
        .bind(key)
        .bind(&value)
        .bind(expires_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "DELETE FROM kv_entries WHERE key = $1 AND (expires_at IS NULL OR expires_at > now())",
        )
        .bind(key)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT key FROM kv_entries
            WHERE key LIKE $1 ESCAPE '\'
              AND (expires_at IS NULL OR expires_at > now())
            ORDER BY key ASC
            "#,
        )
        .bind(like_prefix(prefix))
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.into_iter().map(|(key,)| key).collect())
    }

    async fn ping(&self) -> Result<std::time::Duration, StoreError> {
        let start = std::time::Instant::now();
        sqlx::query("SELECT 1").fetch_one(self.pool.as_ref()).await?;
        Ok(start.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_prefix_escapes_metacharacters() {
        assert_eq!(like_prefix("content:"), "content:%");
        assert_eq!(like_prefix("a_b%c"), "a\\_b\\%c%");
        assert_eq!(like_prefix("x\\y"), "x\\\\y%");
    }
}
