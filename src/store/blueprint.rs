//! Blueprint records keyed by submission id, with a secondary email index.

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use super::{get_json, set_json, KvStore, StoreError};
use crate::db::models::{BlueprintRecord, BlueprintStatus, NextSteps};

const BLUEPRINT_PREFIX: &str = "blueprint:";
const EMAIL_INDEX_PREFIX: &str = "blueprint-email:";
const NEXT_STEPS_PREFIX: &str = "next-steps:";

#[derive(Debug, thiserror::Error)]
pub enum BlueprintError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("blueprint {0} is already finalized")]
    Finalized(String),
}

#[derive(Clone)]
pub struct BlueprintStore {
    store: Arc<dyn KvStore>,
    ttl: Option<chrono::Duration>,
}

/// Index key for an email address. Case and surrounding whitespace are ignored.
pub fn email_index_key(email: &str) -> String {
    let digest = Sha256::digest(email.trim().to_lowercase().as_bytes());
    format!("{EMAIL_INDEX_PREFIX}{digest:x}")
}

fn record_key(submission_id: &str) -> String {
    format!("{BLUEPRINT_PREFIX}{submission_id}")
}

impl BlueprintStore {
    /// `ttl` of `None` keeps records forever.
    pub fn new(store: Arc<dyn KvStore>, ttl: Option<chrono::Duration>) -> Self {
        Self { store, ttl }
    }

    async fn ensure_not_final(&self, submission_id: &str) -> Result<(), BlueprintError> {
        match self.retrieve(submission_id).await? {
            Some(existing) if existing.status.is_final() => {
                Err(BlueprintError::Finalized(submission_id.to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Writes a generated (or failed) blueprint and indexes its email.
    pub async fn store(
        &self,
        submission_id: &str,
        mut record: BlueprintRecord,
    ) -> Result<BlueprintRecord, BlueprintError> {
        self.ensure_not_final(submission_id).await?;

        record.submission_id = submission_id.to_string();
        record.stored_at = Some(Utc::now());
        set_json(
            self.store.as_ref(),
            &record_key(submission_id),
            &record,
            self.ttl,
        )
        .await?;

        if let Some(email) = record.contact_email.as_deref().filter(|e| !e.trim().is_empty()) {
            set_json(
                self.store.as_ref(),
                &email_index_key(email),
                &submission_id,
                self.ttl,
            )
            .await?;
        }

        tracing::info!(
            submission_id = %submission_id,
            status = %record.status,
            "blueprint stored"
        );
        Ok(record)
    }

    /// Records a submission that is waiting on the generator. The email index
    /// is left alone so a pending submission never shadows a finished one.
    pub async fn mark_processing(
        &self,
        submission_id: &str,
        mut record: BlueprintRecord,
    ) -> Result<(), BlueprintError> {
        self.ensure_not_final(submission_id).await?;

        record.submission_id = submission_id.to_string();
        record.status = BlueprintStatus::Processing;
        record.stored_at = Some(Utc::now());
        set_json(
            self.store.as_ref(),
            &record_key(submission_id),
            &record,
            self.ttl,
        )
        .await?;
        Ok(())
    }

    pub async fn retrieve(&self, submission_id: &str) -> Result<Option<BlueprintRecord>, StoreError> {
        get_json(self.store.as_ref(), &record_key(submission_id)).await
    }

    pub async fn retrieve_by_email(&self, email: &str) -> Result<Option<BlueprintRecord>, StoreError> {
        let submission_id: Option<String> =
            get_json(self.store.as_ref(), &email_index_key(email)).await?;

        match submission_id {
            Some(id) => self.retrieve(&id).await,
            None => Ok(None),
        }
    }

    pub async fn exists(&self, submission_id: &str) -> Result<bool, StoreError> {
        Ok(self.store.get(&record_key(submission_id)).await?.is_some())
    }

    /// Removes the record, and its email index entry when that entry points here.
    pub async fn delete(&self, submission_id: &str) -> Result<bool, StoreError> {
        let Some(record) = self.retrieve(submission_id).await? else {
            return Ok(false);
        };

        if let Some(email) = record.contact_email.as_deref() {
            let key = email_index_key(email);
            let indexed: Option<String> = get_json(self.store.as_ref(), &key).await?;
            if indexed.as_deref() == Some(submission_id) {
                self.store.delete(&key).await?;
            }
        }

        let removed = self.store.delete(&record_key(submission_id)).await?;
        tracing::debug!(submission_id = %submission_id, "blueprint deleted");
        Ok(removed)
    }

    /// Submission ids of every stored record.
    pub async fn list_all(&self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .store
            .keys(BLUEPRINT_PREFIX)
            .await?
            .into_iter()
            .filter_map(|key| key.strip_prefix(BLUEPRINT_PREFIX).map(str::to_string))
            .collect())
    }

    pub async fn attach_next_steps(&self, next_steps: &NextSteps) -> Result<(), StoreError> {
        let Some(submission_id) = next_steps.submission_id.as_deref() else {
            return Ok(());
        };
        set_json(
            self.store.as_ref(),
            &format!("{NEXT_STEPS_PREFIX}{submission_id}"),
            next_steps,
            self.ttl,
        )
        .await
    }

    pub async fn next_steps(&self, submission_id: &str) -> Result<Option<NextSteps>, StoreError> {
        get_json(
            self.store.as_ref(),
            &format!("{NEXT_STEPS_PREFIX}{submission_id}"),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn blueprints() -> BlueprintStore {
        BlueprintStore::new(Arc::new(MemoryStore::new()), None)
    }

    fn completed(id: &str, email: &str) -> BlueprintRecord {
        BlueprintRecord {
            contact_name: Some("Jane Doe".to_string()),
            contact_email: Some(email.to_string()),
            blueprint_content: Some("## Plan".to_string()),
            status: BlueprintStatus::Completed,
            generated_at: Some(Utc::now()),
            ..BlueprintRecord::processing(id)
        }
    }

    #[test]
    fn test_email_index_key_is_case_insensitive() {
        assert_eq!(
            email_index_key("Jane@Example.com "),
            email_index_key("jane@example.com")
        );
        assert!(email_index_key("a@b.co").starts_with(EMAIL_INDEX_PREFIX));
        assert_eq!(email_index_key("a@b.co").len(), EMAIL_INDEX_PREFIX.len() + 64);
    }

    #[tokio::test]
    async fn test_store_then_retrieve_by_email() {
        let store = blueprints();
        store
            .store("sub-1", completed("sub-1", "jane@example.com"))
            .await
            .unwrap();

        let found = store
            .retrieve_by_email("JANE@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.submission_id, "sub-1");
        assert!(found.stored_at.is_some());
        assert!(store.exists("sub-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_differs_from_error_status() {
        let store = blueprints();
        let failed = BlueprintRecord {
            status: BlueprintStatus::Error,
            error: Some("generation failed".to_string()),
            error_at: Some(Utc::now()),
            ..BlueprintRecord::processing("sub-err")
        };
        store.store("sub-err", failed).await.unwrap();

        assert!(store.retrieve("never-stored").await.unwrap().is_none());
        let found = store.retrieve("sub-err").await.unwrap().unwrap();
        assert_eq!(found.status, BlueprintStatus::Error);
    }

    #[tokio::test]
    async fn test_finalized_record_cannot_be_overwritten() {
        let store = blueprints();
        store.mark_processing("sub-2", BlueprintRecord::processing("sub-2")).await.unwrap();
        store
            .store("sub-2", completed("sub-2", "a@example.com"))
            .await
            .unwrap();

        let err = store
            .store("sub-2", completed("sub-2", "b@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, BlueprintError::Finalized(id) if id == "sub-2"));
        assert!(store.retrieve_by_email("b@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mark_processing_does_not_index_email() {
        let store = blueprints();
        let pending = BlueprintRecord {
            contact_email: Some("p@example.com".to_string()),
            ..BlueprintRecord::processing("sub-3")
        };
        store.mark_processing("sub-3", pending).await.unwrap();

        assert!(store.retrieve_by_email("p@example.com").await.unwrap().is_none());
        assert_eq!(
            store.retrieve("sub-3").await.unwrap().unwrap().status,
            BlueprintStatus::Processing
        );
    }

    #[tokio::test]
    async fn test_delete_keeps_index_owned_by_newer_record() {
        let store = blueprints();
        let mut older = completed("old", "same@example.com");
        older.status = BlueprintStatus::Error;
        store.store("old", older).await.unwrap();
        store
            .store("new", completed("new", "same@example.com"))
            .await
            .unwrap();

        assert!(store.delete("old").await.unwrap());
        let found = store.retrieve_by_email("same@example.com").await.unwrap().unwrap();
        assert_eq!(found.submission_id, "new");

        assert!(store.delete("new").await.unwrap());
        assert!(store.retrieve_by_email("same@example.com").await.unwrap().is_none());
        assert!(!store.delete("new").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_all_and_next_steps() {
        let store = blueprints();
        store.store("b", completed("b", "b@example.com")).await.unwrap();
        store.store("a", completed("a", "a@example.com")).await.unwrap();
        assert_eq!(store.list_all().await.unwrap(), vec!["a", "b"]);

        let next = NextSteps {
            submission_id: Some("a".to_string()),
            business_name: "Acme".to_string(),
            phone: "+1 555 0100".to_string(),
            submitted_at: Utc::now(),
        };
        store.attach_next_steps(&next).await.unwrap();
        assert_eq!(store.next_steps("a").await.unwrap(), Some(next));
    }
}
