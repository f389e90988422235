//! Document store contract and in-memory implementation.
//!
//! The store is the source of truth for generated documents; the TTL cache
//! in front of it is an optimization only.

use async_trait::async_trait;
use fincache_core::{
    compare_versions, DocumentClass, FincacheResult, SubjectKey, Timestamp, UpsertOutcome,
    VersionedDocument,
};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Persistent store of versioned documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert or update by natural key `(subject, class, version_label)`.
    ///
    /// Returns [`UpsertOutcome::Unchanged`] when the stored document already
    /// has the same content hash.
    async fn upsert(&self, document: &VersionedDocument) -> FincacheResult<UpsertOutcome>;

    /// Latest unexpired document for a subject and class.
    ///
    /// "Latest" is by version ordering; ties (including unparsable labels)
    /// go to the most recent `fetched_at`.
    async fn find_latest(
        &self,
        subject: &SubjectKey,
        class: DocumentClass,
        not_expired_as_of: Timestamp,
    ) -> FincacheResult<Option<VersionedDocument>>;
}

#[async_trait]
impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    async fn upsert(&self, document: &VersionedDocument) -> FincacheResult<UpsertOutcome> {
        (**self).upsert(document).await
    }

    async fn find_latest(
        &self,
        subject: &SubjectKey,
        class: DocumentClass,
        not_expired_as_of: Timestamp,
    ) -> FincacheResult<Option<VersionedDocument>> {
        (**self).find_latest(subject, class, not_expired_as_of).await
    }
}

/// Order two documents of the same subject/class by recency.
///
/// Only valid within one class: its labels share a granularity, which keeps
/// the label comparison consistent.
pub fn by_recency(a: &VersionedDocument, b: &VersionedDocument) -> Ordering {
    compare_versions(&a.version_label, &b.version_label)
        .then_with(|| a.fetched_at.cmp(&b.fetched_at))
}

type NaturalKey = (SubjectKey, DocumentClass, String);

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// In-memory document store for tests and single-process deployments.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDocumentStore {
    documents: Arc<RwLock<HashMap<NaturalKey, VersionedDocument>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents, expired ones included.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.documents.write().await.clear();
    }

    /// Every stored version for a subject and class, oldest first.
    pub async fn versions(&self, subject: &SubjectKey, class: DocumentClass) -> Vec<VersionedDocument> {
        let documents = self.documents.read().await;
        let mut found: Vec<VersionedDocument> = documents
            .values()
            .filter(|d| &d.subject_key == subject && d.document_class == class)
            .cloned()
            .collect();
        found.sort_by(by_recency);
        found
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn upsert(&self, document: &VersionedDocument) -> FincacheResult<UpsertOutcome> {
        let key = (
            document.subject_key.clone(),
            document.document_class,
            document.version_label.clone(),
        );
        let mut documents = self.documents.write().await;
        let outcome = match documents.get(&key) {
            Some(existing) if existing.content_hash == document.content_hash => {
                return Ok(UpsertOutcome::Unchanged);
            }
            Some(_) => UpsertOutcome::Updated,
            None => UpsertOutcome::Inserted,
        };
        documents.insert(key, document.clone());
        Ok(outcome)
    }

    async fn find_latest(
        &self,
        subject: &SubjectKey,
        class: DocumentClass,
        not_expired_as_of: Timestamp,
    ) -> FincacheResult<Option<VersionedDocument>> {
        let documents = self.documents.read().await;
        Ok(documents
            .values()
            .filter(|d| {
                &d.subject_key == subject
                    && d.document_class == class
                    && !d.is_expired(not_expired_as_of)
            })
            .max_by(|a, b| by_recency(a, b))
            .cloned())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use fincache_core::DataQuality;
    use serde_json::json;
    use std::time::Duration;

    const DAY: u64 = 86_400;

    fn at(day: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2025, 1, day, 0, 0, 0).unwrap()
    }

    fn doc(label: &str, fetched: Timestamp, payload: serde_json::Value) -> VersionedDocument {
        VersionedDocument::new(
            SubjectKey::new("HDFC").unwrap(),
            DocumentClass::Quarterly,
            label,
            payload,
            fetched,
            Duration::from_secs(90 * DAY),
            DataQuality::clean(),
        )
    }

    #[tokio::test]
    async fn test_upsert_outcomes() {
        let store = InMemoryDocumentStore::new();
        let d = doc("Q3FY25", at(1), json!({"v": 1}));
        assert_eq!(store.upsert(&d).await.unwrap(), UpsertOutcome::Inserted);
        assert_eq!(store.upsert(&d).await.unwrap(), UpsertOutcome::Unchanged);
        let changed = doc("Q3FY25", at(2), json!({"v": 2}));
        assert_eq!(store.upsert(&changed).await.unwrap(), UpsertOutcome::Updated);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_find_latest_by_version_not_insert_order() {
        let store = InMemoryDocumentStore::new();
        store.upsert(&doc("Q3FY25", at(1), json!({"q": 3}))).await.unwrap();
        store.upsert(&doc("Q1FY26", at(2), json!({"q": 1}))).await.unwrap();
        store.upsert(&doc("Q4FY25", at(3), json!({"q": 4}))).await.unwrap();

        let subject = SubjectKey::new("hdfc").unwrap();
        let latest = store
            .find_latest(&subject, DocumentClass::Quarterly, at(10))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.version_label, "Q1FY26");
    }

    #[tokio::test]
    async fn test_find_latest_skips_expired() {
        let store = InMemoryDocumentStore::new();
        store.upsert(&doc("Q3FY25", at(1), json!({}))).await.unwrap();
        let subject = SubjectKey::new("HDFC").unwrap();
        let much_later = at(1) + chrono::Duration::days(91);
        let found = store
            .find_latest(&subject, DocumentClass::Quarterly, much_later)
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_find_latest_filters_class_and_subject() {
        let store = InMemoryDocumentStore::new();
        store.upsert(&doc("Q3FY25", at(1), json!({}))).await.unwrap();
        let other = SubjectKey::new("INFY").unwrap();
        assert!(store
            .find_latest(&other, DocumentClass::Quarterly, at(2))
            .await
            .unwrap()
            .is_none());
        let subject = SubjectKey::new("HDFC").unwrap();
        assert!(store
            .find_latest(&subject, DocumentClass::Annual, at(2))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_ties_go_to_latest_fetch() {
        let store = InMemoryDocumentStore::new();
        store.upsert(&doc("unknown-a", at(1), json!({"n": 1}))).await.unwrap();
        store.upsert(&doc("unknown-b", at(5), json!({"n": 2}))).await.unwrap();
        let subject = SubjectKey::new("HDFC").unwrap();
        let latest = store
            .find_latest(&subject, DocumentClass::Quarterly, at(6))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.version_label, "unknown-b");

        let versions = store.versions(&subject, DocumentClass::Quarterly).await;
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].version_label, "unknown-a");
    }
}
