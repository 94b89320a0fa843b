//! In-memory knowledge store, used by tests and demos.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;

use super::traits::{KnowledgeStore, RecordKind, StoredRecord};

type Key = (RecordKind, String, Option<Uuid>);

/// HashMap-backed store with the same last-write-wins semantics as the
/// libSQL backend.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<Key, StoredRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KnowledgeStore for MemoryStore {
    async fn put_record(
        &self,
        kind: RecordKind,
        client_name: &str,
        item_id: Option<Uuid>,
        record: &serde_json::Value,
    ) -> Result<(), StoreError> {
        let key = (kind, client_name.to_string(), item_id);
        let now = Utc::now();
        let mut records = self.records.write().await;
        let created_at = records.get(&key).map(|r| r.created_at).unwrap_or(now);
        records.insert(
            key,
            StoredRecord {
                kind,
                client_name: client_name.to_string(),
                item_id,
                record: record.clone(),
                created_at,
                updated_at: now,
            },
        );
        Ok(())
    }

    async fn get_record(
        &self,
        kind: RecordKind,
        client_name: &str,
    ) -> Result<Option<StoredRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| r.kind == kind && r.client_name == client_name)
            .max_by_key(|r| r.updated_at)
            .cloned())
    }

    async fn list_records(
        &self,
        kind: RecordKind,
        client_name: &str,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        let records = self.records.read().await;
        let mut matches: Vec<StoredRecord> = records
            .values()
            .filter(|r| r.kind == kind && r.client_name == client_name)
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(matches)
    }

    async fn clients(&self) -> Result<Vec<String>, StoreError> {
        let records = self.records.read().await;
        let mut names: Vec<String> = records.values().map(|r| r.client_name.clone()).collect();
        names.sort();
        names.dedup();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn put_and_get_singleton() {
        let store = MemoryStore::new();
        store
            .put_record(
                RecordKind::ClientProfile,
                "Acme Corp",
                None,
                &json!({"industry": "Automotive"}),
            )
            .await
            .unwrap();

        let record = store
            .get_record(RecordKind::ClientProfile, "Acme Corp")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.record["industry"], "Automotive");
        assert!(record.item_id.is_none());
    }

    #[tokio::test]
    async fn singleton_is_last_write_wins() {
        let store = MemoryStore::new();
        store
            .put_record(RecordKind::ClientProfile, "Acme", None, &json!({"v": 1}))
            .await
            .unwrap();
        store
            .put_record(RecordKind::ClientProfile, "Acme", None, &json!({"v": 2}))
            .await
            .unwrap();

        let record = store
            .get_record(RecordKind::ClientProfile, "Acme")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.record["v"], 2);
        assert_eq!(
            store
                .list_records(RecordKind::ClientProfile, "Acme")
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn items_accumulate_per_id() {
        let store = MemoryStore::new();
        store
            .put_record(
                RecordKind::Meeting,
                "Acme",
                Some(Uuid::new_v4()),
                &json!({"n": 1}),
            )
            .await
            .unwrap();
        store
            .put_record(
                RecordKind::Meeting,
                "Acme",
                Some(Uuid::new_v4()),
                &json!({"n": 2}),
            )
            .await
            .unwrap();

        let meetings = store.list_records(RecordKind::Meeting, "Acme").await.unwrap();
        assert_eq!(meetings.len(), 2);
    }

    #[tokio::test]
    async fn clients_are_isolated() {
        let store = MemoryStore::new();
        store
            .put_record(RecordKind::Insight, "Acme", Some(Uuid::new_v4()), &json!({}))
            .await
            .unwrap();
        store
            .put_record(RecordKind::Insight, "Globex", Some(Uuid::new_v4()), &json!({}))
            .await
            .unwrap();

        assert_eq!(
            store.list_records(RecordKind::Insight, "Acme").await.unwrap().len(),
            1
        );
        assert_eq!(store.clients().await.unwrap(), vec!["Acme", "Globex"]);
        assert!(
            store
                .get_record(RecordKind::Meeting, "Acme")
                .await
                .unwrap()
                .is_none()
        );
    }
}
