//! libSQL backend — async `KnowledgeStore` implementation.
//!
//! Supports local file and in-memory databases. One `records` table holds
//! every kind, keyed by `(kind, client_name, item_id)`; singleton kinds use
//! an empty item id, so an upsert gives last-write-wins per client.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::info;
use uuid::Uuid;

use crate::error::StoreError;

use super::traits::{KnowledgeStore, RecordKind, StoredRecord};

const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS records (
    kind        TEXT NOT NULL,
    client_name TEXT NOT NULL,
    item_id     TEXT NOT NULL DEFAULT '',
    record      TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    PRIMARY KEY (kind, client_name, item_id)
);
CREATE INDEX IF NOT EXISTS idx_records_client ON records (client_name);";

/// libSQL knowledge store backend.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and initialize the schema.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to open database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Knowledge store opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to create database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA.split(';').filter(|s| !s.trim().is_empty()) {
            self.conn
                .execute(statement, ())
                .await
                .map_err(|e| StoreError::Query(format!("Schema init failed: {e}")))?;
        }
        Ok(())
    }
}

/// Parse an RFC 3339 timestamp from the DB (our canonical write format).
fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Map a row to a StoredRecord.
///
/// Column order: 0:kind, 1:client_name, 2:item_id, 3:record, 4:created_at,
/// 5:updated_at.
fn row_to_record(row: &libsql::Row) -> Result<StoredRecord, StoreError> {
    let kind_str: String = row
        .get(0)
        .map_err(|e| StoreError::Query(format!("bad kind column: {e}")))?;
    let client_name: String = row
        .get(1)
        .map_err(|e| StoreError::Query(format!("bad client column: {e}")))?;
    let item_id_str: String = row
        .get(2)
        .map_err(|e| StoreError::Query(format!("bad item_id column: {e}")))?;
    let record_str: String = row
        .get(3)
        .map_err(|e| StoreError::Query(format!("bad record column: {e}")))?;
    let created_str: String = row
        .get(4)
        .map_err(|e| StoreError::Query(format!("bad created_at column: {e}")))?;
    let updated_str: String = row
        .get(5)
        .map_err(|e| StoreError::Query(format!("bad updated_at column: {e}")))?;

    let kind = RecordKind::from_str_opt(&kind_str)
        .ok_or_else(|| StoreError::Query(format!("unknown record kind: {kind_str}")))?;
    let record = serde_json::from_str(&record_str)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    let item_id = if item_id_str.is_empty() {
        None
    } else {
        Uuid::parse_str(&item_id_str).ok()
    };

    Ok(StoredRecord {
        kind,
        client_name,
        item_id,
        record,
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

#[async_trait]
impl KnowledgeStore for LibSqlBackend {
    async fn put_record(
        &self,
        kind: RecordKind,
        client_name: &str,
        item_id: Option<Uuid>,
        record: &serde_json::Value,
    ) -> Result<(), StoreError> {
        let record_str =
            serde_json::to_string(record).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let now = Utc::now().to_rfc3339();
        let item_id_str = item_id.map(|id| id.to_string()).unwrap_or_default();

        self.conn
            .execute(
                "INSERT INTO records (kind, client_name, item_id, record, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (kind, client_name, item_id)
                 DO UPDATE SET record = excluded.record, updated_at = excluded.updated_at",
                params![
                    kind.as_str(),
                    client_name,
                    item_id_str,
                    record_str,
                    now.clone(),
                    now
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("put_record failed: {e}")))?;
        Ok(())
    }

    async fn get_record(
        &self,
        kind: RecordKind,
        client_name: &str,
    ) -> Result<Option<StoredRecord>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT kind, client_name, item_id, record, created_at, updated_at
                 FROM records WHERE kind = ?1 AND client_name = ?2
                 ORDER BY updated_at DESC LIMIT 1",
                params![kind.as_str(), client_name],
            )
            .await
            .map_err(|e| StoreError::Query(format!("get_record failed: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?
        {
            Some(row) => Ok(Some(row_to_record(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_records(
        &self,
        kind: RecordKind,
        client_name: &str,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT kind, client_name, item_id, record, created_at, updated_at
                 FROM records WHERE kind = ?1 AND client_name = ?2
                 ORDER BY updated_at DESC",
                params![kind.as_str(), client_name],
            )
            .await
            .map_err(|e| StoreError::Query(format!("list_records failed: {e}")))?;

        let mut records = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?
        {
            records.push(row_to_record(&row)?);
        }
        Ok(records)
    }

    async fn clients(&self) -> Result<Vec<String>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT DISTINCT client_name FROM records ORDER BY client_name",
                (),
            )
            .await
            .map_err(|e| StoreError::Query(format!("clients failed: {e}")))?;

        let mut names = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?
        {
            let name: String = row
                .get(0)
                .map_err(|e| StoreError::Query(e.to_string()))?;
            names.push(name);
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn roundtrip_in_memory() {
        let store = LibSqlBackend::new_memory().await.unwrap();
        store
            .put_record(
                RecordKind::DomainKnowledge,
                "Acme Corp",
                None,
                &json!({"best_practices": ["Define KPIs early"]}),
            )
            .await
            .unwrap();

        let record = store
            .get_record(RecordKind::DomainKnowledge, "Acme Corp")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.kind, RecordKind::DomainKnowledge);
        assert_eq!(record.record["best_practices"][0], "Define KPIs early");
    }

    #[tokio::test]
    async fn upsert_replaces_singleton() {
        let store = LibSqlBackend::new_memory().await.unwrap();
        store
            .put_record(RecordKind::ClientProfile, "Acme", None, &json!({"v": 1}))
            .await
            .unwrap();
        store
            .put_record(RecordKind::ClientProfile, "Acme", None, &json!({"v": 2}))
            .await
            .unwrap();

        let records = store
            .list_records(RecordKind::ClientProfile, "Acme")
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].record["v"], 2);
    }

    #[tokio::test]
    async fn meetings_keep_item_ids() {
        let store = LibSqlBackend::new_memory().await.unwrap();
        let first = Uuid::new_v4();
        store
            .put_record(RecordKind::Meeting, "Acme", Some(first), &json!({"n": 1}))
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
        assert!(meetings.iter().any(|m| m.item_id == Some(first)));
    }

    #[tokio::test]
    async fn persists_to_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("knowledge.db");

        {
            let store = LibSqlBackend::new_local(&path).await.unwrap();
            store
                .put_record(RecordKind::ClientProfile, "Acme", None, &json!({"v": 1}))
                .await
                .unwrap();
        }

        let store = LibSqlBackend::new_local(&path).await.unwrap();
        let record = store
            .get_record(RecordKind::ClientProfile, "Acme")
            .await
            .unwrap();
        assert!(record.is_some());
    }

    #[tokio::test]
    async fn clients_listed_once() {
        let store = LibSqlBackend::new_memory().await.unwrap();
        store
            .put_record(RecordKind::ClientProfile, "Acme", None, &json!({}))
            .await
            .unwrap();
        store
            .put_record(RecordKind::DomainKnowledge, "Acme", None, &json!({}))
            .await
            .unwrap();
        assert_eq!(store.clients().await.unwrap(), vec!["Acme"]);
    }
}
