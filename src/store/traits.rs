//! `KnowledgeStore` trait — async interface for orchestration outputs.
//!
//! Records are keyed by client name. Profile and domain-knowledge records
//! are singletons per client (last write wins); meetings and insights carry
//! an item id so a client can accumulate several.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;

/// The record kinds the orchestrator produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    DomainKnowledge,
    ClientProfile,
    Meeting,
    Insight,
}

impl RecordKind {
    pub const ALL: [RecordKind; 4] = [
        RecordKind::DomainKnowledge,
        RecordKind::ClientProfile,
        RecordKind::Meeting,
        RecordKind::Insight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DomainKnowledge => "domain_knowledge",
            Self::ClientProfile => "client_profile",
            Self::Meeting => "meeting",
            Self::Insight => "insight",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == s)
    }

    /// Whether at most one record of this kind exists per client.
    pub fn is_singleton(&self) -> bool {
        matches!(self, Self::DomainKnowledge | Self::ClientProfile)
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored record with its key and bookkeeping timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    pub kind: RecordKind,
    pub client_name: String,
    /// Present for meetings and insights; `None` for singleton kinds.
    pub item_id: Option<Uuid>,
    pub record: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Backend-agnostic knowledge store.
///
/// Concurrent writes for different clients (or different kinds of the same
/// client) touch disjoint keys; same-key writes are last-write-wins.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Insert or replace a record.
    async fn put_record(
        &self,
        kind: RecordKind,
        client_name: &str,
        item_id: Option<Uuid>,
        record: &serde_json::Value,
    ) -> Result<(), StoreError>;

    /// Get the most recently updated record of a kind for a client.
    async fn get_record(
        &self,
        kind: RecordKind,
        client_name: &str,
    ) -> Result<Option<StoredRecord>, StoreError>;

    /// List all records of a kind for a client, most recent first.
    async fn list_records(
        &self,
        kind: RecordKind,
        client_name: &str,
    ) -> Result<Vec<StoredRecord>, StoreError>;

    /// All client names with at least one record.
    async fn clients(&self) -> Result<Vec<String>, StoreError>;
}
