//! In-memory result history.
//!
//! A process-lifetime record of submitted jobs and their outcomes.
//! Deliberately non-durable: entries vanish on restart, matching the
//! rest of the connector's state model.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use atelier_client::JobHandle;

use crate::job::OutcomeStatus;

/// Upper bound on retained records; the oldest are dropped beyond it.
const DEFAULT_CAPACITY: usize = 1_000;

/// One completed (or failed) job as remembered by this process.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryRecord {
    pub id: Uuid,
    pub operation: String,
    /// Source file, when the job came from the file pipeline.
    pub input: Option<PathBuf>,
    /// Remote handle, when submission succeeded.
    pub handle: Option<JobHandle>,
    pub status: OutcomeStatus,
    /// Output payload on success, error detail on failure.
    pub detail: Value,
    /// Status checks the poller issued for this job.
    pub attempts: u32,
    pub elapsed_ms: u64,
    pub created_at: DateTime<Utc>,
}

/// Bounded, append-only store of [`HistoryRecord`]s.
pub struct HistoryStore {
    records: RwLock<Vec<HistoryRecord>>,
    capacity: usize,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    /// Append a record, evicting the oldest entries beyond capacity.
    /// Returns the new record's id.
    pub async fn record(&self, mut record: HistoryRecord) -> Uuid {
        record.id = Uuid::now_v7();
        record.created_at = Utc::now();
        let id = record.id;

        let mut records = self.records.write().await;
        records.push(record);
        if records.len() > self.capacity {
            let excess = records.len() - self.capacity;
            records.drain(..excess);
        }
        id
    }

    /// Records newest-first, optionally truncated to `limit`.
    pub async fn list(&self, limit: Option<usize>) -> Vec<HistoryRecord> {
        let records = self.records.read().await;
        let mut out: Vec<HistoryRecord> = records.iter().rev().cloned().collect();
        if let Some(limit) = limit {
            out.truncate(limit);
        }
        out
    }

    /// Look up one record by id.
    pub async fn get(&self, id: Uuid) -> Option<HistoryRecord> {
        self.records
            .read()
            .await
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryRecord {
    /// Blank record for callers to fill in; `id` and `created_at` are
    /// assigned by the store.
    pub fn draft(operation: impl Into<String>) -> Self {
        Self {
            id: Uuid::nil(),
            operation: operation.into(),
            input: None,
            handle: None,
            status: OutcomeStatus::Failed,
            detail: Value::Null,
            attempts: 0,
            elapsed_ms: 0,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn succeeded(operation: &str) -> HistoryRecord {
        HistoryRecord {
            status: OutcomeStatus::Succeeded,
            ..HistoryRecord::draft(operation)
        }
    }

    #[tokio::test]
    async fn record_and_get_round_trip() {
        let store = HistoryStore::new();
        let id = store.record(succeeded("upscale")).await;

        let fetched = store.get(id).await.unwrap();
        assert_eq!(fetched.operation, "upscale");
        assert_eq!(fetched.status, OutcomeStatus::Succeeded);
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let store = HistoryStore::new();
        store.record(succeeded("first")).await;
        store.record(succeeded("second")).await;
        store.record(succeeded("third")).await;

        let listed = store.list(None).await;
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[0].operation, "third");
        assert_eq!(listed[2].operation, "first");
    }

    #[tokio::test]
    async fn list_respects_limit() {
        let store = HistoryStore::new();
        for i in 0..5 {
            store.record(succeeded(&format!("op-{i}"))).await;
        }
        assert_eq!(store.list(Some(2)).await.len(), 2);
    }

    #[tokio::test]
    async fn capacity_evicts_oldest() {
        let store = HistoryStore::with_capacity(2);
        store.record(succeeded("a")).await;
        store.record(succeeded("b")).await;
        store.record(succeeded("c")).await;

        let listed = store.list(None).await;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].operation, "c");
        assert_eq!(listed[1].operation, "b");
    }

    #[tokio::test]
    async fn get_unknown_id_is_none() {
        let store = HistoryStore::new();
        assert!(store.get(Uuid::now_v7()).await.is_none());
    }
}
