//! In-memory cache implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use stats_core::{
    CacheKey, CacheRecord, CacheStore, Result, Shard, SyncHistoryEntry, SyncOutcome,
    document::merge_relationships,
};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Simple in-memory store for testing and development.
///
/// Records are kept in `RwLock`-protected `HashMap`s and are lost when the cache
/// is dropped. Records are cloned on get/upsert operations.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    records: RwLock<HashMap<CacheKey, CacheRecord>>,
    history: RwLock<Vec<SyncHistoryEntry>>,
}

impl InMemoryCache {
    /// Create a new empty in-memory cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records across all tables.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns true if no records are stored.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Snapshot of the sync history, oldest first.
    pub async fn sync_history(&self) -> Vec<SyncHistoryEntry> {
        self.history.read().await.clone()
    }
}

#[async_trait]
impl CacheStore for InMemoryCache {
    #[instrument(skip(self), fields(key = %key))]
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheRecord>> {
        let records = self.records.read().await;
        match records.get(key) {
            Some(record) => {
                debug!("Cache hit");
                Ok(Some(record.clone()))
            }
            None => {
                debug!("Cache miss");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self), fields(shard = %shard))]
    async fn get_player_by_name(&self, name: &str, shard: Shard) -> Result<Option<CacheRecord>> {
        let records = self.records.read().await;
        let found = records
            .values()
            .filter(|r| matches!(r.key, CacheKey::Player { .. }))
            .filter(|r| r.key.shard() == shard && r.name.as_deref() == Some(name))
            .max_by_key(|r| r.last_synced_at)
            .cloned();

        match &found {
            Some(_) => debug!("Cache hit by name"),
            None => debug!("Cache miss by name"),
        }
        Ok(found)
    }

    #[instrument(skip(self, record), fields(key = %record.key))]
    async fn upsert(&self, record: CacheRecord) -> Result<CacheRecord> {
        let mut record = record;
        let mut records = self.records.write().await;

        if let Some(existing) = records.get(&record.key) {
            merge_relationships(&existing.payload, &mut record.payload);
        }
        records.insert(record.key.clone(), record.clone());
        debug!("Upserted cache record");
        Ok(record)
    }

    #[instrument(skip(self, entry), fields(subject_id = %entry.subject_id))]
    async fn append_sync_history(&self, entry: SyncHistoryEntry) -> Result<SyncHistoryEntry> {
        self.history.write().await.push(entry.clone());
        Ok(entry)
    }

    #[instrument(skip(self))]
    async fn latest_successful_sync(&self, subject_id: &str) -> Result<Option<DateTime<Utc>>> {
        let history = self.history.read().await;
        Ok(history
            .iter()
            .filter(|e| e.subject_id == subject_id && e.outcome == SyncOutcome::Success)
            .map(|e| e.occurred_at)
            .max())
    }
}
