//! No-op cache implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use stats_core::{CacheKey, CacheRecord, CacheStore, Result, Shard, SyncHistoryEntry};
use tracing::trace;

/// A no-op store that doesn't keep anything.
///
/// All reads return `Ok(None)` and all writes echo their input back.
/// Useful for disabling caching or testing code paths without cache hits.
/// With this store the sync cooldown never engages.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl NoopCache {
    /// Create a new no-op cache.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CacheStore for NoopCache {
    async fn get(&self, _key: &CacheKey) -> Result<Option<CacheRecord>> {
        trace!("NoopCache: get called, returning None");
        Ok(None)
    }

    async fn get_player_by_name(&self, _name: &str, _shard: Shard) -> Result<Option<CacheRecord>> {
        trace!("NoopCache: get_player_by_name called, returning None");
        Ok(None)
    }

    async fn upsert(&self, record: CacheRecord) -> Result<CacheRecord> {
        trace!("NoopCache: upsert called, doing nothing");
        Ok(record)
    }

    async fn append_sync_history(&self, entry: SyncHistoryEntry) -> Result<SyncHistoryEntry> {
        trace!("NoopCache: append_sync_history called, doing nothing");
        Ok(entry)
    }

    async fn latest_successful_sync(&self, _subject_id: &str) -> Result<Option<DateTime<Utc>>> {
        trace!("NoopCache: latest_successful_sync called, returning None");
        Ok(None)
    }
}
