//! Cache store trait for persisting provider documents.
//!
//! This module defines the [`CacheStore`] trait: keyed point lookups and
//! upserts over player and season-stats records, plus the append-only sync
//! history used for rate limiting.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::Result,
    types::{CacheKey, CacheRecord, Shard, SyncHistoryEntry},
};

/// Trait for persisting fetched provider documents.
///
/// Implementations can store data in various backends (SQLite, in-memory, etc.).
/// Callers treat every error from a store as a cache miss; a store never has to
/// be healthy for remote reads to succeed.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Retrieves the record stored under `key`.
    ///
    /// Returns `Ok(Some(record))` if cached, `Ok(None)` if not cached.
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheRecord>>;

    /// Retrieves a player record by display name and shard.
    ///
    /// Names are matched exactly.
    async fn get_player_by_name(&self, name: &str, shard: Shard) -> Result<Option<CacheRecord>>;

    /// Inserts or updates the record under its key and returns what is stored.
    ///
    /// On update, the `relationships` sub-document of the stored payload is
    /// merged into the incoming one (see
    /// [`merge_relationships`](crate::document::merge_relationships)); all
    /// other top-level members are replaced.
    async fn upsert(&self, record: CacheRecord) -> Result<CacheRecord>;

    /// Appends an entry to the sync history.
    async fn append_sync_history(&self, entry: SyncHistoryEntry) -> Result<SyncHistoryEntry>;

    /// Returns the time of the most recent successful sync of `subject_id`.
    async fn latest_successful_sync(&self, subject_id: &str) -> Result<Option<DateTime<Utc>>>;
}
