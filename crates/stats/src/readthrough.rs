//! Read-through cache coordination.
//!
//! Reads check the store first and fall back to the provider on a miss,
//! writing the fresh document back before returning it. Store failures never
//! reach the caller: a failed read is a miss and a failed write-back still
//! returns the fetched document.

use std::future::Future;
use std::sync::Arc;

use stats_core::{
    CacheKey, CacheRecord, CacheStore, Document, Result, Shard, SyncHistoryEntry, document,
};
use tracing::{debug, instrument, warn};

/// A document together with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    /// The stored (or freshly written) record.
    pub record: CacheRecord,
    /// True when served from the store without a provider call.
    pub from_cache: bool,
}

impl Resolved {
    /// The document payload.
    #[must_use]
    pub const fn payload(&self) -> &Document {
        &self.record.payload
    }

    /// Consumes self, returning the document payload.
    #[must_use]
    pub fn into_payload(self) -> Document {
        self.record.payload
    }
}

/// Cache-aside coordinator over a [`CacheStore`].
#[derive(Clone)]
pub struct ReadThrough {
    store: Arc<dyn CacheStore>,
}

impl std::fmt::Debug for ReadThrough {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadThrough").finish_non_exhaustive()
    }
}

impl ReadThrough {
    /// Create a coordinator over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Looks up `key`, treating store failures as a miss.
    pub async fn lookup(&self, key: &CacheKey) -> Option<CacheRecord> {
        match self.store.get(key).await {
            Ok(found) => found,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    /// Looks up a player record by display name, treating store failures as a miss.
    pub async fn lookup_player_by_name(&self, name: &str, shard: Shard) -> Option<CacheRecord> {
        match self.store.get_player_by_name(name, shard).await {
            Ok(found) => found,
            Err(e) => {
                warn!(
                    name,
                    shard = %shard,
                    error = %e,
                    "Cache read by name failed, treating as miss"
                );
                None
            }
        }
    }

    /// Returns the cached record for `key`, or fetches, stores and returns it.
    ///
    /// A cached record is returned as is: no freshness check, no refresh.
    ///
    /// # Errors
    /// Propagates the provider error on a miss; nothing is written then.
    #[instrument(skip(self, fetch), fields(key = %key))]
    pub async fn resolve<F, Fut>(&self, key: CacheKey, fetch: F) -> Result<Resolved>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Document>>,
    {
        if let Some(record) = self.lookup(&key).await {
            debug!("Serving from cache");
            return Ok(Resolved {
                record,
                from_cache: true,
            });
        }

        debug!("Cache miss, fetching from provider");
        let payload = fetch().await?;
        let record = self.write_back(CacheRecord::new(key, payload)).await;
        Ok(Resolved {
            record,
            from_cache: false,
        })
    }

    /// Fetches `key` from the provider regardless of the cache, then stores it.
    ///
    /// Success and failure are both recorded in the sync history.
    ///
    /// # Errors
    /// Propagates the provider error after recording it.
    #[instrument(skip(self, fetch), fields(key = %key))]
    pub async fn refresh<F, Fut>(&self, key: CacheKey, fetch: F) -> Result<CacheRecord>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Document>>,
    {
        match fetch().await {
            Ok(payload) => Ok(self.write_back(CacheRecord::new(key, payload)).await),
            Err(e) => {
                self.record_history(SyncHistoryEntry::failed(
                    key.player_id(),
                    key.sync_kind(),
                    e.to_string(),
                ))
                .await;
                Err(e)
            }
        }
    }

    /// Upserts a freshly fetched record and records a successful sync.
    ///
    /// Player records without a name take it from `attributes.name`. Returns
    /// the stored record (with merged relationships), or the input record if
    /// the store failed.
    pub async fn write_back(&self, mut record: CacheRecord) -> CacheRecord {
        if record.name.is_none() && matches!(record.key, CacheKey::Player { .. }) {
            record.name = document::attribute_str(&record.payload, "name").map(str::to_string);
        }
        let subject = record.key.player_id().to_string();
        let kind = record.key.sync_kind();

        let stored = match self.store.upsert(record.clone()).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(key = %record.key, error = %e, "Cache write-back failed");
                return record;
            }
        };

        self.record_history(SyncHistoryEntry::success(subject, kind))
            .await;
        stored
    }

    /// Appends a sync-history entry, logging store failures.
    pub async fn record_history(&self, entry: SyncHistoryEntry) {
        if let Err(e) = self.store.append_sync_history(entry).await {
            warn!(error = %e, "Failed to append sync history");
        }
    }
}
