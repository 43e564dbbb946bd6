//! SQLite-based cache implementation.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use stats_core::{
    CacheKey, CacheRecord, CacheStore, Document, Result, Shard, StatsError, SyncHistoryEntry,
    SyncOutcome, document::merge_relationships,
};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, instrument};

/// SQLite-based store for provider documents and sync history.
///
/// This store keeps data in a SQLite database file, providing persistence across
/// application restarts. Three tables back it: `players`, `player_season_stats`
/// and the append-only `sync_history`.
#[derive(Debug)]
pub struct SqliteCache {
    conn: Mutex<Connection>,
}

impl SqliteCache {
    /// Create a new SQLite cache at the given path.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or schema creation fails.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(store_err)?;
        let cache = Self {
            conn: Mutex::new(conn),
        };
        cache.initialize_schema()?;
        Ok(cache)
    }

    /// Create an in-memory SQLite cache.
    ///
    /// Useful for testing; data is lost when the cache is dropped.
    ///
    /// # Errors
    /// Returns an error if schema creation fails.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        let cache = Self {
            conn: Mutex::new(conn),
        };
        cache.initialize_schema()?;
        Ok(cache)
    }

    /// Initialize the database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS players (
                player_id TEXT NOT NULL,
                shard TEXT NOT NULL,
                name TEXT,
                data_json TEXT NOT NULL,
                last_sync_at TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (player_id, shard)
            );

            CREATE INDEX IF NOT EXISTS idx_players_name_shard
             ON players(name, shard);

            CREATE TABLE IF NOT EXISTS player_season_stats (
                player_id TEXT NOT NULL,
                season_id TEXT NOT NULL,
                shard TEXT NOT NULL,
                data_json TEXT NOT NULL,
                last_sync_at TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (player_id, season_id, shard)
            );

            CREATE TABLE IF NOT EXISTS sync_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                subject_id TEXT NOT NULL,
                sync_kind TEXT NOT NULL,
                status TEXT NOT NULL,
                details TEXT,
                occurred_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sync_history_subject_status
             ON sync_history(subject_id, status, occurred_at);",
        )
        .map_err(store_err)?;

        debug!("SQLite cache schema initialized");
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| StatsError::Store(e.to_string()))
    }

    /// Select the stored payload under `key`, if any.
    fn select_payload(conn: &Connection, key: &CacheKey) -> Result<Option<String>> {
        match key {
            CacheKey::Player { player_id, shard } => conn
                .query_row(
                    "SELECT data_json FROM players WHERE player_id = ?1 AND shard = ?2",
                    params![player_id, shard.as_str()],
                    |row| row.get::<_, String>(0),
                )
                .optional()
                .map_err(store_err),
            CacheKey::SeasonStats {
                player_id,
                season_id,
                shard,
            } => conn
                .query_row(
                    "SELECT data_json FROM player_season_stats
                     WHERE player_id = ?1 AND season_id = ?2 AND shard = ?3",
                    params![player_id, season_id, shard.as_str()],
                    |row| row.get::<_, String>(0),
                )
                .optional()
                .map_err(store_err),
        }
    }
}

/// Map a SQLite error to a store error.
fn store_err(e: rusqlite::Error) -> StatsError {
    StatsError::Store(e.to_string())
}

/// Fixed-width RFC 3339 so stored timestamps order lexicographically.
fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StatsError::Parse(format!("Invalid timestamp {s}: {e}")))
}

fn parse_payload(json: &str) -> Result<Document> {
    serde_json::from_str(json).map_err(|e| StatsError::Parse(e.to_string()))
}

/// Raw player row: (player_id, shard, name, data_json, last_sync_at).
type PlayerRow = (String, String, Option<String>, String, String);

fn player_row(row: &Row<'_>) -> rusqlite::Result<PlayerRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn player_record(row: PlayerRow) -> Result<CacheRecord> {
    let (player_id, shard, name, data_json, last_sync_at) = row;
    let shard: Shard = shard.parse()?;
    Ok(CacheRecord {
        key: CacheKey::player(player_id, shard),
        name,
        payload: parse_payload(&data_json)?,
        last_synced_at: parse_timestamp(&last_sync_at)?,
    })
}

#[async_trait]
impl CacheStore for SqliteCache {
    #[instrument(skip(self), fields(key = %key))]
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheRecord>> {
        let conn = self.lock()?;

        let record = match key {
            CacheKey::Player { player_id, shard } => conn
                .query_row(
                    "SELECT player_id, shard, name, data_json, last_sync_at
                     FROM players WHERE player_id = ?1 AND shard = ?2",
                    params![player_id, shard.as_str()],
                    player_row,
                )
                .optional()
                .map_err(store_err)?
                .map(player_record)
                .transpose()?,
            CacheKey::SeasonStats {
                player_id,
                season_id,
                shard,
            } => conn
                .query_row(
                    "SELECT data_json, last_sync_at FROM player_season_stats
                     WHERE player_id = ?1 AND season_id = ?2 AND shard = ?3",
                    params![player_id, season_id, shard.as_str()],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
                )
                .optional()
                .map_err(store_err)?
                .map(|(data_json, last_sync_at)| -> Result<CacheRecord> {
                    Ok(CacheRecord {
                        key: key.clone(),
                        name: None,
                        payload: parse_payload(&data_json)?,
                        last_synced_at: parse_timestamp(&last_sync_at)?,
                    })
                })
                .transpose()?,
        };

        match &record {
            Some(_) => debug!("Found cached record"),
            None => debug!("No cached record found"),
        }
        Ok(record)
    }

    #[instrument(skip(self), fields(shard = %shard))]
    async fn get_player_by_name(&self, name: &str, shard: Shard) -> Result<Option<CacheRecord>> {
        let conn = self.lock()?;

        let record = conn
            .query_row(
                "SELECT player_id, shard, name, data_json, last_sync_at
                 FROM players WHERE name = ?1 AND shard = ?2
                 ORDER BY last_sync_at DESC LIMIT 1",
                params![name, shard.as_str()],
                player_row,
            )
            .optional()
            .map_err(store_err)?
            .map(player_record)
            .transpose()?;

        match &record {
            Some(_) => debug!("Found cached player by name"),
            None => debug!("No cached player found by name"),
        }
        Ok(record)
    }

    #[instrument(skip(self, record), fields(key = %record.key))]
    async fn upsert(&self, record: CacheRecord) -> Result<CacheRecord> {
        let mut record = record;
        let now = timestamp(Utc::now());
        let last_sync_at = timestamp(record.last_synced_at);

        let conn = self.lock()?;
        let tx = conn.unchecked_transaction().map_err(store_err)?;

        if let Some(existing) = Self::select_payload(&tx, &record.key)? {
            let existing = parse_payload(&existing)?;
            merge_relationships(&existing, &mut record.payload);
        }
        let data_json =
            serde_json::to_string(&record.payload).map_err(|e| StatsError::Parse(e.to_string()))?;

        match &record.key {
            CacheKey::Player { player_id, shard } => {
                tx.execute(
                    "INSERT INTO players
                     (player_id, shard, name, data_json, last_sync_at, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                     ON CONFLICT(player_id, shard) DO UPDATE SET
                        name = excluded.name,
                        data_json = excluded.data_json,
                        last_sync_at = excluded.last_sync_at,
                        updated_at = excluded.updated_at",
                    params![
                        player_id,
                        shard.as_str(),
                        record.name,
                        data_json,
                        last_sync_at,
                        now
                    ],
                )
                .map_err(store_err)?;
            }
            CacheKey::SeasonStats {
                player_id,
                season_id,
                shard,
            } => {
                tx.execute(
                    "INSERT INTO player_season_stats
                     (player_id, season_id, shard, data_json, last_sync_at, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                     ON CONFLICT(player_id, season_id, shard) DO UPDATE SET
                        data_json = excluded.data_json,
                        last_sync_at = excluded.last_sync_at,
                        updated_at = excluded.updated_at",
                    params![
                        player_id,
                        season_id,
                        shard.as_str(),
                        data_json,
                        last_sync_at,
                        now
                    ],
                )
                .map_err(store_err)?;
            }
        }

        tx.commit().map_err(store_err)?;
        debug!("Upserted cache record");
        Ok(record)
    }

    #[instrument(
        skip(self, entry),
        fields(subject_id = %entry.subject_id, kind = entry.kind.as_str())
    )]
    async fn append_sync_history(&self, entry: SyncHistoryEntry) -> Result<SyncHistoryEntry> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO sync_history (subject_id, sync_kind, status, details, occurred_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.subject_id,
                entry.kind.as_str(),
                entry.outcome.as_str(),
                entry.detail,
                timestamp(entry.occurred_at)
            ],
        )
        .map_err(store_err)?;

        debug!(outcome = entry.outcome.as_str(), "Appended sync history");
        Ok(entry)
    }

    #[instrument(skip(self))]
    async fn latest_successful_sync(&self, subject_id: &str) -> Result<Option<DateTime<Utc>>> {
        let conn = self.lock()?;

        let latest = conn
            .query_row(
                "SELECT occurred_at FROM sync_history
                 WHERE subject_id = ?1 AND status = ?2
                 ORDER BY occurred_at DESC LIMIT 1",
                params![subject_id, SyncOutcome::Success.as_str()],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(store_err)?;

        latest.as_deref().map(parse_timestamp).transpose()
    }
}
