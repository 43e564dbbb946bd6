//! Caller-facing statistics service.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "cache-sqlite")]
use stats_cache::SqliteCache;
use stats_core::{
    CacheKey, CacheRecord, CacheStore, ClanInfo, Document, LIFETIME_SEASON_ID, Result, Season,
    SeasonRequest, Shard, StatsError, StatsProvider, SyncHistoryEntry, SyncKind, document,
    resolve_season,
    season::{current_season, sort_most_recent_first},
};
#[cfg(feature = "cache-sqlite")]
use stats_pubg::PubgProvider;

#[cfg(feature = "cache-sqlite")]
use crate::config::Settings;
use crate::{
    batch::fetch_all,
    config::{DEFAULT_MATCH_BATCH_SIZE, DEFAULT_RECENT_MATCH_LIMIT},
    limiter::SyncRateLimiter,
    readthrough::{ReadThrough, Resolved},
};

/// Player ids per `players_by_ids` request.
pub const PLAYER_ID_GROUP_SIZE: usize = 10;

/// Detail recorded on the summary entry of a completed full sync.
pub const FULL_SYNC_DETAIL: &str = "Full sync completed successfully";

/// Season stats together with the season id they were resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonStats {
    /// The concrete season id (or `lifetime`).
    pub season_id: String,
    /// The stats document and whether it came from the cache.
    pub stats: Resolved,
}

/// Result of a forced sync.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncResult {
    /// The refreshed player record.
    pub player: CacheRecord,
    /// The refreshed current-season stats, if that part succeeded.
    pub season_stats: Option<CacheRecord>,
    /// When the sync finished.
    pub synced_at: DateTime<Utc>,
}

/// Read-through access to player statistics.
///
/// Reads are served from the cache store when possible and written back on a
/// miss. Forced syncs bypass the cache and are gated per player by a fixed
/// cooldown.
///
/// # Example
///
/// ```rust,ignore
/// use stats::{Settings, StatsService, Shard, SeasonRequest};
///
/// let service = StatsService::from_settings(&Settings::from_env()?)?;
///
/// let player = service.search_player_by_name("shroud", Some(Shard::Steam)).await?;
/// let id = stats::document::resource_id(player.payload()).unwrap_or_default();
/// let stats = service.get_season_stats(id, &SeasonRequest::Current, None).await?;
/// ```
pub struct StatsService {
    provider: Arc<dyn StatsProvider>,
    cache: ReadThrough,
    limiter: SyncRateLimiter,
    match_batch_size: usize,
    recent_match_limit: usize,
}

impl std::fmt::Debug for StatsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsService")
            .field("provider", &self.provider.name())
            .field("limiter", &self.limiter)
            .field("match_batch_size", &self.match_batch_size)
            .field("recent_match_limit", &self.recent_match_limit)
            .finish()
    }
}

impl StatsService {
    /// Create a service over a provider and a cache store.
    #[must_use]
    pub fn new(provider: Arc<dyn StatsProvider>, store: Arc<dyn CacheStore>) -> Self {
        Self {
            provider,
            cache: ReadThrough::new(Arc::clone(&store)),
            limiter: SyncRateLimiter::new(store),
            match_batch_size: DEFAULT_MATCH_BATCH_SIZE,
            recent_match_limit: DEFAULT_RECENT_MATCH_LIMIT,
        }
    }

    /// Build the PUBG provider and SQLite cache described by `settings`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client or the database cannot be set up.
    #[cfg(feature = "cache-sqlite")]
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let provider = PubgProvider::new(settings.provider.clone())?;
        let store = match &settings.cache_path {
            Some(path) => SqliteCache::new(path)?,
            None => SqliteCache::in_memory()?,
        };
        Ok(Self::new(Arc::new(provider), Arc::new(store))
            .with_match_batch_size(settings.match_batch_size)
            .with_recent_match_limit(settings.recent_match_limit))
    }

    /// Override the number of concurrent match fetches.
    #[must_use]
    pub const fn with_match_batch_size(mut self, size: usize) -> Self {
        self.match_batch_size = size;
        self
    }

    /// Override the default number of recent matches.
    #[must_use]
    pub const fn with_recent_match_limit(mut self, limit: usize) -> Self {
        self.recent_match_limit = limit;
        self
    }

    /// The provider behind this service.
    #[must_use]
    pub fn provider(&self) -> &Arc<dyn StatsProvider> {
        &self.provider
    }

    /// The sync gate.
    #[must_use]
    pub const fn limiter(&self) -> &SyncRateLimiter {
        &self.limiter
    }

    fn shard(&self, shard: Option<Shard>) -> Shard {
        self.provider.shard_or_default(shard)
    }

    /// Finds a player by display name.
    ///
    /// Names are matched exactly. A cached player is returned without a
    /// provider call; otherwise the provider is asked and the player stored
    /// under its account id.
    ///
    /// # Errors
    /// Returns [`StatsError::NotFound`] if the provider knows no such player.
    #[instrument(skip(self))]
    pub async fn search_player_by_name(
        &self,
        name: &str,
        shard: Option<Shard>,
    ) -> Result<Resolved> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StatsError::InvalidParameter(
                "Player name cannot be empty".to_string(),
            ));
        }
        let shard = self.shard(shard);

        if let Some(record) = self.cache.lookup_player_by_name(name, shard).await {
            debug!("Serving player from cache");
            return Ok(Resolved {
                record,
                from_cache: true,
            });
        }

        let payload = self
            .provider
            .players_by_names(&[name], Some(shard))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StatsError::NotFound(format!("Player {name} on {shard}")))?;
        let player_id = document::resource_id(&payload)
            .ok_or_else(|| StatsError::Parse("Player document has no id".to_string()))?
            .to_string();

        let display_name = document::attribute_str(&payload, "name")
            .unwrap_or(name)
            .to_string();
        let record = CacheRecord::new(CacheKey::player(player_id, shard), payload)
            .with_name(display_name);
        Ok(Resolved {
            record: self.cache.write_back(record).await,
            from_cache: false,
        })
    }

    /// Returns a player by account id, through the cache.
    ///
    /// # Errors
    /// Propagates provider errors on a cache miss.
    #[instrument(skip(self))]
    pub async fn get_player(&self, player_id: &str, shard: Option<Shard>) -> Result<Resolved> {
        let shard = self.shard(shard);
        self.cache
            .resolve(CacheKey::player(player_id, shard), || {
                self.provider.player(player_id, Some(shard))
            })
            .await
    }

    /// Returns a player's stats for a season, through the cache.
    ///
    /// `Current` resolves the season list on every call; explicit ids and
    /// `Lifetime` go straight to the cache.
    ///
    /// # Errors
    /// Returns [`StatsError::NotFound`] if no season can be resolved, and
    /// propagates provider errors on a cache miss.
    #[instrument(skip(self, season), fields(season = %season))]
    pub async fn get_season_stats(
        &self,
        player_id: &str,
        season: &SeasonRequest,
        shard: Option<Shard>,
    ) -> Result<SeasonStats> {
        let shard = self.shard(shard);
        let season_id = match season {
            SeasonRequest::Current => {
                let seasons = self.provider.seasons(Some(shard)).await?;
                resolve_season(&seasons, season)?.id.clone()
            }
            SeasonRequest::Lifetime => LIFETIME_SEASON_ID.to_string(),
            SeasonRequest::Explicit(id) => id.clone(),
        };

        let key = CacheKey::season_stats(player_id, season_id.as_str(), shard);
        let stats = self
            .cache
            .resolve(key, || {
                self.provider
                    .season_stats(player_id, &season_id, Some(shard))
            })
            .await?;

        Ok(SeasonStats { season_id, stats })
    }

    /// Returns a player's lifetime stats, through the cache.
    ///
    /// # Errors
    /// Propagates provider errors on a cache miss.
    pub async fn get_lifetime_stats(
        &self,
        player_id: &str,
        shard: Option<Shard>,
    ) -> Result<Resolved> {
        self.get_season_stats(player_id, &SeasonRequest::Lifetime, shard)
            .await
            .map(|s| s.stats)
    }

    /// Lists the seasons of a shard, most recent first.
    ///
    /// # Errors
    /// Propagates provider errors.
    pub async fn get_seasons(&self, shard: Option<Shard>) -> Result<Vec<Season>> {
        let mut seasons = self.provider.seasons(Some(self.shard(shard))).await?;
        sort_most_recent_first(&mut seasons);
        Ok(seasons)
    }

    /// Returns the current season of a shard.
    ///
    /// # Errors
    /// Returns [`StatsError::NotFound`] if the provider lists no seasons.
    pub async fn get_current_season(&self, shard: Option<Shard>) -> Result<Season> {
        let seasons = self.provider.seasons(Some(self.shard(shard))).await?;
        current_season(&seasons).cloned()
    }

    /// Refreshes a player and their current-season stats from the provider.
    ///
    /// At most one forced sync per player runs at a time, and a player synced
    /// successfully within the cooldown is rejected. A failing season stats
    /// refresh is logged and leaves `season_stats` empty.
    ///
    /// # Errors
    /// Returns [`StatsError::RateLimited`] inside the cooldown, and the
    /// provider error if the player itself cannot be fetched.
    #[instrument(skip(self))]
    pub async fn force_sync(&self, player_id: &str, shard: Option<Shard>) -> Result<SyncResult> {
        let shard = self.shard(shard);
        let _permit = self.limiter.acquire(player_id).await?;

        let player = self
            .cache
            .refresh(CacheKey::player(player_id, shard), || {
                self.provider.player(player_id, Some(shard))
            })
            .await?;

        let season_stats = match self.refresh_current_season_stats(player_id, shard).await {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(error = %e, "Season stats refresh failed during sync");
                None
            }
        };

        self.cache
            .record_history(
                SyncHistoryEntry::success(player_id, SyncKind::Player)
                    .with_detail(FULL_SYNC_DETAIL),
            )
            .await;
        info!(shard = %shard, "Full sync completed");

        Ok(SyncResult {
            player,
            season_stats,
            synced_at: Utc::now(),
        })
    }

    async fn refresh_current_season_stats(
        &self,
        player_id: &str,
        shard: Shard,
    ) -> Result<CacheRecord> {
        let seasons = self.provider.seasons(Some(shard)).await?;
        let season_id = current_season(&seasons)?.id.clone();
        self.cache
            .refresh(
                CacheKey::season_stats(player_id, season_id.as_str(), shard),
                || self.provider.season_stats(player_id, &season_id, Some(shard)),
            )
            .await
    }

    /// Returns details of a player's most recent matches.
    ///
    /// The player is fetched from the provider on every call, so the match
    /// list is never older than the request; the cache and the sync history
    /// are left untouched. Up to `limit` match ids are taken from its
    /// `matches` relationship and fetched in bounded batches. Matches that
    /// fail to load are left out.
    ///
    /// # Errors
    /// Propagates errors loading the player.
    #[instrument(skip(self))]
    pub async fn get_recent_matches(
        &self,
        player_id: &str,
        limit: Option<usize>,
        shard: Option<Shard>,
    ) -> Result<Vec<Document>> {
        let shard = self.shard(shard);
        let player = self.provider.player(player_id, Some(shard)).await?;

        let limit = limit.unwrap_or(self.recent_match_limit);
        let match_ids: Vec<String> = document::relationship_ids(&player, "matches")
            .into_iter()
            .take(limit)
            .map(str::to_string)
            .collect();
        debug!(count = match_ids.len(), "Fetching recent matches");

        Ok(fetch_all(&match_ids, self.match_batch_size, |match_id| {
            self.provider.match_detail(match_id, Some(shard))
        })
        .await)
    }

    /// Fetches players by account id, ten per provider request.
    ///
    /// Groups run in bounded batches like match details. Groups that fail to
    /// load are left out. Results are not cached.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn get_players_by_ids(&self, ids: &[&str], shard: Option<Shard>) -> Vec<Document> {
        let shard = self.shard(shard);
        let groups: Vec<IdGroup<'_>> = ids
            .chunks(PLAYER_ID_GROUP_SIZE)
            .map(IdGroup)
            .collect();

        fetch_all(&groups, self.match_batch_size, |group| {
            self.provider.players_by_ids(group.0, Some(shard))
        })
        .await
        .into_iter()
        .flatten()
        .collect()
    }

    /// Attaches a clan annotation to a player record.
    ///
    /// The cached player is annotated in place. An uncached player is fetched
    /// from the provider and stored without a sync history entry, so
    /// annotating never starts the sync cooldown. The annotation survives
    /// later syncs of the player.
    ///
    /// # Errors
    /// Propagates errors fetching an uncached player or writing the store.
    #[instrument(skip(self, clan), fields(clan_id = %clan.id))]
    pub async fn annotate_clan(
        &self,
        player_id: &str,
        shard: Option<Shard>,
        clan: &ClanInfo,
    ) -> Result<CacheRecord> {
        let key = CacheKey::player(player_id, self.shard(shard));
        let cached = self.cache.lookup(&key).await;
        let mut record = match cached {
            Some(record) => record,
            None => {
                let payload = self.provider.player(player_id, Some(key.shard())).await?;
                let name = document::attribute_str(&payload, "name").map(str::to_string);
                let record = CacheRecord::new(key, payload);
                match name {
                    Some(name) => record.with_name(name),
                    None => record,
                }
            }
        };
        document::set_clan(&mut record.payload, clan);
        self.cache.store().upsert(record).await
    }

    /// Returns the clan annotation of a cached player.
    ///
    /// Only the cache is consulted. Clan membership is only known when
    /// annotated locally, so this may always return [`StatsError::NotFound`].
    ///
    /// # Errors
    /// Returns [`StatsError::NotFound`] when the player is not cached, has no
    /// annotation, or the store cannot be read.
    pub async fn get_clan(&self, player_id: &str, shard: Option<Shard>) -> Result<ClanInfo> {
        let key = CacheKey::player(player_id, self.shard(shard));
        self.cache
            .lookup(&key)
            .await
            .and_then(|record| document::clan(&record.payload))
            .ok_or_else(|| StatsError::NotFound(format!("Clan of player {player_id}")))
    }
}

/// A group of player ids fetched in one request.
#[derive(Debug)]
struct IdGroup<'a>(&'a [&'a str]);

impl std::fmt::Display for IdGroup<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use stats_cache::InMemoryCache;

    /// Provider answering from fixed data.
    #[derive(Debug)]
    struct FixedProvider {
        seasons: Vec<Season>,
    }

    #[async_trait]
    impl StatsProvider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        fn default_shard(&self) -> Shard {
            Shard::Steam
        }

        async fn players_by_names(
            &self,
            names: &[&str],
            _shard: Option<Shard>,
        ) -> Result<Vec<Document>> {
            Ok(names
                .iter()
                .filter(|n| **n != "ghost")
                .map(|n| json!({ "id": format!("account.{n}"), "attributes": { "name": n } }))
                .collect())
        }

        async fn players_by_ids(
            &self,
            ids: &[&str],
            _shard: Option<Shard>,
        ) -> Result<Vec<Document>> {
            Ok(ids.iter().map(|id| json!({ "id": id })).collect())
        }

        async fn player(&self, player_id: &str, _shard: Option<Shard>) -> Result<Document> {
            Ok(json!({ "id": player_id, "attributes": { "name": "shroud" } }))
        }

        async fn seasons(&self, _shard: Option<Shard>) -> Result<Vec<Season>> {
            Ok(self.seasons.clone())
        }

        async fn season_stats(
            &self,
            player_id: &str,
            season_id: &str,
            _shard: Option<Shard>,
        ) -> Result<Document> {
            Ok(json!({ "type": "playerSeason", "player": player_id, "season": season_id }))
        }

        async fn match_detail(&self, match_id: &str, _shard: Option<Shard>) -> Result<Document> {
            Err(StatsError::NotFound(format!("Match {match_id}")))
        }

        async fn clan(&self, clan_id: &str, _shard: Option<Shard>) -> Result<Document> {
            Err(StatsError::NotSupported(format!("Clan {clan_id}")))
        }
    }

    fn service(seasons: Vec<Season>) -> StatsService {
        StatsService::new(
            Arc::new(FixedProvider { seasons }),
            Arc::new(InMemoryCache::new()),
        )
    }

    #[tokio::test]
    async fn test_search_unknown_player() {
        let service = service(vec![]);
        let err = service
            .search_player_by_name("ghost", None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        assert!(matches!(
            service.search_player_by_name("  ", None).await,
            Err(StatsError::InvalidParameter(_))
        ));
    }

    #[tokio::test]
    async fn test_current_season_falls_back_to_greatest_id() {
        let service = service(vec![
            Season::new("division.bro.official.pc-2018-29"),
            Season::new("division.bro.official.pc-2018-31"),
            Season::new("division.bro.official.pc-2018-30"),
        ]);

        let stats = service
            .get_season_stats("account.1", &SeasonRequest::Current, None)
            .await
            .unwrap();
        assert_eq!(stats.season_id, "division.bro.official.pc-2018-31");
        assert_eq!(
            stats.stats.payload()["season"],
            json!("division.bro.official.pc-2018-31")
        );

        let seasons = service.get_seasons(None).await.unwrap();
        assert_eq!(seasons[0].id, "division.bro.official.pc-2018-31");
        assert_eq!(seasons[2].id, "division.bro.official.pc-2018-29");
    }

    #[tokio::test]
    async fn test_lifetime_stats_use_pseudo_season() {
        let service = service(vec![]);
        let lifetime = service.get_lifetime_stats("account.1", None).await.unwrap();
        assert_eq!(lifetime.record.key.season_id(), Some(LIFETIME_SEASON_ID));
        assert_eq!(lifetime.record.key.sync_kind(), SyncKind::LifetimeStats);
    }

    #[tokio::test]
    async fn test_force_sync_without_seasons_still_succeeds() {
        let service = service(vec![]);
        let result = service.force_sync("account.1", None).await.unwrap();
        assert!(result.season_stats.is_none());
        assert_eq!(
            document::resource_id(&result.player.payload),
            Some("account.1")
        );
    }

    #[tokio::test]
    async fn test_player_without_matches() {
        let service = service(vec![]);
        let matches = service
            .get_recent_matches("account.1", None, None)
            .await
            .unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn test_players_by_ids_grouped() {
        let service = service(vec![]);
        let ids: Vec<String> = (0..23).map(|i| format!("account.{i}")).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();

        let players = service.get_players_by_ids(&refs, None).await;
        assert_eq!(players.len(), 23);
        assert_eq!(players[22]["id"], json!("account.22"));
    }

    #[tokio::test]
    async fn test_clan_annotation() {
        let service = service(vec![]);
        let err = service.get_clan("account.1", None).await.unwrap_err();
        assert!(err.is_not_found());

        let clan = ClanInfo {
            id: "clan.1".into(),
            name: "Sentinels".into(),
            tag: "SEN".into(),
        };
        service.annotate_clan("account.1", None, &clan).await.unwrap();
        assert_eq!(service.get_clan("account.1", None).await.unwrap(), clan);
    }
}
