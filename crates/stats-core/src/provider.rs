//! Provider trait for fetching statistics documents.
//!
//! [`StatsProvider`] is the seam between the cache layer and the remote
//! statistics API. Every method takes an optional shard; implementations
//! substitute their configured default when it is absent.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::{
    error::Result,
    types::{Document, Season, Shard},
};

/// Remote source of player, season, stats and match documents.
///
/// Implementations do not cache and do not retry.
#[async_trait]
pub trait StatsProvider: Send + Sync + Debug {
    /// Returns the name of this provider.
    fn name(&self) -> &str;

    /// Returns the shard used when a call passes `None`.
    fn default_shard(&self) -> Shard;

    /// Resolves an optional shard to a concrete one.
    fn shard_or_default(&self, shard: Option<Shard>) -> Shard {
        shard.unwrap_or_else(|| self.default_shard())
    }

    /// Fetches player documents by display name.
    ///
    /// Unknown names are omitted from the result.
    async fn players_by_names(&self, names: &[&str], shard: Option<Shard>)
    -> Result<Vec<Document>>;

    /// Fetches player documents by account id.
    async fn players_by_ids(&self, ids: &[&str], shard: Option<Shard>) -> Result<Vec<Document>>;

    /// Fetches a single player document.
    async fn player(&self, player_id: &str, shard: Option<Shard>) -> Result<Document>;

    /// Lists the seasons of a shard, in provider order.
    async fn seasons(&self, shard: Option<Shard>) -> Result<Vec<Season>>;

    /// Fetches a player's stats for one season (or the lifetime pseudo-season).
    async fn season_stats(
        &self,
        player_id: &str,
        season_id: &str,
        shard: Option<Shard>,
    ) -> Result<Document>;

    /// Fetches a match, returning the whole envelope so `included` rosters,
    /// participants and assets are kept.
    async fn match_detail(&self, match_id: &str, shard: Option<Shard>) -> Result<Document>;

    /// Fetches a clan by id.
    async fn clan(&self, clan_id: &str, shard: Option<Shard>) -> Result<Document>;
}
