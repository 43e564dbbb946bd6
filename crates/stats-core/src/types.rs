//! Core data types for cached statistics.
//!
//! This module defines the fundamental data structures:
//!
//! - [`Shard`] - Platform shard qualifying every provider path
//! - [`Document`] - Opaque provider payload
//! - [`CacheKey`] - Composite key of a cached record
//! - [`CacheRecord`] - A cached provider document with its sync time
//! - [`SyncHistoryEntry`] - Append-only record of a sync attempt
//! - [`Season`] - A season as listed by the provider
//! - [`ClanInfo`] - Locally-sourced clan annotation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StatsError;

/// Opaque structured document as returned by the provider.
///
/// Payloads are stored and returned untouched; components only read the
/// handful of fields they need (id, name, flags).
pub type Document = serde_json::Value;

/// Pseudo-season id the provider uses for lifetime statistics.
pub const LIFETIME_SEASON_ID: &str = "lifetime";

/// Platform shard a player or match lives on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shard {
    /// PC (Steam).
    #[default]
    Steam,
    /// PC (Kakao).
    Kakao,
    /// Xbox.
    Xbox,
    /// PlayStation.
    Psn,
    /// Stadia.
    Stadia,
    /// Cross-platform console shard.
    Console,
    /// Tournament shard.
    Tournament,
}

impl Shard {
    /// All shards, in display order.
    pub const ALL: [Self; 7] = [
        Self::Steam,
        Self::Kakao,
        Self::Xbox,
        Self::Psn,
        Self::Stadia,
        Self::Console,
        Self::Tournament,
    ];

    /// Returns the shard as it appears in provider paths.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Steam => "steam",
            Self::Kakao => "kakao",
            Self::Xbox => "xbox",
            Self::Psn => "psn",
            Self::Stadia => "stadia",
            Self::Console => "console",
            Self::Tournament => "tournament",
        }
    }

    /// Human readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Steam => "Steam",
            Self::Kakao => "Kakao",
            Self::Xbox => "Xbox",
            Self::Psn => "PlayStation",
            Self::Stadia => "Stadia",
            Self::Console => "Console",
            Self::Tournament => "Tournament",
        }
    }
}

impl fmt::Display for Shard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Shard {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|shard| shard.as_str() == lowered)
            .ok_or_else(|| StatsError::InvalidParameter(format!("Unknown shard: {s}")))
    }
}

/// Composite key of a cached record.
///
/// Each variant maps to one logical table; a key is unique across its fields.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheKey {
    /// A player document, keyed by account id and shard.
    Player {
        /// Provider account id.
        player_id: String,
        /// Shard the player was fetched from.
        shard: Shard,
    },
    /// A season (or lifetime) stats document for one player.
    SeasonStats {
        /// Provider account id.
        player_id: String,
        /// Season id, or [`LIFETIME_SEASON_ID`].
        season_id: String,
        /// Shard the stats were fetched from.
        shard: Shard,
    },
}

impl CacheKey {
    /// Creates a player key.
    #[must_use]
    pub fn player(player_id: impl Into<String>, shard: Shard) -> Self {
        Self::Player {
            player_id: player_id.into(),
            shard,
        }
    }

    /// Creates a season stats key.
    #[must_use]
    pub fn season_stats(
        player_id: impl Into<String>,
        season_id: impl Into<String>,
        shard: Shard,
    ) -> Self {
        Self::SeasonStats {
            player_id: player_id.into(),
            season_id: season_id.into(),
            shard,
        }
    }

    /// The account id this key belongs to.
    #[must_use]
    pub fn player_id(&self) -> &str {
        match self {
            Self::Player { player_id, .. } | Self::SeasonStats { player_id, .. } => player_id,
        }
    }

    /// The shard qualifier.
    #[must_use]
    pub const fn shard(&self) -> Shard {
        match self {
            Self::Player { shard, .. } | Self::SeasonStats { shard, .. } => *shard,
        }
    }

    /// The secondary key component, if any.
    #[must_use]
    pub fn season_id(&self) -> Option<&str> {
        match self {
            Self::Player { .. } => None,
            Self::SeasonStats { season_id, .. } => Some(season_id),
        }
    }

    /// The sync-history kind a write under this key is recorded as.
    #[must_use]
    pub fn sync_kind(&self) -> SyncKind {
        match self.season_id() {
            None => SyncKind::Player,
            Some(LIFETIME_SEASON_ID) => SyncKind::LifetimeStats,
            Some(_) => SyncKind::SeasonStats,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player { player_id, shard } => write!(f, "player:{shard}:{player_id}"),
            Self::SeasonStats {
                player_id,
                season_id,
                shard,
            } => write!(f, "season_stats:{shard}:{player_id}:{season_id}"),
        }
    }
}

/// A cached provider document.
///
/// Overwritten (never versioned) on every sync; never expired.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Composite key.
    pub key: CacheKey,
    /// Display name, used for name lookups of player records.
    pub name: Option<String>,
    /// The provider document, preserved as returned.
    pub payload: Document,
    /// When the record was last written from a successful remote fetch.
    pub last_synced_at: DateTime<Utc>,
}

impl CacheRecord {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn new(key: CacheKey, payload: Document) -> Self {
        Self {
            key,
            name: None,
            payload,
            last_synced_at: Utc::now(),
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// What a sync attempt refreshed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncKind {
    /// The player document.
    Player,
    /// A season stats document.
    SeasonStats,
    /// The lifetime stats document.
    LifetimeStats,
}

impl SyncKind {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::SeasonStats => "season_stats",
            Self::LifetimeStats => "lifetime_stats",
        }
    }
}

impl FromStr for SyncKind {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "player" => Ok(Self::Player),
            "season_stats" => Ok(Self::SeasonStats),
            "lifetime_stats" => Ok(Self::LifetimeStats),
            _ => Err(StatsError::Parse(format!("Invalid sync kind: {s}"))),
        }
    }
}

/// Outcome of a sync attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// The remote call succeeded.
    Success,
    /// The remote call failed.
    Failed,
}

impl SyncOutcome {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for SyncOutcome {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            _ => Err(StatsError::Parse(format!("Invalid sync outcome: {s}"))),
        }
    }
}

/// Append-only record of a sync attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncHistoryEntry {
    /// Subject of the sync (a player account id).
    pub subject_id: String,
    /// What was refreshed.
    pub kind: SyncKind,
    /// Whether it succeeded.
    pub outcome: SyncOutcome,
    /// Free-form detail (error text, summary).
    pub detail: Option<String>,
    /// When the attempt completed.
    pub occurred_at: DateTime<Utc>,
}

impl SyncHistoryEntry {
    /// Creates a success entry stamped with the current time.
    #[must_use]
    pub fn success(subject_id: impl Into<String>, kind: SyncKind) -> Self {
        Self {
            subject_id: subject_id.into(),
            kind,
            outcome: SyncOutcome::Success,
            detail: None,
            occurred_at: Utc::now(),
        }
    }

    /// Creates a failure entry stamped with the current time.
    #[must_use]
    pub fn failed(
        subject_id: impl Into<String>,
        kind: SyncKind,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            kind,
            outcome: SyncOutcome::Failed,
            detail: Some(detail.into()),
            occurred_at: Utc::now(),
        }
    }

    /// Sets the detail text.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Overrides the occurrence time.
    #[must_use]
    pub const fn at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }
}

/// A season as listed by the provider.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Season {
    /// Provider season id (e.g. `division.bro.official.pc-2018-31`).
    pub id: String,
    /// Whether the provider flags this season as current.
    pub is_current_season: bool,
    /// Whether the season is an off-season.
    pub is_offseason: bool,
}

impl Season {
    /// Creates a season that is neither current nor off-season.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Marks the season as current.
    #[must_use]
    pub const fn current(mut self) -> Self {
        self.is_current_season = true;
        self
    }
}

/// Locally-sourced clan annotation for a player.
///
/// The provider offers no player-to-clan lookup, so these only exist when
/// written through the service.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClanInfo {
    /// Clan id.
    pub id: String,
    /// Clan name.
    pub name: String,
    /// Clan tag.
    pub tag: String,
}
