#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! PUBG statistics API provider.
//!
//! This crate implements the stats-core [`StatsProvider`] trait for the
//! [PUBG API](https://documentation.pubg.com/).
//!
//! # Usage
//!
//! ```rust,ignore
//! use stats_pubg::{PubgConfig, PubgProvider};
//! use stats_core::{Shard, StatsProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = PubgProvider::new(PubgConfig::new("your_api_key"))?;
//!
//!     let players = provider.players_by_names(&["shroud"], Some(Shard::Steam)).await?;
//!     let seasons = provider.seasons(None).await?;
//!
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::{Client, Url, header};
use serde::{Deserialize, Serialize};
use stats_core::{Document, Result, Season, Shard, StatsError, StatsProvider};
use tracing::{debug, instrument};

/// Client configuration.
pub mod config;

pub use config::PubgConfig;

/// The provider accepts at most this many ids per `filter[playerIds]` request.
pub const MAX_IDS_PER_REQUEST: usize = 10;

/// PUBG statistics API provider.
///
/// Provides access to:
/// - Players by name, by id, or singly
/// - Seasons and per-season / lifetime player stats
/// - Match details with rosters and participants
/// - Clans, leaderboards and sample matches
/// - Weapon and survival mastery
///
/// No caching and no retries happen at this layer.
#[derive(Clone)]
pub struct PubgProvider {
    client: Client,
    config: PubgConfig,
}

impl fmt::Debug for PubgProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PubgProvider")
            .field("config", &self.config)
            .finish()
    }
}

impl PubgProvider {
    /// Create a new provider; the HTTP client enforces `config.timeout`.
    ///
    /// # Errors
    /// Returns [`StatsError::Configuration`] if the HTTP client cannot be built.
    pub fn new(config: PubgConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StatsError::Configuration(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Create a new provider with a custom HTTP client.
    #[must_use]
    pub const fn with_client(client: Client, config: PubgConfig) -> Self {
        Self { client, config }
    }

    /// Returns the configuration this provider was built with.
    #[must_use]
    pub const fn config(&self) -> &PubgConfig {
        &self.config
    }

    /// Build the shard-scoped URL for a resource path.
    ///
    /// Each segment is percent-encoded, so ids containing `/`, `?` or `#`
    /// stay inside their segment. Empty, `.` and `..` segments are rejected.
    fn url(&self, segments: &[&str], shard: Shard) -> Result<Url> {
        if let Some(segment) = segments
            .iter()
            .find(|segment| matches!(**segment, "" | "." | ".."))
        {
            return Err(StatsError::InvalidParameter(format!(
                "Invalid path segment {segment:?}"
            )));
        }

        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| StatsError::Configuration(format!("Invalid base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| {
                StatsError::Configuration(format!(
                    "Base URL cannot carry a path: {}",
                    self.config.base_url
                ))
            })?
            .pop_if_empty()
            .push("shards")
            .push(shard.as_str())
            .extend(segments);
        Ok(url)
    }

    /// Make a GET request and return the parsed response body.
    ///
    /// `path` lists the resource path segments below the shard. The body must
    /// be a JSON:API envelope (an object carrying `data`).
    ///
    /// # Errors
    /// Returns [`StatsError::InvalidParameter`] for an unusable path segment
    /// without making a request.
    #[instrument(skip(self, query))]
    pub async fn fetch_document(
        &self,
        path: &[&str],
        query: &[(&str, &str)],
        shard: Option<Shard>,
    ) -> Result<Document> {
        let shard = self.shard_or_default(shard);
        let url = self.url(path, shard)?;
        debug!("PUBG request: {}", url.path());

        let started = Instant::now();
        let response = self
            .client
            .get(url)
            .query(query)
            .bearer_auth(&self.config.api_key)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| StatsError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| StatsError::Network(e.to_string()))?;
        debug!(
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "PUBG response"
        );

        if !status.is_success() {
            return Err(StatsError::Remote {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        let body: Document = serde_json::from_str(&text).map_err(|e| {
            StatsError::Parse(format!("{e}: {}", truncate(&text, 200)))
        })?;
        if body.get("data").is_none() {
            return Err(StatsError::Parse(format!(
                "Response has no data member: {}",
                truncate(&text, 200)
            )));
        }
        Ok(body)
    }

    /// Make a GET request and split the response into its envelope parts.
    pub async fn fetch(
        &self,
        path: &[&str],
        query: &[(&str, &str)],
        shard: Option<Shard>,
    ) -> Result<Envelope> {
        let body = self.fetch_document(path, query, shard).await?;
        serde_json::from_value(body).map_err(|e| StatsError::Parse(e.to_string()))
    }

    /// Fetch a leaderboard for a game mode (e.g. `squad-fpp`).
    pub async fn leaderboard(&self, game_mode: &str, shard: Option<Shard>) -> Result<Envelope> {
        self.fetch(&["leaderboards", game_mode], &[], shard).await
    }

    /// Fetch the sample match list.
    pub async fn samples(&self, shard: Option<Shard>) -> Result<Envelope> {
        self.fetch(&["samples"], &[], shard).await
    }

    /// Fetch a player's weapon mastery.
    pub async fn weapon_mastery(&self, player_id: &str, shard: Option<Shard>) -> Result<Envelope> {
        self.fetch(&["players", player_id, "weapon_mastery"], &[], shard)
            .await
    }

    /// Fetch a player's survival mastery.
    pub async fn survival_mastery(
        &self,
        player_id: &str,
        shard: Option<Shard>,
    ) -> Result<Envelope> {
        self.fetch(&["players", player_id, "survival_mastery"], &[], shard)
            .await
    }

    /// Fetch a `players` collection filtered by `filter_key`.
    async fn players_filtered(
        &self,
        filter_key: &str,
        values: &[&str],
        shard: Option<Shard>,
    ) -> Result<Vec<Document>> {
        let query: Vec<(&str, &str)> = values.iter().map(|v| (filter_key, *v)).collect();

        match self.fetch(&["players"], &query, shard).await {
            Ok(envelope) => envelope.into_collection(),
            // No match for any filter value
            Err(StatsError::Remote { status: 404, .. }) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl StatsProvider for PubgProvider {
    fn name(&self) -> &str {
        "PUBG"
    }

    fn default_shard(&self) -> Shard {
        self.config.default_shard
    }

    async fn players_by_names(
        &self,
        names: &[&str],
        shard: Option<Shard>,
    ) -> Result<Vec<Document>> {
        if names.is_empty() {
            return Err(StatsError::InvalidParameter(
                "Player names cannot be empty".to_string(),
            ));
        }
        self.players_filtered("filter[playerNames]", names, shard)
            .await
    }

    async fn players_by_ids(&self, ids: &[&str], shard: Option<Shard>) -> Result<Vec<Document>> {
        if ids.is_empty() {
            return Err(StatsError::InvalidParameter(
                "Player ids cannot be empty".to_string(),
            ));
        }
        if ids.len() > MAX_IDS_PER_REQUEST {
            return Err(StatsError::InvalidParameter(format!(
                "At most {MAX_IDS_PER_REQUEST} player ids per request, got {}",
                ids.len()
            )));
        }
        self.players_filtered("filter[playerIds]", ids, shard).await
    }

    async fn player(&self, player_id: &str, shard: Option<Shard>) -> Result<Document> {
        let envelope = self.fetch(&["players", player_id], &[], shard).await?;
        Ok(envelope.data)
    }

    async fn seasons(&self, shard: Option<Shard>) -> Result<Vec<Season>> {
        let envelope = self.fetch(&["seasons"], &[], shard).await?;
        let seasons: Vec<PubgSeason> =
            serde_json::from_value(envelope.data).map_err(|e| StatsError::Parse(e.to_string()))?;
        debug!(count = seasons.len(), "Fetched seasons");
        Ok(seasons.into_iter().map(Season::from).collect())
    }

    async fn season_stats(
        &self,
        player_id: &str,
        season_id: &str,
        shard: Option<Shard>,
    ) -> Result<Document> {
        let envelope = self
            .fetch(&["players", player_id, "seasons", season_id], &[], shard)
            .await?;
        Ok(envelope.data)
    }

    async fn match_detail(&self, match_id: &str, shard: Option<Shard>) -> Result<Document> {
        self.fetch_document(&["matches", match_id], &[], shard)
            .await
    }

    async fn clan(&self, clan_id: &str, shard: Option<Shard>) -> Result<Document> {
        let envelope = self.fetch(&["clans", clan_id], &[], shard).await?;
        Ok(envelope.data)
    }
}

/// Build a readable message from a non-2xx body.
///
/// Uses the first entry of a JSON:API error envelope when present, the raw
/// body otherwise.
fn error_message(text: &str) -> String {
    match serde_json::from_str::<PubgErrorEnvelope>(text) {
        Ok(envelope) => match envelope.errors.into_iter().next() {
            Some(PubgErrorObject {
                title,
                detail: Some(detail),
                ..
            }) => format!("{title} - {detail}"),
            Some(err) => err.title,
            None => truncate(text, 200).to_string(),
        },
        Err(_) => truncate(text, 200).to_string(),
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// ============================================================================
// PUBG API Response Types
// ============================================================================

/// A JSON:API response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Primary data: a resource object or an array of them.
    pub data: Document,
    /// Related resources (rosters, participants, assets, ...).
    #[serde(default)]
    pub included: Vec<Document>,
    /// Pagination and self links.
    #[serde(default)]
    pub links: Option<Document>,
    /// Free-form metadata.
    #[serde(default)]
    pub meta: Option<Document>,
}

impl Envelope {
    /// Returns `data` as a list of resources.
    ///
    /// # Errors
    /// Returns [`StatsError::Parse`] if `data` is neither an array nor an object.
    pub fn into_collection(self) -> Result<Vec<Document>> {
        match self.data {
            Document::Array(items) => Ok(items),
            item @ Document::Object(_) => Ok(vec![item]),
            other => Err(StatsError::Parse(format!(
                "Expected resource collection, got {other}"
            ))),
        }
    }
}

/// PUBG error envelope.
#[derive(Debug, Clone, Deserialize)]
struct PubgErrorEnvelope {
    #[serde(default)]
    errors: Vec<PubgErrorObject>,
}

/// One entry of a PUBG error envelope.
#[derive(Debug, Clone, Deserialize)]
struct PubgErrorObject {
    #[serde(default)]
    title: String,
    detail: Option<String>,
}

/// PUBG Season resource.
#[derive(Debug, Clone, Deserialize)]
struct PubgSeason {
    id: String,
    #[serde(default)]
    attributes: PubgSeasonAttributes,
}

/// PUBG Season attributes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PubgSeasonAttributes {
    #[serde(default)]
    is_current_season: bool,
    #[serde(default)]
    is_offseason: bool,
}

impl From<PubgSeason> for Season {
    fn from(season: PubgSeason) -> Self {
        Self {
            id: season.id,
            is_current_season: season.attributes.is_current_season,
            is_offseason: season.attributes.is_offseason,
        }
    }
}
