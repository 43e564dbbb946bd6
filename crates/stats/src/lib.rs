#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Read-through cache layer for PUBG player statistics.
//!
//! This crate re-exports the core types, the cache stores and the PUBG
//! provider, and adds the pieces that sit between them:
//!
//! - [`StatsService`] - Caller-facing operations (search, season stats, sync, matches)
//! - [`ReadThrough`] - Cache-first reads with write-back
//! - [`SyncRateLimiter`] - Per-player cooldown for forced syncs
//! - [`fetch_all`] - Bounded batch fetching that skips failed items
//! - [`Settings`] - Environment-driven configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use stats::{SeasonRequest, Settings, Shard, StatsService};
//!
//! #[tokio::main]
//! async fn main() -> stats::Result<()> {
//!     let service = StatsService::from_settings(&Settings::from_env()?)?;
//!
//!     let player = service.search_player_by_name("shroud", Some(Shard::Steam)).await?;
//!     let player_id = player.record.key.player_id().to_string();
//!
//!     let stats = service
//!         .get_season_stats(&player_id, &SeasonRequest::Current, None)
//!         .await?;
//!     println!("{} (cached: {})", stats.season_id, stats.stats.from_cache);
//!
//!     match service.force_sync(&player_id, None).await {
//!         Err(stats::StatsError::RateLimited { retry_after_secs }) => {
//!             println!("Try again in {retry_after_secs}s");
//!         }
//!         other => {
//!             other?;
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

// Core types and traits
pub use stats_core::*;

// Cache implementations
#[cfg(feature = "cache-sqlite")]
pub use stats_cache::SqliteCache;
pub use stats_cache::{InMemoryCache, NoopCache};

// Provider
pub use stats_pubg::{PubgConfig, PubgProvider};

/// Bounded batch fetching.
pub mod batch;
/// Service settings.
pub mod config;
/// Per-subject sync cooldown.
pub mod limiter;
/// Read-through cache coordination.
pub mod readthrough;
mod service;

pub use batch::{BatchReport, fetch_all, fetch_all_with_report};
pub use config::Settings;
pub use limiter::{SYNC_COOLDOWN_SECS, SyncDecision, SyncPermit, SyncRateLimiter};
pub use readthrough::{ReadThrough, Resolved};
pub use service::{FULL_SYNC_DETAIL, PLAYER_ID_GROUP_SIZE, SeasonStats, StatsService, SyncResult};
