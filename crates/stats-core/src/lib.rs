#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core traits and types for the player statistics cache layer.
//!
//! This crate provides the foundational abstractions:
//!
//! - [`StatsProvider`](provider::StatsProvider) - Remote source of provider documents
//! - [`CacheStore`](cache::CacheStore) - Keyed persistence with sync history
//! - [`resolve_season`](season::resolve_season) - `current`/explicit season resolution
//! - [`StatsError`](error::StatsError) - Error taxonomy shared by every crate

/// Cache store trait.
pub mod cache;
/// Helpers for reading and merging provider documents.
pub mod document;
/// Error types for statistics operations.
pub mod error;
/// Provider trait for fetching statistics documents.
pub mod provider;
/// Season ordering and resolution.
pub mod season;
/// Core data types (Shard, CacheKey, CacheRecord, Season, etc.).
pub mod types;

// Re-export commonly used items at crate root
pub use cache::CacheStore;
pub use error::{Result, StatsError};
pub use provider::StatsProvider;
pub use season::{SeasonRequest, compare_recency, resolve_season};
pub use types::{
    CacheKey, CacheRecord, ClanInfo, Document, LIFETIME_SEASON_ID, Season, Shard,
    SyncHistoryEntry, SyncKind, SyncOutcome,
};
