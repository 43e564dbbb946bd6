#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Cache store implementations for the player statistics cache layer.
//!
//! This crate provides implementations of the [`CacheStore`] trait from `stats-core`:
//!
//! - [`SqliteCache`] - Persistent SQLite-based store (default, requires `sqlite` feature)
//! - [`InMemoryCache`] - Simple in-memory store for testing
//! - [`NoopCache`] - No-op store that doesn't keep anything

/// In-memory cache implementation.
pub mod memory;
/// No-op cache implementation.
pub mod noop;

/// SQLite-based cache implementation.
#[cfg(feature = "sqlite")]
pub mod sqlite;

// Re-export the trait for convenience
pub use stats_core::CacheStore;

// Re-export implementations
pub use memory::InMemoryCache;
pub use noop::NoopCache;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteCache;
