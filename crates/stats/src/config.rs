//! Service settings.

use std::path::PathBuf;
use std::time::Duration;

use stats_core::{Result, Shard, StatsError};
use stats_pubg::PubgConfig;

/// Environment variable holding the API key.
pub const ENV_API_KEY: &str = "PUBG_OPEN_API_KEY";
/// Environment variable overriding the API base URL.
pub const ENV_BASE_URL: &str = "PUBG_API_BASE_URL";
/// Environment variable overriding the default shard.
pub const ENV_DEFAULT_SHARD: &str = "PUBG_DEFAULT_SHARD";
/// Environment variable overriding the request timeout, in seconds.
pub const ENV_TIMEOUT_SECS: &str = "PUBG_REQUEST_TIMEOUT_SECS";
/// Environment variable naming the SQLite cache file.
pub const ENV_CACHE_PATH: &str = "PUBG_CACHE_PATH";

/// Default number of concurrent match fetches.
pub const DEFAULT_MATCH_BATCH_SIZE: usize = 5;
/// Default number of recent matches returned.
pub const DEFAULT_RECENT_MATCH_LIMIT: usize = 20;

/// Everything needed to build a [`StatsService`](crate::StatsService).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Provider client configuration.
    pub provider: PubgConfig,
    /// SQLite cache file; `None` keeps the cache in memory.
    pub cache_path: Option<PathBuf>,
    /// Match details fetched concurrently per batch.
    pub match_batch_size: usize,
    /// Recent matches returned when the caller does not ask for a limit.
    pub recent_match_limit: usize,
}

impl Settings {
    /// Settings with the given API key and defaults elsewhere.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            provider: PubgConfig::new(api_key),
            cache_path: None,
            match_batch_size: DEFAULT_MATCH_BATCH_SIZE,
            recent_match_limit: DEFAULT_RECENT_MATCH_LIMIT,
        }
    }

    /// Reads settings from the process environment.
    ///
    /// # Errors
    /// Returns [`StatsError::Configuration`] when the API key is missing or a
    /// value does not parse.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads settings through `lookup`, which maps a variable name to its value.
    ///
    /// Blank values count as unset.
    ///
    /// # Errors
    /// Same as [`Settings::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = get(ENV_API_KEY)
            .ok_or_else(|| StatsError::Configuration(format!("{ENV_API_KEY} is not set")))?;
        let mut settings = Self::new(api_key);

        if let Some(base_url) = get(ENV_BASE_URL) {
            settings.provider = settings.provider.with_base_url(base_url);
        }
        if let Some(shard) = get(ENV_DEFAULT_SHARD) {
            let shard: Shard = shard
                .parse()
                .map_err(|e| StatsError::Configuration(format!("{ENV_DEFAULT_SHARD}: {e}")))?;
            settings.provider = settings.provider.with_default_shard(shard);
        }
        if let Some(secs) = get(ENV_TIMEOUT_SECS) {
            let secs: u64 = secs.parse().map_err(|e| {
                StatsError::Configuration(format!("{ENV_TIMEOUT_SECS}: {e}"))
            })?;
            settings.provider = settings.provider.with_timeout(Duration::from_secs(secs));
        }
        settings.cache_path = get(ENV_CACHE_PATH).map(PathBuf::from);

        Ok(settings)
    }

    /// Override the cache file.
    #[must_use]
    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    /// Override the match batch size.
    #[must_use]
    pub const fn with_match_batch_size(mut self, size: usize) -> Self {
        self.match_batch_size = size;
        self
    }
}
