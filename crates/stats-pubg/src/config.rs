//! Client configuration.

use std::fmt;
use std::time::Duration;

use stats_core::Shard;

/// Production API host.
pub const DEFAULT_BASE_URL: &str = "https://api.pubg.com";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Immutable configuration for a [`PubgProvider`](crate::PubgProvider).
#[derive(Clone, PartialEq, Eq)]
pub struct PubgConfig {
    /// API key sent as a bearer token.
    pub api_key: String,
    /// Base URL, without trailing slash.
    pub base_url: String,
    /// Shard used when a call does not name one.
    pub default_shard: Shard,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl fmt::Debug for PubgConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PubgConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("default_shard", &self.default_shard)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl PubgConfig {
    /// Create a configuration with the given API key and defaults elsewhere.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            default_shard: Shard::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the default shard.
    #[must_use]
    pub const fn with_default_shard(mut self, shard: Shard) -> Self {
        self.default_shard = shard;
        self
    }

    /// Override the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
