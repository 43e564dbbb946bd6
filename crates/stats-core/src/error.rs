//! Error types for statistics operations.
//!
//! This module defines [`StatsError`] which covers all error cases that can occur
//! when fetching provider documents, reading or writing the cache, or gating syncs.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during statistics operations.
#[derive(Error, Debug)]
pub enum StatsError {
    /// The provider answered with a non-2xx status.
    #[error("Remote error (HTTP {status}): {message}")]
    Remote {
        /// HTTP status code returned by the provider.
        status: u16,
        /// Message extracted from the provider's error envelope, or the raw body.
        message: String,
    },

    /// Transport-level failures (connection refused, timeouts, etc.).
    #[error("Network error: {0}")]
    Network(String),

    /// The provider body was not valid structured data.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The requested player, season or record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A forced sync was attempted inside the cooldown window.
    #[error("Sync cooldown active: retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds until the next sync is allowed.
        retry_after_secs: u64,
    },

    /// Error interacting with the cache store.
    #[error("Store error: {0}")]
    Store(String),

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The requested feature is not supported by the provider.
    #[error("Feature not supported: {0}")]
    NotSupported(String),

    /// Required configuration is missing or malformed.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl StatsError {
    /// Returns true when the error means the entity does not exist.
    ///
    /// A provider 404 counts as not-found so callers can tell it apart from
    /// transient failures.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Remote { status: 404, .. })
    }

    /// Returns true when retrying the same request later may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::RateLimited { .. } => true,
            Self::Remote { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Returns the wait time carried by a [`StatsError::RateLimited`] error.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after_secs } => Some(Duration::from_secs(*retry_after_secs)),
            _ => None,
        }
    }
}

/// Result type alias using [`StatsError`].
pub type Result<T> = std::result::Result<T, StatsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        assert!(StatsError::NotFound("player shroud".into()).is_not_found());
        assert!(
            StatsError::Remote {
                status: 404,
                message: "Not Found".into()
            }
            .is_not_found()
        );
        assert!(
            !StatsError::Remote {
                status: 503,
                message: "Unavailable".into()
            }
            .is_not_found()
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(StatsError::Network("timed out".into()).is_transient());
        assert!(
            StatsError::Remote {
                status: 429,
                message: "Too Many Requests".into()
            }
            .is_transient()
        );
        assert!(
            !StatsError::Remote {
                status: 404,
                message: "Not Found".into()
            }
            .is_transient()
        );
        assert!(!StatsError::Parse("bad json".into()).is_transient());
    }

    #[test]
    fn test_retry_after() {
        let err = StatsError::RateLimited {
            retry_after_secs: 180,
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(180)));
        assert_eq!(StatsError::Store("locked".into()).retry_after(), None);
        assert_eq!(err.to_string(), "Sync cooldown active: retry after 180s");
    }
}
