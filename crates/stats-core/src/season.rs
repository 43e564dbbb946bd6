//! Season resolution.
//!
//! The provider does not expose season start dates. Recency is derived from
//! the season id: newer ids sort later lexicographically
//! (`division.bro.official.pc-2018-31` > `division.bro.official.pc-2018-30`).
//! That ordering is isolated in [`compare_recency`] so it can be replaced if
//! the id format changes.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use tracing::warn;

use crate::{
    error::{Result, StatsError},
    types::{LIFETIME_SEASON_ID, Season},
};

/// Which season a caller asks for.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SeasonRequest {
    /// The season flagged current, or the most recent one.
    Current,
    /// The lifetime pseudo-season.
    Lifetime,
    /// A season id, matched byte-for-byte.
    Explicit(String),
}

impl FromStr for SeasonRequest {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "current" => Self::Current,
            LIFETIME_SEASON_ID => Self::Lifetime,
            other => Self::Explicit(other.to_string()),
        })
    }
}

impl From<&str> for SeasonRequest {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(request) => request,
            Err(never) => match never {},
        }
    }
}

impl fmt::Display for SeasonRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Current => f.write_str("current"),
            Self::Lifetime => f.write_str(LIFETIME_SEASON_ID),
            Self::Explicit(id) => f.write_str(id),
        }
    }
}

/// Orders two seasons most recent first.
///
/// Descending string comparison of the full id.
#[must_use]
pub fn compare_recency(a: &Season, b: &Season) -> Ordering {
    b.id.cmp(&a.id)
}

/// Sorts seasons most recent first.
pub fn sort_most_recent_first(seasons: &mut [Season]) {
    seasons.sort_by(compare_recency);
}

/// Returns up to `n` most recent seasons.
#[must_use]
pub fn most_recent(seasons: &[Season], n: usize) -> Vec<Season> {
    let mut sorted = seasons.to_vec();
    sort_most_recent_first(&mut sorted);
    sorted.truncate(n);
    sorted
}

/// Returns the season flagged current, falling back to the most recent id.
///
/// # Errors
/// Returns [`StatsError::NotFound`] if `seasons` is empty.
pub fn current_season(seasons: &[Season]) -> Result<&Season> {
    if let Some(season) = seasons.iter().find(|s| s.is_current_season) {
        return Ok(season);
    }

    let fallback = seasons
        .iter()
        .min_by(|a, b| compare_recency(a, b))
        .ok_or_else(|| StatsError::NotFound("No seasons listed".to_string()))?;
    warn!(
        season_id = %fallback.id,
        "No season flagged current, falling back to most recent id"
    );
    Ok(fallback)
}

/// Resolves an explicit or `current` season request against a season list.
///
/// # Errors
/// Returns [`StatsError::NotFound`] when the list is empty (for `current`) or
/// the explicit id is absent, and [`StatsError::InvalidParameter`] for the
/// lifetime pseudo-season, which is never listed.
pub fn resolve_season<'a>(seasons: &'a [Season], requested: &SeasonRequest) -> Result<&'a Season> {
    match requested {
        SeasonRequest::Current => current_season(seasons),
        SeasonRequest::Explicit(id) => seasons
            .iter()
            .find(|s| s.id == *id)
            .ok_or_else(|| StatsError::NotFound(format!("Season {id}"))),
        SeasonRequest::Lifetime => Err(StatsError::InvalidParameter(
            "Lifetime is not a listed season".to_string(),
        )),
    }
}
