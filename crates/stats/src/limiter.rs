//! Per-subject sync cooldown.
//!
//! A forced sync is allowed when the subject has no successful sync on record,
//! or when the most recent one is at least [`SYNC_COOLDOWN_SECS`] old. The
//! check and the sync it guards run under a per-subject lock, so two
//! concurrent forced syncs of the same subject cannot both pass. Different
//! subjects never share a lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use stats_core::{CacheStore, Result, StatsError};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, instrument, warn};

/// Minimum time between two successful syncs of the same subject.
pub const SYNC_COOLDOWN_SECS: u64 = 300;

/// Outcome of a cooldown check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDecision {
    /// The sync may run.
    Allowed,
    /// The sync must wait.
    Denied {
        /// Seconds until the cooldown ends.
        retry_after_secs: u64,
    },
}

impl SyncDecision {
    /// Returns true for [`SyncDecision::Allowed`].
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Decides whether a subject last synced at `last_success` may sync at `now`.
///
/// A `last_success` later than `now` (clock skew) is denied for the full
/// cooldown.
#[must_use]
pub fn decide(last_success: Option<DateTime<Utc>>, now: DateTime<Utc>) -> SyncDecision {
    let Some(last) = last_success else {
        return SyncDecision::Allowed;
    };

    let Ok(elapsed) = u64::try_from((now - last).num_seconds()) else {
        return SyncDecision::Denied {
            retry_after_secs: SYNC_COOLDOWN_SECS,
        };
    };

    if elapsed >= SYNC_COOLDOWN_SECS {
        SyncDecision::Allowed
    } else {
        SyncDecision::Denied {
            retry_after_secs: SYNC_COOLDOWN_SECS - elapsed,
        }
    }
}

/// A subject's lock and the number of permits and waiters using it.
#[derive(Debug, Default)]
struct SubjectLock {
    mutex: Arc<tokio::sync::Mutex<()>>,
    users: usize,
}

type SubjectLocks = HashMap<String, SubjectLock>;

/// Gate for forced syncs, backed by the store's sync history.
pub struct SyncRateLimiter {
    store: Arc<dyn CacheStore>,
    locks: Mutex<SubjectLocks>,
}

impl std::fmt::Debug for SyncRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let held = self
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("SyncRateLimiter")
            .field("cooldown_secs", &SYNC_COOLDOWN_SECS)
            .field("subjects_locked", &held)
            .finish()
    }
}

impl SyncRateLimiter {
    /// Create a limiter reading sync history from `store`.
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Checks the cooldown for `subject_id` without taking the subject lock.
    ///
    /// A store failure is logged and treated as "no prior sync".
    #[instrument(skip(self))]
    pub async fn check(&self, subject_id: &str) -> SyncDecision {
        let last = match self.store.latest_successful_sync(subject_id).await {
            Ok(last) => last,
            Err(e) => {
                warn!(error = %e, "Failed to read sync history, allowing sync");
                None
            }
        };
        decide(last, Utc::now())
    }

    /// Returns true if a forced sync of `subject_id` would be allowed now.
    pub async fn can_sync(&self, subject_id: &str) -> bool {
        self.check(subject_id).await.is_allowed()
    }

    /// Takes the subject lock and checks the cooldown under it.
    ///
    /// Hold the returned permit until the sync and its history entries are
    /// written.
    ///
    /// # Errors
    /// Returns [`StatsError::RateLimited`] while the cooldown is active.
    #[instrument(skip(self))]
    pub async fn acquire(&self, subject_id: &str) -> Result<SyncPermit<'_>> {
        // Registered before waiting, so a cancelled waiter still unregisters
        let (registration, mutex) = self.register(subject_id);
        let guard = mutex.lock_owned().await;
        let permit = SyncPermit {
            _guard: guard,
            registration,
        };

        match self.check(subject_id).await {
            SyncDecision::Allowed => {
                debug!("Sync permitted");
                Ok(permit)
            }
            SyncDecision::Denied { retry_after_secs } => {
                debug!(retry_after_secs, "Sync rejected by cooldown");
                Err(StatsError::RateLimited { retry_after_secs })
            }
        }
    }

    fn register(&self, subject_id: &str) -> (Registration<'_>, Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        let lock = locks.entry(subject_id.to_string()).or_default();
        lock.users += 1;
        let registration = Registration {
            limiter: self,
            subject_id: subject_id.to_string(),
        };
        (registration, Arc::clone(&lock.mutex))
    }

    fn release(&self, subject_id: &str) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(lock) = locks.get_mut(subject_id) {
            lock.users = lock.users.saturating_sub(1);
            if lock.users == 0 {
                locks.remove(subject_id);
            }
        }
    }

    #[cfg(test)]
    fn tracked_subjects(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// One user of a subject lock; unregisters on drop.
struct Registration<'a> {
    limiter: &'a SyncRateLimiter,
    subject_id: String,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.limiter.release(&self.subject_id);
    }
}

/// Exclusive right to sync one subject; released on drop.
#[must_use = "the subject is unlocked as soon as the permit is dropped"]
pub struct SyncPermit<'a> {
    // Fields drop in order: the subject is unlocked before it is unregistered
    _guard: OwnedMutexGuard<()>,
    registration: Registration<'a>,
}

impl SyncPermit<'_> {
    /// The subject this permit locks.
    #[must_use]
    pub fn subject_id(&self) -> &str {
        &self.registration.subject_id
    }
}

impl std::fmt::Debug for SyncPermit<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncPermit")
            .field("subject_id", &self.subject_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use stats_cache::InMemoryCache;
    use stats_core::{SyncHistoryEntry, SyncKind};

    #[test]
    fn test_decide_boundaries() {
        let now = Utc::now();

        assert_eq!(decide(None, now), SyncDecision::Allowed);
        assert_eq!(
            decide(Some(now), now),
            SyncDecision::Denied {
                retry_after_secs: 300
            }
        );
        assert_eq!(
            decide(Some(now - Duration::seconds(120)), now),
            SyncDecision::Denied {
                retry_after_secs: 180
            }
        );
        assert_eq!(
            decide(Some(now - Duration::seconds(299)), now),
            SyncDecision::Denied {
                retry_after_secs: 1
            }
        );
        assert_eq!(
            decide(Some(now - Duration::seconds(300)), now),
            SyncDecision::Allowed
        );
        assert_eq!(
            decide(Some(now + Duration::seconds(30)), now),
            SyncDecision::Denied {
                retry_after_secs: 300
            }
        );
    }

    #[tokio::test]
    async fn test_acquire_reads_history() {
        let store = Arc::new(InMemoryCache::new());
        let limiter = SyncRateLimiter::new(store.clone());

        assert!(limiter.can_sync("account.1").await);

        store
            .append_sync_history(
                SyncHistoryEntry::success("account.1", SyncKind::Player)
                    .at(Utc::now() - Duration::seconds(120)),
            )
            .await
            .unwrap();

        match limiter.acquire("account.1").await {
            Err(StatsError::RateLimited { retry_after_secs }) => {
                assert!((179..=180).contains(&retry_after_secs));
            }
            other => panic!("expected rate limit, got {other:?}"),
        }

        // Other subjects are unaffected
        let permit = limiter.acquire("account.2").await.unwrap();
        assert_eq!(permit.subject_id(), "account.2");
    }

    #[tokio::test]
    async fn test_failed_syncs_do_not_start_cooldown() {
        let store = Arc::new(InMemoryCache::new());
        let limiter = SyncRateLimiter::new(store.clone());

        store
            .append_sync_history(SyncHistoryEntry::failed(
                "account.1",
                SyncKind::Player,
                "boom",
            ))
            .await
            .unwrap();

        assert!(limiter.can_sync("account.1").await);
    }

    #[tokio::test]
    async fn test_locks_are_released() {
        let limiter = SyncRateLimiter::new(Arc::new(InMemoryCache::new()));

        {
            let _permit = limiter.acquire("account.1").await.unwrap();
            assert_eq!(limiter.tracked_subjects(), 1);
        }
        assert_eq!(limiter.tracked_subjects(), 0);

        // A rejected acquire leaves nothing behind either
        let store = Arc::new(InMemoryCache::new());
        store
            .append_sync_history(SyncHistoryEntry::success("account.1", SyncKind::Player))
            .await
            .unwrap();
        let limiter = SyncRateLimiter::new(store);
        assert!(limiter.acquire("account.1").await.is_err());
        assert_eq!(limiter.tracked_subjects(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_is_unregistered() {
        let limiter = SyncRateLimiter::new(Arc::new(InMemoryCache::new()));

        let holder = limiter.acquire("account.1").await.unwrap();
        let mut waiter = Box::pin(limiter.acquire("account.1"));
        assert!(futures::poll!(&mut waiter).is_pending());
        assert_eq!(limiter.tracked_subjects(), 1);

        // Holder finishes first, then the parked waiter is cancelled
        drop(holder);
        assert_eq!(limiter.tracked_subjects(), 1);
        drop(waiter);
        assert_eq!(limiter.tracked_subjects(), 0);

        // A waiter timing out while the subject is held leaves only the holder
        let holder = limiter.acquire("account.1").await.unwrap();
        let timed_out = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            limiter.acquire("account.1"),
        )
        .await;
        assert!(timed_out.is_err());
        assert_eq!(limiter.tracked_subjects(), 1);
        drop(holder);
        assert_eq!(limiter.tracked_subjects(), 0);
    }

    #[tokio::test]
    async fn test_waiter_runs_after_holder() {
        let limiter = SyncRateLimiter::new(Arc::new(InMemoryCache::new()));

        let holder = limiter.acquire("account.1").await.unwrap();
        let mut waiter = Box::pin(limiter.acquire("account.1"));
        assert!(futures::poll!(&mut waiter).is_pending());

        drop(holder);
        let permit = waiter.await.unwrap();
        assert_eq!(permit.subject_id(), "account.1");
        assert_eq!(limiter.tracked_subjects(), 1);
        drop(permit);
        assert_eq!(limiter.tracked_subjects(), 0);
    }
}
