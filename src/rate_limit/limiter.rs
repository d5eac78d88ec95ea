use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, trace};

use super::cleanup::{CleanupMode, sweep_expired};
use super::clock::{Clock, SystemClock};
use super::store::{Increment, RateLimitStore, StoreError};
use super::types::{RateLimitInfo, RateLimitPolicy, RateLimitRecord, make_key, retry_after_secs};

/// Lookups allowed per consume before giving up on a key other callers keep rewriting.
const MAX_ATTEMPTS: usize = 3;

#[derive(Debug, Error)]
pub enum RateLimitError {
    /// The quota for the current window is used up. Not retried here.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    Exceeded {
        retry_after_secs: u64,
        info: RateLimitInfo,
    },

    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Fixed-window limiter whose counters live in a shared [`RateLimitStore`].
///
/// There is no in-process locking. Whether a window still has room is decided
/// by the store inside its conditional increment, and a new window only
/// replaces an expired row, so concurrent callers in this process or in other
/// replicas never get more than `max_requests` admissions per window.
pub struct RateLimiter {
    namespace: String,
    policy: RateLimitPolicy,
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
    cleanup: CleanupMode,
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("namespace", &self.namespace)
            .field("policy", &self.policy)
            .field("cleanup", &self.cleanup)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    pub fn new(
        namespace: impl Into<String>,
        policy: RateLimitPolicy,
        store: Arc<dyn RateLimitStore>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            policy,
            store,
            clock: Arc::new(SystemClock),
            cleanup: CleanupMode::Inline,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_cleanup(mut self, cleanup: CleanupMode) -> Self {
        self.cleanup = cleanup;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    pub fn key(&self, identifier: &str) -> String {
        make_key(&self.namespace, identifier)
    }

    /// Report the quota for `identifier` without touching its record.
    ///
    /// With no live window, the returned `reset` describes the window a
    /// consume issued right now would open.
    pub async fn check(&self, identifier: &str) -> Result<RateLimitInfo, RateLimitError> {
        let now = self.clock.now();
        self.sweep(now).await;

        let key = self.key(identifier);
        let info = match self.store.find_one(&key).await? {
            Some(record) if !record.is_expired(now) => {
                RateLimitInfo::from_record(&self.policy, &record)
            }
            _ => RateLimitInfo::fresh(&self.policy, now),
        };
        Ok(info)
    }

    /// Record one request for `identifier`, or reject it if the window is full.
    pub async fn consume(&self, identifier: &str) -> Result<RateLimitInfo, RateLimitError> {
        let now = self.clock.now();
        self.sweep(now).await;

        let key = self.key(identifier);
        let max = self.policy.max_requests();
        let expires_at = now
            .checked_add_signed(self.policy.window())
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        for _ in 0..MAX_ATTEMPTS {
            let live = self
                .store
                .find_one(&key)
                .await?
                .is_some_and(|record| !record.is_expired(now));

            if live {
                match self.store.increment_count(&key, max, now).await? {
                    Increment::Incremented(record) => {
                        trace!(key = %key, count = record.count, "rate limit counter incremented");
                        return Ok(RateLimitInfo::from_record(&self.policy, &record));
                    }
                    Increment::Full(record) => return Err(self.exceeded(&key, &record, now)),
                    // Expired or deleted since the lookup.
                    Increment::Missing => {}
                }
            }

            match self.store.upsert(&key, 1, expires_at, now).await? {
                Some(record) => {
                    trace!(key = %key, expires_at = %record.expires_at, "rate limit window opened");
                    return Ok(RateLimitInfo::from_record(&self.policy, &record));
                }
                // Another caller opened the window first; join it on the next pass.
                None => trace!(key = %key, "rate limit window already open"),
            }
        }

        Err(StoreError::Contended(key).into())
    }

    /// Forget the window for `identifier`. Idempotent.
    pub async fn reset(&self, identifier: &str) -> Result<(), RateLimitError> {
        let key = self.key(identifier);
        self.store.delete_key(&key).await?;
        debug!(key = %key, "rate limit reset");
        Ok(())
    }

    fn exceeded(&self, key: &str, record: &RateLimitRecord, now: DateTime<Utc>) -> RateLimitError {
        let retry_after_secs = retry_after_secs(record.expires_at, now);
        debug!(key = %key, count = record.count, retry_after_secs, "rate limit exceeded");
        RateLimitError::Exceeded {
            retry_after_secs,
            info: RateLimitInfo::from_record(&self.policy, record),
        }
    }

    async fn sweep(&self, now: DateTime<Utc>) {
        if self.cleanup == CleanupMode::Inline {
            sweep_expired(self.store.as_ref(), now).await;
        }
    }
}
