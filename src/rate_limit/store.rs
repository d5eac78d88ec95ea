use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::types::RateLimitRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("concurrent updates to {0} did not settle")]
    Contended(String),
}

/// Outcome of a conditional increment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Increment {
    /// The live window had room and its count went up by one.
    Incremented(RateLimitRecord),
    /// The live window is already at the limit. Nothing was written.
    Full(RateLimitRecord),
    /// No live window for the key (absent or expired).
    Missing,
}

/// Storage contract the limiter relies on.
///
/// Both writes are conditional and must be atomic per key. The limiter never
/// writes back a record it has read, and never decides "room left" on its own:
/// the store decides inside the write.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn find_one(&self, key: &str) -> Result<Option<RateLimitRecord>, StoreError>;

    /// Create the row for `key`, or replace it if it expired before `now`.
    ///
    /// Returns `None` without writing when a live row already exists.
    async fn upsert(
        &self,
        key: &str,
        count: i32,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<RateLimitRecord>, StoreError>;

    /// `count += 1` for a live row whose count is below `max`.
    async fn increment_count(
        &self,
        key: &str,
        max: u32,
        now: DateTime<Utc>,
    ) -> Result<Increment, StoreError>;

    /// Remove every row with `expires_at < now`, returning how many went away.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;

    async fn delete_key(&self, key: &str) -> Result<(), StoreError>;
}
