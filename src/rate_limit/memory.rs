use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, mapref::entry::Entry};

use super::store::{Increment, RateLimitStore, StoreError};
use super::types::RateLimitRecord;

/// Process-local store. Counts are not shared between replicas.
///
/// Each conditional write runs under the shard lock of its key.
#[derive(Debug, Default)]
pub struct MemoryRateLimitStore {
    records: DashMap<String, RateLimitRecord>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn find_one(&self, key: &str) -> Result<Option<RateLimitRecord>, StoreError> {
        Ok(self.records.get(key).map(|r| r.value().clone()))
    }

    async fn upsert(
        &self,
        key: &str,
        count: i32,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<RateLimitRecord>, StoreError> {
        let record = RateLimitRecord {
            key: key.to_string(),
            count,
            expires_at,
        };
        match self.records.entry(key.to_string()) {
            Entry::Occupied(existing) if !existing.get().is_expired(now) => Ok(None),
            Entry::Occupied(mut existing) => {
                existing.insert(record.clone());
                Ok(Some(record))
            }
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(Some(record))
            }
        }
    }

    async fn increment_count(
        &self,
        key: &str,
        max: u32,
        now: DateTime<Utc>,
    ) -> Result<Increment, StoreError> {
        let Some(mut record) = self.records.get_mut(key) else {
            return Ok(Increment::Missing);
        };
        if record.is_expired(now) {
            return Ok(Increment::Missing);
        }
        if i64::from(record.count) >= i64::from(max) {
            return Ok(Increment::Full(record.value().clone()));
        }
        record.count = record.count.saturating_add(1);
        Ok(Increment::Incremented(record.value().clone()))
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let before = self.records.len();
        self.records.retain(|_, r| !r.is_expired(now));
        Ok(before.saturating_sub(self.records.len()) as u64)
    }

    async fn delete_key(&self, key: &str) -> Result<(), StoreError> {
        self.records.remove(key);
        Ok(())
    }
}
