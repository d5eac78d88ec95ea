use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;

/// Prefix shared by every key in the rate limit table.
pub const KEY_PREFIX: &str = "rate_limit";

/// Longest accepted window: 366 days.
pub const MAX_WINDOW_MS: u64 = 366 * 24 * 60 * 60 * 1000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("max_requests must be greater than zero")]
    ZeroRequests,
    #[error("window must be greater than zero")]
    ZeroWindow,
    #[error("window of {0}ms exceeds the 366 day maximum")]
    WindowTooLarge(u64),
}

/// "At most `max_requests` consumptions per `window_ms` milliseconds."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    max_requests: u32,
    window_ms: u64,
}

impl RateLimitPolicy {
    pub fn new(max_requests: u32, window_ms: u64) -> Result<Self, PolicyError> {
        if max_requests == 0 {
            return Err(PolicyError::ZeroRequests);
        }
        if window_ms == 0 {
            return Err(PolicyError::ZeroWindow);
        }
        if window_ms > MAX_WINDOW_MS {
            return Err(PolicyError::WindowTooLarge(window_ms));
        }
        Ok(Self {
            max_requests,
            window_ms,
        })
    }

    /// Built-in presets whose values are known to be in range.
    pub(crate) const fn preset(max_requests: u32, window_ms: u64) -> Self {
        Self {
            max_requests,
            window_ms,
        }
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    pub fn window(&self) -> Duration {
        // lossless: MAX_WINDOW_MS fits in i64
        Duration::milliseconds(self.window_ms.min(MAX_WINDOW_MS) as i64)
    }
}

/// One persisted row per limiter key.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RateLimitRecord {
    pub key: String,
    pub count: i32,
    pub expires_at: DateTime<Utc>,
}

impl RateLimitRecord {
    /// A record is expired once `expires_at` lies strictly before `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// What a caller learns about its quota after `check` or `consume`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    /// End of the window, in epoch seconds (rounded up).
    pub reset: i64,
}

impl RateLimitInfo {
    pub(crate) fn fresh(policy: &RateLimitPolicy, now: DateTime<Utc>) -> Self {
        Self {
            limit: policy.max_requests(),
            remaining: policy.max_requests(),
            reset: ceil_secs(
                now.timestamp_millis()
                    .saturating_add(policy.window().num_milliseconds()),
            ),
        }
    }

    pub(crate) fn from_record(policy: &RateLimitPolicy, record: &RateLimitRecord) -> Self {
        let used = u32::try_from(record.count.max(0)).unwrap_or(u32::MAX);
        Self {
            limit: policy.max_requests(),
            remaining: policy.max_requests().saturating_sub(used),
            reset: ceil_secs(record.expires_at.timestamp_millis()),
        }
    }
}

pub fn make_key(namespace: &str, identifier: &str) -> String {
    format!("{}:{}:{}", KEY_PREFIX, namespace, identifier)
}

/// Milliseconds to seconds, rounding towards positive infinity.
pub(crate) fn ceil_secs(ms: i64) -> i64 {
    ms.div_euclid(1000) + i64::from(ms.rem_euclid(1000) != 0)
}

/// Whole seconds until `expires_at`, rounded up and never negative.
pub(crate) fn retry_after_secs(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let ms = (expires_at - now).num_milliseconds();
    ceil_secs(ms).max(0) as u64
}
