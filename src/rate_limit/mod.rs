//! Fixed-window rate limiting with counters kept in a shared store.
//!
//! Each named [`RateLimiter`] addresses rows as
//! `rate_limit:<namespace>:<identifier>`, so several policies can share one
//! table. Storage is abstracted by [`RateLimitStore`]; see
//! [`crate::database::rate_limit`] for the Postgres implementation.

mod cleanup;
mod clock;
mod headers;
mod limiter;
mod memory;
mod registry;
mod store;
mod types;

pub use cleanup::{CleanupMode, spawn_sweeper, sweep_expired};
pub use clock::{Clock, ManualClock, SystemClock};
pub use headers::{
    X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING, X_RATELIMIT_RESET, apply_rate_limit_headers,
    apply_retry_after,
};
pub use limiter::{RateLimitError, RateLimiter};
pub use memory::MemoryRateLimitStore;
pub use registry::{AUTH, DEFAULT, PolicySet, RateLimiterRegistry, STRICT, UnknownPolicy};
pub use store::{Increment, RateLimitStore, StoreError};
pub use types::{
    MAX_WINDOW_MS, PolicyError, RateLimitInfo, RateLimitPolicy, RateLimitRecord, make_key,
};
