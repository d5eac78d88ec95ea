use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use super::cleanup::CleanupMode;
use super::clock::Clock;
use super::limiter::RateLimiter;
use super::store::RateLimitStore;
use super::types::RateLimitPolicy;

pub const DEFAULT: &str = "default";
pub const AUTH: &str = "auth";
pub const STRICT: &str = "strict";

const FIFTEEN_MINUTES_MS: u64 = 15 * 60 * 1000;
const ONE_MINUTE_MS: u64 = 60 * 1000;

#[derive(Debug, Error)]
#[error("unknown rate limit policy: {0}")]
pub struct UnknownPolicy(pub String);

/// Named policies, before they are bound to a store.
#[derive(Debug, Clone)]
pub struct PolicySet {
    policies: HashMap<String, RateLimitPolicy>,
}

impl Default for PolicySet {
    fn default() -> Self {
        Self::empty()
            .with(DEFAULT, RateLimitPolicy::preset(100, FIFTEEN_MINUTES_MS))
            .with(AUTH, RateLimitPolicy::preset(20, FIFTEEN_MINUTES_MS))
            .with(STRICT, RateLimitPolicy::preset(10, ONE_MINUTE_MS))
    }
}

impl PolicySet {
    pub fn empty() -> Self {
        Self {
            policies: HashMap::new(),
        }
    }

    /// Add or replace a named policy.
    pub fn with(mut self, name: impl Into<String>, policy: RateLimitPolicy) -> Self {
        self.policies.insert(name.into(), policy);
        self
    }

    pub fn get(&self, name: &str) -> Option<&RateLimitPolicy> {
        self.policies.get(name)
    }
}

/// One shared [`RateLimiter`] per policy name.
///
/// Built once at startup and handed to request handlers through `AppState`.
pub struct RateLimiterRegistry {
    limiters: HashMap<String, Arc<RateLimiter>>,
}

impl RateLimiterRegistry {
    pub fn new(
        policies: PolicySet,
        store: Arc<dyn RateLimitStore>,
        clock: Arc<dyn Clock>,
        cleanup: CleanupMode,
    ) -> Self {
        let limiters = policies
            .policies
            .into_iter()
            .map(|(name, policy)| {
                let limiter = RateLimiter::new(name.clone(), policy, store.clone())
                    .with_clock(clock.clone())
                    .with_cleanup(cleanup);
                (name, Arc::new(limiter))
            })
            .collect();
        Self { limiters }
    }

    pub fn get(&self, name: &str) -> Option<Arc<RateLimiter>> {
        self.limiters.get(name).cloned()
    }

    pub fn require(&self, name: &str) -> Result<Arc<RateLimiter>, UnknownPolicy> {
        self.get(name).ok_or_else(|| UnknownPolicy(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.limiters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
