use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::clock::Clock;
use super::store::RateLimitStore;

/// Where expired rows get purged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CleanupMode {
    /// Every `check`/`consume` sweeps the whole table first.
    #[default]
    Inline,
    /// A background task sweeps on a fixed interval; the hot path never does.
    Background { interval: Duration },
}

/// Run one sweep. Failures are logged and reported as zero rows removed.
pub async fn sweep_expired(store: &dyn RateLimitStore, now: DateTime<Utc>) -> u64 {
    match store.delete_expired(now).await {
        Ok(removed) => {
            if removed > 0 {
                debug!(removed, "expired rate limit records removed");
            }
            removed
        }
        Err(e) => {
            warn!(error = %e, "rate limit cleanup failed (non-critical)");
            0
        }
    }
}

pub fn spawn_sweeper(
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
    interval: Duration,
) -> JoinHandle<()> {
    info!(interval_secs = interval.as_secs(), "starting rate limit cleanup task");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            sweep_expired(store.as_ref(), clock.now()).await;
        }
    })
}
