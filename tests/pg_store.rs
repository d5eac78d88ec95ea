//! Runs against a real Postgres. Requires `DATABASE_URL`:
//!
//! ```sh
//! DATABASE_URL=postgres://localhost/issuedesk_test cargo test -- --ignored
//! ```

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use issuedesk::database::PgRateLimitStore;
use issuedesk::rate_limit::{
    Increment, ManualClock, RateLimitError, RateLimitPolicy, RateLimitStore, RateLimiter,
};
use sqlx::postgres::PgPoolOptions;

async fn store() -> PgRateLimitStore {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect(&url)
        .await
        .expect("connect");
    let store = PgRateLimitStore::new(pool);
    store.ensure_schema().await.expect("schema");
    store
}

fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

#[tokio::test]
#[ignore]
async fn conditional_upsert_and_increment() {
    let store = store().await;
    let key = unique("pg-store");
    let now = DateTime::from_timestamp(Utc::now().timestamp(), 0).unwrap();
    let expires = now + Duration::seconds(60);

    assert_eq!(
        store.increment_count(&key, 2, now).await.unwrap(),
        Increment::Missing
    );

    let opened = store.upsert(&key, 1, expires, now).await.unwrap().unwrap();
    assert_eq!(opened.count, 1);
    // live row is left alone
    assert!(store.upsert(&key, 1, expires, now).await.unwrap().is_none());

    match store.increment_count(&key, 2, now).await.unwrap() {
        Increment::Incremented(record) => {
            assert_eq!(record.count, 2);
            assert_eq!(record.expires_at, expires);
        }
        other => panic!("expected increment, got {other:?}"),
    }
    assert!(matches!(
        store.increment_count(&key, 2, now).await.unwrap(),
        Increment::Full(r) if r.count == 2
    ));

    // once expired, increments stop and the window can be replaced
    let later = expires + Duration::seconds(1);
    assert_eq!(
        store.increment_count(&key, 2, later).await.unwrap(),
        Increment::Missing
    );
    let replaced = store
        .upsert(&key, 1, later + Duration::seconds(60), later)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(replaced.count, 1);

    store.delete_key(&key).await.unwrap();
    store.delete_key(&key).await.unwrap();
    assert!(store.find_one(&key).await.unwrap().is_none());
}

#[tokio::test]
#[ignore]
async fn delete_expired_spares_live_rows() {
    let store = store().await;
    let now = Utc::now();
    let past = now - Duration::seconds(60);
    let stale = unique("pg-stale");
    let live = unique("pg-live");
    store.upsert(&stale, 3, now - Duration::seconds(5), past).await.unwrap();
    store.upsert(&live, 3, now + Duration::seconds(60), past).await.unwrap();

    assert!(store.delete_expired(now).await.unwrap() >= 1);
    assert!(store.find_one(&stale).await.unwrap().is_none());
    assert!(store.find_one(&live).await.unwrap().is_some());
    store.delete_key(&live).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn concurrent_consumes_over_postgres() {
    let store = Arc::new(store().await);
    let limiter = Arc::new(RateLimiter::new(
        unique("pg-concurrent"),
        RateLimitPolicy::new(5, 60_000).unwrap(),
        store.clone(),
    ));

    let handles: Vec<_> = (0..40)
        .map(|_| {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.consume("a").await })
        })
        .collect();
    let mut admitted = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            admitted += 1;
        }
    }

    assert_eq!(admitted, 5);
    let record = store.find_one(&limiter.key("a")).await.unwrap().unwrap();
    assert_eq!(record.count, 5);
    limiter.reset("a").await.unwrap();
}

#[tokio::test]
#[ignore]
async fn limiter_over_postgres() {
    let store = Arc::new(store().await);
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let limiter = RateLimiter::new(
        unique("pg-limiter"),
        RateLimitPolicy::new(3, 1000).unwrap(),
        store.clone(),
    )
    .with_clock(clock.clone());

    for expected in [2, 1, 0] {
        assert_eq!(limiter.consume("a").await.unwrap().remaining, expected);
    }
    match limiter.consume("a").await {
        Err(RateLimitError::Exceeded {
            retry_after_secs, ..
        }) => assert!(retry_after_secs <= 1),
        other => panic!("expected rejection, got {other:?}"),
    }

    clock.advance(Duration::milliseconds(1100));
    assert_eq!(limiter.consume("a").await.unwrap().remaining, 2);
    limiter.reset("a").await.unwrap();
}
