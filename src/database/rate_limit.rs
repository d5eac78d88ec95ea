// 限流计数存储
// rate_limits 表由所有限流器实例和服务副本共享

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::rate_limit::{Increment, RateLimitRecord, RateLimitStore, StoreError};

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS rate_limits (
    key         TEXT PRIMARY KEY,
    count       INTEGER NOT NULL,
    expires_at  TIMESTAMPTZ NOT NULL
)
"#;

const CREATE_EXPIRY_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS rate_limits_expires_at_idx ON rate_limits (expires_at)";

/// Postgres 实现，条件 `ON CONFLICT` 与条件 `count = count + 1` 保证单行原子性
#[derive(Clone)]
pub struct PgRateLimitStore {
    db: PgPool,
}

impl PgRateLimitStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 建表（幂等）
    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(CREATE_TABLE).execute(&self.db).await?;
        sqlx::query(CREATE_EXPIRY_INDEX).execute(&self.db).await?;
        Ok(())
    }
}

#[async_trait]
impl RateLimitStore for PgRateLimitStore {
    async fn find_one(&self, key: &str) -> Result<Option<RateLimitRecord>, StoreError> {
        let record = sqlx::query_as::<_, RateLimitRecord>(
            r#"
            SELECT key, count, expires_at
            FROM rate_limits
            WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.db)
        .await?;

        Ok(record)
    }

    async fn upsert(
        &self,
        key: &str,
        count: i32,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<RateLimitRecord>, StoreError> {
        // 仅当旧窗口已过期时覆盖，存活窗口不返回行
        let record = sqlx::query_as::<_, RateLimitRecord>(
            r#"
            INSERT INTO rate_limits (key, count, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE
            SET count = EXCLUDED.count, expires_at = EXCLUDED.expires_at
            WHERE rate_limits.expires_at < $4
            RETURNING key, count, expires_at
            "#,
        )
        .bind(key)
        .bind(count)
        .bind(expires_at)
        .bind(now)
        .fetch_optional(&self.db)
        .await?;

        Ok(record)
    }

    async fn increment_count(
        &self,
        key: &str,
        max: u32,
        now: DateTime<Utc>,
    ) -> Result<Increment, StoreError> {
        let updated = sqlx::query_as::<_, RateLimitRecord>(
            r#"
            UPDATE rate_limits
            SET count = count + 1
            WHERE key = $1 AND count < $2 AND expires_at >= $3
            RETURNING key, count, expires_at
            "#,
        )
        .bind(key)
        .bind(i64::from(max))
        .bind(now)
        .fetch_optional(&self.db)
        .await?;

        if let Some(record) = updated {
            return Ok(Increment::Incremented(record));
        }

        // 未更新：区分额度已满与窗口不存在
        match self.find_one(key).await? {
            Some(record)
                if !record.is_expired(now) && i64::from(record.count) >= i64::from(max) =>
            {
                Ok(Increment::Full(record))
            }
            _ => Ok(Increment::Missing),
        }
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM rate_limits WHERE expires_at < $1")
            .bind(now)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_key(&self, key: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM rate_limits WHERE key = $1")
            .bind(key)
            .execute(&self.db)
            .await?;

        Ok(())
    }
}
