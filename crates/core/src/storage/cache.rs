use crate::cache::{CacheRecord, CacheStore};
use anyhow::Context;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct PgCacheStore {
    pool: sqlx::PgPool,
}

impl PgCacheStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    /// Deletes records whose TTL ended before `before_epoch`. Records between
    /// their TTL and this cutoff remain available as stale fallbacks.
    pub async fn purge_expired(&self, before_epoch: i64) -> anyhow::Result<u64> {
        let res = sqlx::query("DELETE FROM series_cache WHERE ttl_epoch < $1")
            .persistent(false)
            .bind(before_epoch)
            .execute(&self.pool)
            .await
            .context("delete expired series_cache rows failed")?;
        Ok(res.rows_affected())
    }
}

#[async_trait::async_trait]
impl CacheStore for PgCacheStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<CacheRecord>> {
        let row = sqlx::query_as::<_, (String, String, DateTime<Utc>, i64)>(
            "SELECT cache_key, value_json, created_at, ttl_epoch \
             FROM series_cache \
             WHERE cache_key = $1",
        )
        .persistent(false)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("select series_cache failed (key={key})"))?;

        Ok(row.map(|(key, value_json, created_at, ttl_epoch)| CacheRecord {
            key,
            value_json,
            created_at,
            ttl_epoch,
        }))
    }

    async fn put(&self, record: CacheRecord) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO series_cache (cache_key, value_json, created_at, ttl_epoch) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (cache_key) DO UPDATE SET \
               value_json = EXCLUDED.value_json, \
               created_at = EXCLUDED.created_at, \
               ttl_epoch = EXCLUDED.ttl_epoch",
        )
        .persistent(false)
        .bind(&record.key)
        .bind(&record.value_json)
        .bind(record.created_at)
        .bind(record.ttl_epoch)
        .execute(&self.pool)
        .await
        .with_context(|| format!("upsert series_cache failed (key={})", record.key))?;
        Ok(())
    }
}
