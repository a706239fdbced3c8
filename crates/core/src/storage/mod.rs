pub mod cache;

use crate::cache::{MemoryCacheStore, SeriesCache};
use crate::config::{CacheBackend, Settings};
use anyhow::Context;
use std::sync::Arc;

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}

/// Picks the cache backend. A Postgres backend without a usable pool
/// degrades to no cache rather than failing startup.
pub fn series_cache(settings: &Settings, pool: Option<sqlx::PgPool>) -> SeriesCache {
    match (settings.cache_backend, pool) {
        (CacheBackend::Postgres, Some(pool)) => SeriesCache::new(Arc::new(cache::PgCacheStore::new(pool))),
        (CacheBackend::Postgres, None) => {
            tracing::warn!("postgres cache configured but no database pool; caching disabled");
            SeriesCache::disabled()
        }
        (CacheBackend::Memory, _) => SeriesCache::new(Arc::new(MemoryCacheStore::new())),
        (CacheBackend::Disabled, _) => SeriesCache::disabled(),
    }
}
