//! Advisory TTL cache with stale fallback.
//!
//! The cache never decides correctness: without a backend every call fetches
//! fresh, and backend failures are downgraded to misses.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub key: String,
    pub value_json: String,
    pub created_at: DateTime<Utc>,
    pub ttl_epoch: i64,
}

/// Key-value backend. Records are written whole, so readers never observe a
/// partial value; concurrent writers race and the last one wins.
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<CacheRecord>>;

    async fn put(&self, record: CacheRecord) -> anyhow::Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    records: tokio::sync::RwLock<HashMap<String, CacheRecord>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<CacheRecord>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn put(&self, record: CacheRecord) -> anyhow::Result<()> {
        self.records
            .write()
            .await
            .insert(record.key.clone(), record);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDiagnostic {
    ReadFailed,
    WriteFailed,
}

/// Emits each diagnostic kind at most once per process.
#[derive(Debug, Default)]
pub struct WarnOnce {
    read_failed: AtomicBool,
    write_failed: AtomicBool,
}

impl WarnOnce {
    /// Returns true when this call actually logged.
    pub fn warn(&self, kind: CacheDiagnostic, key: &str, err: &anyhow::Error) -> bool {
        let flag = match kind {
            CacheDiagnostic::ReadFailed => &self.read_failed,
            CacheDiagnostic::WriteFailed => &self.write_failed,
        };
        if flag.swap(true, Ordering::Relaxed) {
            return false;
        }
        tracing::warn!(?kind, cache_key = key, error = %err, "cache backend degraded; continuing without it");
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    pub value: T,
    pub stale: bool,
}

/// Result of a single read: a soft failure is reported separately from a
/// plain miss, but both let the caller fall through to a fresh fetch.
enum Lookup<T> {
    Hit(T),
    Miss,
    Degraded,
}

#[derive(Clone, Default)]
pub struct SeriesCache {
    store: Option<Arc<dyn CacheStore>>,
    diagnostics: Arc<WarnOnce>,
}

impl SeriesCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store: Some(store),
            diagnostics: Arc::new(WarnOnce::default()),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Lookup<T> {
        let Some(store) = self.store.as_ref() else {
            return Lookup::Miss;
        };
        match store.get(key).await {
            Ok(None) => Lookup::Miss,
            Ok(Some(record)) => match serde_json::from_str::<T>(&record.value_json) {
                Ok(value) => Lookup::Hit(value),
                Err(err) => {
                    self.diagnostics
                        .warn(CacheDiagnostic::ReadFailed, key, &anyhow::Error::new(err));
                    Lookup::Degraded
                }
            },
            Err(err) => {
                self.diagnostics.warn(CacheDiagnostic::ReadFailed, key, &err);
                Lookup::Degraded
            }
        }
    }

    async fn persist<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        let value_json = match serde_json::to_string(value) {
            Ok(v) => v,
            Err(err) => {
                self.diagnostics
                    .warn(CacheDiagnostic::WriteFailed, key, &anyhow::Error::new(err));
                return;
            }
        };
        let created_at = Utc::now();
        let record = CacheRecord {
            key: key.to_string(),
            value_json,
            created_at,
            ttl_epoch: created_at.timestamp() + ttl_secs.max(1) as i64,
        };
        if let Err(err) = store.put(record).await {
            self.diagnostics.warn(CacheDiagnostic::WriteFailed, key, &err);
        }
    }

    /// Serves any readable record without checking its TTL. On a miss the
    /// fresh value is persisted before returning. If the fresh fetch fails,
    /// an existing record is served with `stale = true`; otherwise the fetch
    /// error propagates unchanged. `bypass` skips both reads.
    pub async fn cached_fetch<T, E, F, Fut>(
        &self,
        key: &str,
        ttl_secs: u64,
        bypass: bool,
        fetch_fresh: F,
    ) -> Result<Cached<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        if !bypass {
            if let Lookup::Hit(value) = self.lookup::<T>(key).await {
                return Ok(Cached { value, stale: false });
            }
        }

        match fetch_fresh().await {
            Ok(value) => {
                self.persist(key, &value, ttl_secs).await;
                Ok(Cached { value, stale: false })
            }
            Err(err) => {
                if bypass {
                    return Err(err);
                }
                match self.lookup::<T>(key).await {
                    Lookup::Hit(value) => {
                        tracing::warn!(cache_key = key, error = %err, "fresh fetch failed; serving stale cache");
                        Ok(Cached { value, stale: true })
                    }
                    Lookup::Miss | Lookup::Degraded => Err(err),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Fails the first `failing_reads` reads, then delegates to memory.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryCacheStore,
        failing_reads: AtomicUsize,
        fail_writes: bool,
    }

    #[async_trait::async_trait]
    impl CacheStore for FlakyStore {
        async fn get(&self, key: &str) -> anyhow::Result<Option<CacheRecord>> {
            let remaining = self.failing_reads.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failing_reads.store(remaining - 1, Ordering::SeqCst);
                anyhow::bail!("read timeout");
            }
            self.inner.get(key).await
        }

        async fn put(&self, record: CacheRecord) -> anyhow::Result<()> {
            if self.fail_writes {
                anyhow::bail!("write throttled");
            }
            self.inner.put(record).await
        }
    }

    fn record(key: &str, value: &str, ttl_epoch: i64) -> CacheRecord {
        CacheRecord {
            key: key.to_string(),
            value_json: value.to_string(),
            created_at: Utc::now(),
            ttl_epoch,
        }
    }

    #[tokio::test]
    async fn hit_never_calls_fetch_fresh_even_when_expired() {
        let store = Arc::new(MemoryCacheStore::new());
        store.put(record("k", "[1,2]", 0)).await.unwrap();
        let cache = SeriesCache::new(store);

        let calls = AtomicUsize::new(0);
        let out = cache
            .cached_fetch("k", 60, false, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(vec![9])
            })
            .await
            .unwrap();

        assert_eq!(out, Cached { value: vec![1, 2], stale: false });
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn miss_persists_before_returning() {
        let store = Arc::new(MemoryCacheStore::new());
        let cache = SeriesCache::new(store.clone());
        let before = Utc::now().timestamp();

        let out = cache
            .cached_fetch("k", 3_600, false, || async { Ok::<_, String>(vec![7]) })
            .await
            .unwrap();
        assert!(!out.stale);

        let saved = store.get("k").await.unwrap().unwrap();
        assert_eq!(saved.value_json, "[7]");
        assert!(saved.ttl_epoch >= before + 3_600);
    }

    #[tokio::test]
    async fn stale_fallback_when_fresh_fetch_fails_and_record_exists() {
        let store = Arc::new(FlakyStore {
            failing_reads: AtomicUsize::new(1),
            ..FlakyStore::default()
        });
        store.inner.put(record("k", "[3]", 0)).await.unwrap();
        let cache = SeriesCache::new(store);

        let out = cache
            .cached_fetch("k", 60, false, || async {
                Err::<Vec<i32>, _>("upstream down".to_string())
            })
            .await
            .unwrap();
        assert_eq!(out, Cached { value: vec![3], stale: true });
    }

    #[tokio::test]
    async fn propagates_fetch_error_without_record() {
        let cache = SeriesCache::new(Arc::new(MemoryCacheStore::new()));
        let err = cache
            .cached_fetch("k", 60, false, || async {
                Err::<Vec<i32>, _>("upstream down".to_string())
            })
            .await
            .unwrap_err();
        assert_eq!(err, "upstream down");
    }

    #[tokio::test]
    async fn disabled_cache_always_fetches() {
        let cache = SeriesCache::disabled();
        let calls = AtomicUsize::new(0);
        for _ in 0..2 {
            cache
                .cached_fetch("k", 60, false, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(1)
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let err = cache
            .cached_fetch("k", 60, false, || async { Err::<i32, _>("down".to_string()) })
            .await
            .unwrap_err();
        assert_eq!(err, "down");
    }

    #[tokio::test]
    async fn bypass_skips_reads_but_still_persists() {
        let store = Arc::new(MemoryCacheStore::new());
        store.put(record("k", "1", 0)).await.unwrap();
        let cache = SeriesCache::new(store.clone());

        let out = cache
            .cached_fetch("k", 60, true, || async { Ok::<_, String>(2) })
            .await
            .unwrap();
        assert_eq!(out.value, 2);
        assert_eq!(store.get("k").await.unwrap().unwrap().value_json, "2");

        let err = cache
            .cached_fetch("k", 60, true, || async { Err::<i32, _>("down".to_string()) })
            .await
            .unwrap_err();
        assert_eq!(err, "down");
    }

    #[tokio::test]
    async fn write_failures_are_swallowed() {
        let store = Arc::new(FlakyStore {
            fail_writes: true,
            ..FlakyStore::default()
        });
        let cache = SeriesCache::new(store);
        let out = cache
            .cached_fetch("k", 60, false, || async { Ok::<_, String>(5) })
            .await
            .unwrap();
        assert_eq!(out, Cached { value: 5, stale: false });
    }

    #[tokio::test]
    async fn unparseable_record_counts_as_miss() {
        let store = Arc::new(MemoryCacheStore::new());
        store.put(record("k", "{not json", 0)).await.unwrap();
        let cache = SeriesCache::new(store);
        let out = cache
            .cached_fetch("k", 60, false, || async { Ok::<_, String>(4) })
            .await
            .unwrap();
        assert_eq!(out.value, 4);
    }

    #[test]
    fn warn_once_logs_each_kind_once() {
        let sink = WarnOnce::default();
        let err = anyhow::anyhow!("boom");
        assert!(sink.warn(CacheDiagnostic::ReadFailed, "a", &err));
        assert!(!sink.warn(CacheDiagnostic::ReadFailed, "b", &err));
        assert!(sink.warn(CacheDiagnostic::WriteFailed, "a", &err));
    }
}
