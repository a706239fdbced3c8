use chrono::{DateTime, Utc};
use psipay_core::storage::cache::PgCacheStore;

/// Records stay usable as stale fallbacks for a week past their TTL.
pub const DEFAULT_GRACE_HOURS: u32 = 24 * 7;

pub fn cutoff_epoch(now: DateTime<Utc>, grace_hours: u32) -> i64 {
    now.timestamp() - i64::from(grace_hours) * 3_600
}

pub async fn run(pool: &sqlx::PgPool, grace_hours: u32, now: DateTime<Utc>) -> anyhow::Result<u64> {
    let cutoff = cutoff_epoch(now, grace_hours);
    tracing::debug!(cutoff, grace_hours, "purging cache records");
    PgCacheStore::new(pool.clone()).purge_expired(cutoff).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn cutoff_subtracts_grace_window() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(cutoff_epoch(now, 0), now.timestamp());
        assert_eq!(cutoff_epoch(now, 2), now.timestamp() - 7_200);
    }
}
