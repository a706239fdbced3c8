use anyhow::Context;
use std::time::Duration;

const DEFAULT_BOE_BASE_URL: &str =
    "https://www.bankofengland.co.uk/boeapps/iadb/fromshowcolumns.asp";
const DEFAULT_ONS_BASE_URL: &str = "https://api.beta.ons.gov.uk/v1";
const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_GEMINI_MODEL: &str = "gemini-flash-latest";
const DEFAULT_GEMINI_FALLBACK_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Postgres,
    Memory,
    Disabled,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: Option<String>,
    pub sentry_dsn: Option<String>,
    pub cache_backend: CacheBackend,

    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub gemini_fallback_model: String,
    pub gemini_timeout: Duration,
    pub gemini_max_attempts: u32,

    pub boe_base_url: String,
    pub ons_base_url: String,
    pub ons_cpih_version: String,
    pub default_history_months: u32,
    pub boe_cache_ttl_secs: u64,
    pub ons_cache_ttl_secs: u64,
    pub upstream_retries: u32,
    pub upstream_base_delay: Duration,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let num = |key: &str| get(key).and_then(|v| v.parse::<u64>().ok());

        let database_url = get("DATABASE_URL");
        let cache_backend = match get("CACHE_BACKEND").map(|v| v.to_ascii_lowercase()) {
            Some(v) => match v.as_str() {
                "postgres" => CacheBackend::Postgres,
                "memory" => CacheBackend::Memory,
                "none" | "off" => CacheBackend::Disabled,
                other => anyhow::bail!("CACHE_BACKEND must be postgres, memory or none (got {other})"),
            },
            None if database_url.is_some() => CacheBackend::Postgres,
            None => CacheBackend::Disabled,
        };

        Ok(Self {
            database_url,
            sentry_dsn: get("SENTRY_DSN"),
            cache_backend,
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_base_url: get("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            gemini_fallback_model: get("GEMINI_FALLBACK_MODEL")
                .unwrap_or_else(|| DEFAULT_GEMINI_FALLBACK_MODEL.to_string()),
            gemini_timeout: Duration::from_millis(
                num("GEMINI_TIMEOUT_MS").unwrap_or(15_000).clamp(1_000, 60_000),
            ),
            gemini_max_attempts: num("GEMINI_MAX_ATTEMPTS").unwrap_or(2).clamp(1, 3) as u32,
            boe_base_url: get("BOE_BASE_URL").unwrap_or_else(|| DEFAULT_BOE_BASE_URL.to_string()),
            ons_base_url: get("ONS_BASE_URL").unwrap_or_else(|| DEFAULT_ONS_BASE_URL.to_string()),
            ons_cpih_version: get("ONS_CPIH_VERSION").unwrap_or_else(|| "66".to_string()),
            default_history_months: num("DEFAULT_HISTORY_MONTHS").unwrap_or(12).clamp(1, 360)
                as u32,
            boe_cache_ttl_secs: num("BOE_CACHE_TTL_SECS").unwrap_or(24 * 60 * 60).max(1),
            ons_cache_ttl_secs: num("ONS_CACHE_TTL_SECS").unwrap_or(7 * 24 * 60 * 60).max(1),
            upstream_retries: num("UPSTREAM_RETRIES").unwrap_or(2).min(2) as u32,
            upstream_base_delay: Duration::from_millis(
                num("UPSTREAM_BASE_DELAY_MS").unwrap_or(250).clamp(50, 2_000),
            ),
        })
    }

    pub fn require_database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL is required")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> anyhow::Result<Settings> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.cache_backend, CacheBackend::Disabled);
        assert!(s.gemini_api_key.is_none());
        assert_eq!(s.default_history_months, 12);
        assert_eq!(s.upstream_retries, 2);
        assert_eq!(s.upstream_base_delay, Duration::from_millis(250));
        assert_eq!(s.gemini_max_attempts, 2);
        assert_eq!(s.boe_cache_ttl_secs, 86_400);
    }

    #[test]
    fn database_url_implies_postgres_cache() {
        let s = settings(&[("DATABASE_URL", "postgres://localhost/psipay")]).unwrap();
        assert_eq!(s.cache_backend, CacheBackend::Postgres);
        assert_eq!(s.require_database_url().unwrap(), "postgres://localhost/psipay");
    }

    #[test]
    fn clamps_out_of_range_values() {
        let s = settings(&[
            ("UPSTREAM_RETRIES", "9"),
            ("UPSTREAM_BASE_DELAY_MS", "5"),
            ("DEFAULT_HISTORY_MONTHS", "1000"),
            ("GEMINI_TIMEOUT_MS", "10"),
        ])
        .unwrap();
        assert_eq!(s.upstream_retries, 2);
        assert_eq!(s.upstream_base_delay, Duration::from_millis(50));
        assert_eq!(s.default_history_months, 360);
        assert_eq!(s.gemini_timeout, Duration::from_millis(1_000));
    }

    #[test]
    fn blank_api_key_is_not_configured() {
        let s = settings(&[("GEMINI_API_KEY", "   ")]).unwrap();
        assert!(s.gemini_api_key.is_none());
    }

    #[test]
    fn rejects_unknown_cache_backend() {
        assert!(settings(&[("CACHE_BACKEND", "redis")]).is_err());
    }
}
