use crate::cache::SeriesCache;
use crate::config::Settings;
use crate::domain::category::Category;
use crate::ingest::boe::{BoeClient, MORTGAGE_SERIES, SAVINGS_SERIES};
use crate::ingest::error::SeriesError;
use crate::ingest::fetch::{ResilientFetcher, RetryPolicy, Transport};
use crate::ingest::ons::OnsClient;
use crate::ingest::types::{take_last_months, ProductsSnapshot, SeriesItem, Window};
use chrono::NaiveDate;
use std::sync::Arc;

/// Extra months fetched beyond the requested lookback so YoY and end-month
/// alignment have headroom before trimming.
const FETCH_HEADROOM_MONTHS: u32 = 3;

#[derive(Debug, Clone, Copy, Default)]
pub struct ProductsQuery {
    pub window: Window,
    pub bypass_cache: bool,
}

/// Maps a category to its upstream series and assembles the snapshot.
#[derive(Clone)]
pub struct MarketData {
    boe: BoeClient,
    ons: OnsClient,
    default_months: u32,
}

impl MarketData {
    pub fn new(boe: BoeClient, ons: OnsClient, default_months: u32) -> Self {
        Self {
            boe,
            ons,
            default_months,
        }
    }

    pub fn from_settings(
        settings: &Settings,
        transport: Arc<dyn Transport>,
        cache: SeriesCache,
    ) -> Self {
        let fetcher = ResilientFetcher::new(transport, RetryPolicy::from_settings(settings));
        let boe = BoeClient::new(
            fetcher.clone(),
            cache.clone(),
            settings.boe_base_url.clone(),
            settings.boe_cache_ttl_secs,
        );
        let ons = OnsClient::new(
            fetcher,
            cache,
            settings.ons_base_url.clone(),
            settings.ons_cpih_version.clone(),
            settings.ons_cache_ttl_secs,
        );
        Self::new(boe, ons, settings.default_history_months)
    }

    pub fn default_months(&self) -> u32 {
        self.default_months
    }

    pub async fn products(
        &self,
        category: Category,
        query: ProductsQuery,
        today: NaiveDate,
    ) -> anyhow::Result<ProductsSnapshot> {
        let months = query.window.months.unwrap_or(self.default_months).max(1);
        let fetch_window = Window {
            months: Some(months + FETCH_HEADROOM_MONTHS),
            ..query.window
        }
        .resolve(today, self.default_months);
        let trim = |s: &SeriesItem| s.with_points(take_last_months(&s.points, months as usize, None));

        match category {
            Category::Mortgages => {
                let boe = self
                    .boe
                    .fetch_series(&MORTGAGE_SERIES, fetch_window, query.bypass_cache)
                    .await?;
                Ok(ProductsSnapshot {
                    category,
                    series: boe.value.iter().map(trim).collect(),
                    stale: boe.stale,
                })
            }
            Category::Savings => {
                let boe = self
                    .boe
                    .fetch_series(&[SAVINGS_SERIES], fetch_window, query.bypass_cache)
                    .await?;
                let ons = self
                    .ons
                    .fetch_cpih_yoy(fetch_window, query.bypass_cache)
                    .await?;
                let savings = boe
                    .value
                    .first()
                    .ok_or_else(|| SeriesError::MissingSeriesColumn(SAVINGS_SERIES.to_string()))?;
                Ok(ProductsSnapshot {
                    category,
                    series: vec![trim(savings), trim(&ons.value)],
                    stale: boe.stale || ons.stale,
                })
            }
            Category::CreditCards => Ok(ProductsSnapshot {
                category,
                series: Vec::new(),
                stale: false,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStore;
    use crate::ingest::fetch::testing::{Scripted, ScriptedTransport};
    use serde_json::json;
    use std::time::Duration;

    fn market(transport: Arc<ScriptedTransport>) -> MarketData {
        let fetcher = ResilientFetcher::new(transport, RetryPolicy::new(0, Duration::from_millis(50)));
        let cache = SeriesCache::new(Arc::new(MemoryCacheStore::new()));
        let boe = BoeClient::new(
            fetcher.clone(),
            cache.clone(),
            "https://boe.test/iadb".to_string(),
            60,
        );
        let ons = OnsClient::new(fetcher, cache, "https://ons.test/v1".to_string(), "66".to_string(), 60);
        MarketData::new(boe, ons, 12)
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 15).unwrap()
    }

    fn ons_body() -> String {
        let mut observations = Vec::new();
        for (year, base) in [(24, 100.0), (25, 103.0)] {
            for mon in ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"] {
                observations.push(json!({
                    "dimensions": {"Time": {"id": format!("{mon}-{year}")}},
                    "observation": format!("{base}"),
                }));
            }
        }
        json!({ "observations": observations }).to_string()
    }

    #[tokio::test]
    async fn savings_trims_both_series_to_requested_months() {
        let csv = "DATE,CFMHSCV\n31 Oct 2025,1.0\n30 Nov 2025,1.1\n31 Dec 2025,1.2\n31 Jan 2026,1.3\n".to_string();
        let transport = ScriptedTransport::new(vec![
            Scripted::Status(200, csv),
            Scripted::Status(200, ons_body()),
        ]);
        let data = market(transport.clone());
        let query = ProductsQuery {
            window: Window::months(2),
            bypass_cache: false,
        };

        let snapshot = data.products(Category::Savings, query, today()).await.unwrap();
        assert!(!snapshot.stale);
        let savings = snapshot.series("CFMHSCV").unwrap();
        let months: Vec<_> = savings.points.iter().map(|p| p.month.as_str()).collect();
        assert_eq!(months, ["2025-12", "2026-01"]);

        let cpih = snapshot.series("CPIH_YOY").unwrap();
        let months: Vec<_> = cpih.points.iter().map(|p| p.month.as_str()).collect();
        assert_eq!(months, ["2025-11", "2025-12"]);
        assert_eq!(cpih.latest_value(), 3.0);
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn fetch_window_includes_headroom() {
        let csv = "DATE,IUMBV34,IUMBV37,IUMBV42,IUMTLMV,IUMBEDR\n31 Jan 2026,4.5,4.6,4.7,7.5,4.0\n".to_string();
        let transport = ScriptedTransport::new(vec![Scripted::Status(200, csv)]);
        let data = market(transport.clone());
        let query = ProductsQuery {
            window: Window::months(1),
            bypass_cache: false,
        };

        let snapshot = data.products(Category::Mortgages, query, today()).await.unwrap();
        assert_eq!(snapshot.series.len(), 5);
        // 1 requested + 3 headroom months back from February.
        let url = &transport.urls.lock().unwrap()[0];
        assert!(url.contains("Datefrom=01%2FNov%2F2025"));
    }

    #[tokio::test]
    async fn credit_cards_need_no_upstream() {
        let transport = ScriptedTransport::new(vec![]);
        let data = market(transport.clone());
        let snapshot = data
            .products(Category::CreditCards, ProductsQuery::default(), today())
            .await
            .unwrap();
        assert!(snapshot.series.is_empty());
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn upstream_shape_errors_propagate() {
        let transport = ScriptedTransport::new(vec![Scripted::Status(200, "DATE\n".to_string())]);
        let data = market(transport);
        let err = data
            .products(Category::Mortgages, ProductsQuery::default(), today())
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<SeriesError>().is_some());
    }
}
