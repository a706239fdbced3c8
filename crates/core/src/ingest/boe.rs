//! Upstream A: Bank of England IADB delimited-text export.

use crate::cache::{Cached, SeriesCache};
use crate::ingest::error::SeriesError;
use crate::ingest::fetch::{HttpRequest, ResilientFetcher};
use crate::ingest::types::{round2, ResolvedWindow, SeriesItem, SeriesPoint};
use crate::time::months::{month_abbrev, month_from_abbrev, month_key};
use anyhow::Context;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use std::collections::BTreeMap;

pub const MORTGAGE_SERIES: [&str; 5] = ["IUMBV34", "IUMBV37", "IUMBV42", "IUMTLMV", "IUMBEDR"];
pub const SAVINGS_SERIES: &str = "CFMHSCV";

pub fn series_label(code: &str) -> &str {
    match code {
        "IUMBV34" => "2y fixed",
        "IUMBV37" => "3y fixed",
        "IUMBV42" => "5y fixed",
        "IUMTLMV" => "revert-to-rate",
        "IUMBEDR" => "base rate",
        "CFMHSCV" => "household sight deposits rate",
        other => other,
    }
}

pub fn format_boe_date(date: NaiveDate) -> String {
    format!("{:02}/{}/{}", date.day(), month_abbrev(date.month()), date.year())
}

/// Accepts `DD/Mon/YYYY` and the space separated `DD Mon YYYY` served by the
/// CSV export.
pub fn parse_boe_date(raw: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = raw
        .trim()
        .split(|c: char| c == '/' || c == '-' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .collect();
    let [day, month, year] = parts.as_slice() else {
        return None;
    };
    if year.len() != 4 {
        return None;
    }
    let day = day.parse::<u32>().ok()?;
    let month = month_from_abbrev(month)?;
    let year = year.parse::<i32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_rows(text: &str) -> Vec<Vec<&str>> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.split(',').map(str::trim).collect())
        .collect()
}

/// Buckets rows by calendar month and keeps the chronologically latest
/// observation of each month. Rows with unparseable dates or values are
/// skipped; a requested series left with no rows is an error.
pub fn parse_boe_csv(
    text: &str,
    codes: &[&str],
    as_of: DateTime<Utc>,
) -> Result<Vec<SeriesItem>, SeriesError> {
    let rows = parse_rows(text);
    let Some((header, data_rows)) = rows.split_first() else {
        return Err(SeriesError::EmptyResponse("boe"));
    };
    if data_rows.is_empty() {
        return Err(SeriesError::EmptyResponse("boe"));
    }

    let date_col = header
        .iter()
        .position(|h| h.eq_ignore_ascii_case("DATE"))
        .ok_or(SeriesError::MissingDateColumn)?;

    let mut wanted = Vec::with_capacity(codes.len());
    for code in codes {
        let idx = header
            .iter()
            .position(|h| h == code)
            .ok_or_else(|| SeriesError::MissingSeriesColumn(code.to_string()))?;
        wanted.push((idx, *code));
    }

    let mut grouped: Vec<BTreeMap<String, (NaiveDate, f64)>> = vec![BTreeMap::new(); wanted.len()];
    for row in data_rows {
        let Some(date) = row.get(date_col).and_then(|raw| parse_boe_date(raw)) else {
            continue;
        };
        let month = month_key(date);

        for ((idx, _), buckets) in wanted.iter().zip(grouped.iter_mut()) {
            let Some(value) = row
                .get(*idx)
                .and_then(|raw| raw.parse::<f64>().ok())
                .filter(|v| v.is_finite())
            else {
                continue;
            };
            match buckets.get(&month) {
                Some((seen, _)) if *seen >= date => {}
                _ => {
                    buckets.insert(month.clone(), (date, value));
                }
            }
        }
    }

    wanted
        .iter()
        .zip(grouped)
        .map(|((_, code), buckets)| {
            if buckets.is_empty() {
                return Err(SeriesError::NoValidRows(code.to_string()));
            }
            let points = buckets
                .into_iter()
                .map(|(month, (_, value))| SeriesPoint {
                    month,
                    value: round2(value),
                })
                .collect();
            Ok(SeriesItem {
                code: code.to_string(),
                label: series_label(code).to_string(),
                unit: "percent".to_string(),
                as_of,
                points,
            })
        })
        .collect()
}

#[derive(Clone)]
pub struct BoeClient {
    fetcher: ResilientFetcher,
    cache: SeriesCache,
    base_url: String,
    ttl_secs: u64,
}

impl BoeClient {
    pub fn new(fetcher: ResilientFetcher, cache: SeriesCache, base_url: String, ttl_secs: u64) -> Self {
        Self {
            fetcher,
            cache,
            base_url,
            ttl_secs,
        }
    }

    pub fn url(&self, codes: &[&str], window: ResolvedWindow) -> anyhow::Result<String> {
        let url = reqwest::Url::parse_with_params(
            &self.base_url,
            &[
                ("csv.x", "yes".to_string()),
                ("Datefrom", format_boe_date(window.from)),
                ("Dateto", format_boe_date(window.to)),
                ("SeriesCodes", codes.join(",")),
                ("CSVF", "TN".to_string()),
                ("UsingCodes", "Y".to_string()),
                ("VPD", "Y".to_string()),
                ("VFD", "N".to_string()),
            ],
        )
        .with_context(|| format!("invalid BOE_BASE_URL: {}", self.base_url))?;
        Ok(url.to_string())
    }

    pub async fn fetch_series(
        &self,
        codes: &[&str],
        window: ResolvedWindow,
        bypass_cache: bool,
    ) -> anyhow::Result<Cached<Vec<SeriesItem>>> {
        let url = self.url(codes, window)?;
        let cache_key = format!("boe:{url}");

        let cached = self
            .cache
            .cached_fetch(&cache_key, self.ttl_secs, bypass_cache, || async {
                let res = self
                    .fetcher
                    .fetch(&HttpRequest::get(url.as_str()), "boe_series_fetch")
                    .await?;
                if !res.is_success() {
                    return Err(anyhow::Error::new(SeriesError::HttpStatus {
                        source_name: "boe",
                        status: res.status.as_u16(),
                    }));
                }
                parse_boe_csv(&res.body, codes, Utc::now()).map_err(anyhow::Error::new)
            })
            .await?;

        let series = cached
            .value
            .iter()
            .map(|s| s.with_points(window.apply(&s.points)))
            .collect();
        Ok(Cached {
            value: series,
            stale: cached.stale,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStore;
    use crate::ingest::fetch::testing::{Scripted, ScriptedTransport};
    use crate::ingest::fetch::RetryPolicy;
    use chrono::TimeZone;
    use std::sync::Arc;
    use std::time::Duration;

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn parses_both_date_shapes() {
        let d = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        assert_eq!(parse_boe_date("15/Jan/2026"), Some(d));
        assert_eq!(parse_boe_date("15 Jan 2026"), Some(d));
        assert_eq!(parse_boe_date("15/Foo/2026"), None);
        assert_eq!(parse_boe_date("2026-01-15"), None);
        assert_eq!(format_boe_date(d), "15/Jan/2026");
    }

    #[test]
    fn keeps_latest_observation_in_month() {
        let csv = "DATE,IUMBV34\n01/Jan/2026,5.10\n15/Jan/2026,5.25\n";
        let series = parse_boe_csv(csv, &["IUMBV34"], as_of()).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].label, "2y fixed");
        assert_eq!(
            series[0].points,
            vec![SeriesPoint {
                month: "2026-01".to_string(),
                value: 5.25
            }]
        );
    }

    #[test]
    fn row_order_does_not_matter_for_latest_wins() {
        let csv = "DATE,IUMBV34\n28 Feb 2026,4.90\n15 Jan 2026,5.25\n02 Feb 2026,4.80\n01 Jan 2026,5.10\n";
        let series = parse_boe_csv(csv, &["IUMBV34"], as_of()).unwrap();
        let got: Vec<_> = series[0]
            .points
            .iter()
            .map(|p| (p.month.as_str(), p.value))
            .collect();
        assert_eq!(got, [("2026-01", 5.25), ("2026-02", 4.9)]);
    }

    #[test]
    fn skips_non_numeric_rows_per_series() {
        let csv = "DATE,IUMBV34,IUMBEDR\n31 Jan 2026,n/a,4.00\nnot a date,1,1\n27 Feb 2026,5.01,\n";
        let series = parse_boe_csv(csv, &["IUMBV34", "IUMBEDR"], as_of()).unwrap();
        assert_eq!(series[0].points.len(), 1);
        assert_eq!(series[0].points[0].month, "2026-02");
        assert_eq!(series[1].points.len(), 1);
        assert_eq!(series[1].points[0].month, "2026-01");
    }

    #[test]
    fn named_errors_for_bad_shapes() {
        assert_eq!(
            parse_boe_csv("", &["IUMBV34"], as_of()),
            Err(SeriesError::EmptyResponse("boe"))
        );
        assert_eq!(
            parse_boe_csv("WHEN,IUMBV34\n01 Jan 2026,5", &["IUMBV34"], as_of()),
            Err(SeriesError::MissingDateColumn)
        );
        assert_eq!(
            parse_boe_csv("DATE,IUMBV34\n01 Jan 2026,5", &["IUMBV42"], as_of()),
            Err(SeriesError::MissingSeriesColumn("IUMBV42".to_string()))
        );
        assert_eq!(
            parse_boe_csv("DATE,IUMBV34\n01 Jan 2026,x", &["IUMBV34"], as_of()),
            Err(SeriesError::NoValidRows("IUMBV34".to_string()))
        );
    }

    fn client(transport: Arc<ScriptedTransport>, cache: SeriesCache) -> BoeClient {
        let fetcher = ResilientFetcher::new(transport, RetryPolicy::new(0, Duration::from_millis(50)));
        BoeClient::new(
            fetcher,
            cache,
            "https://boe.test/iadb/fromshowcolumns.asp".to_string(),
            60,
        )
    }

    fn window() -> ResolvedWindow {
        ResolvedWindow {
            from: NaiveDate::from_ymd_opt(2025, 12, 1).unwrap(),
            to: NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
        }
    }

    #[tokio::test]
    async fn fetch_applies_window_and_uses_cache() {
        let csv = "DATE,CFMHSCV\n30 Nov 2025,1.00\n31 Dec 2025,1.10\n31 Jan 2026,1.20\n".to_string();
        let transport = ScriptedTransport::new(vec![Scripted::Status(200, csv)]);
        let cache = SeriesCache::new(Arc::new(MemoryCacheStore::new()));
        let boe = client(transport.clone(), cache);

        let first = boe.fetch_series(&["CFMHSCV"], window(), false).await.unwrap();
        assert!(!first.stale);
        let months: Vec<_> = first.value[0].points.iter().map(|p| p.month.as_str()).collect();
        assert_eq!(months, ["2025-12", "2026-01"]);

        let second = boe.fetch_series(&["CFMHSCV"], window(), false).await.unwrap();
        assert_eq!(second.value, first.value);
        assert_eq!(transport.calls(), 1);

        let url = &transport.urls.lock().unwrap()[0];
        assert!(url.contains("SeriesCodes=CFMHSCV"));
        assert!(url.contains("Datefrom=01%2FDec%2F2025"));
    }

    #[tokio::test]
    async fn failing_status_is_a_named_error() {
        let transport = ScriptedTransport::new(vec![Scripted::Status(404, String::new())]);
        let boe = client(transport, SeriesCache::disabled());
        let err = boe.fetch_series(&["CFMHSCV"], window(), false).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<SeriesError>(),
            Some(&SeriesError::HttpStatus {
                source_name: "boe",
                status: 404
            })
        );
    }
}
