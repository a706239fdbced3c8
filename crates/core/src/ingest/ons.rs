//! Upstream B: ONS CPIH index observations, converted to year-over-year change.

use crate::cache::{Cached, SeriesCache};
use crate::ingest::error::SeriesError;
use crate::ingest::fetch::{HttpRequest, ResilientFetcher};
use crate::ingest::types::{round2, ResolvedWindow, SeriesItem, SeriesPoint};
use crate::time::months::{month_from_abbrev, prev_year_month};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

pub const CPIH_YOY_CODE: &str = "CPIH_YOY";

#[derive(Debug, Deserialize)]
struct ObservationsPayload {
    #[serde(default)]
    observations: Option<Vec<Observation>>,
}

#[derive(Debug, Deserialize)]
struct Observation {
    #[serde(default)]
    dimensions: Option<Dimensions>,
    #[serde(default)]
    observation: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Dimensions {
    #[serde(rename = "Time", default)]
    time: Option<TimeDimension>,
}

#[derive(Debug, Deserialize)]
struct TimeDimension {
    #[serde(default)]
    id: Option<String>,
}

/// `Jan-24` -> `2024-01`. Two-digit years from 70 up map to the 1900s.
pub fn parse_month_id(time_id: &str) -> Option<String> {
    let (mon, yy) = time_id.trim().split_once('-')?;
    if mon.len() != 3 || yy.len() != 2 {
        return None;
    }
    let month = month_from_abbrev(mon)?;
    let yy = yy.parse::<i32>().ok()?;
    let year = if yy >= 70 { 1900 + yy } else { 2000 + yy };
    Some(format!("{year:04}-{month:02}"))
}

fn observation_value(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

pub fn parse_cpih_yoy(body: &str, as_of: DateTime<Utc>) -> Result<SeriesItem, SeriesError> {
    let payload = serde_json::from_str::<ObservationsPayload>(body)
        .map_err(|err| SeriesError::InvalidPayload(err.to_string()))?;
    let observations = payload
        .observations
        .filter(|o| !o.is_empty())
        .ok_or(SeriesError::EmptyResponse("ons"))?;

    let mut index = BTreeMap::<String, f64>::new();
    for obs in &observations {
        let Some(month) = obs
            .dimensions
            .as_ref()
            .and_then(|d| d.time.as_ref())
            .and_then(|t| t.id.as_deref())
            .and_then(parse_month_id)
        else {
            continue;
        };
        let Some(value) = obs.observation.as_ref().and_then(observation_value) else {
            continue;
        };
        index.insert(month, value);
    }

    let points = index
        .iter()
        .filter_map(|(month, current)| {
            let prior = *index.get(&prev_year_month(month)?)?;
            if prior == 0.0 {
                return None;
            }
            Some(SeriesPoint {
                month: month.clone(),
                value: round2((current / prior - 1.0) * 100.0),
            })
        })
        .collect();

    Ok(SeriesItem {
        code: CPIH_YOY_CODE.to_string(),
        label: "CPIH YoY".to_string(),
        unit: "percent".to_string(),
        as_of,
        points,
    })
}

#[derive(Clone)]
pub struct OnsClient {
    fetcher: ResilientFetcher,
    cache: SeriesCache,
    base_url: String,
    cpih_version: String,
    ttl_secs: u64,
}

impl OnsClient {
    pub fn new(
        fetcher: ResilientFetcher,
        cache: SeriesCache,
        base_url: String,
        cpih_version: String,
        ttl_secs: u64,
    ) -> Self {
        Self {
            fetcher,
            cache,
            base_url,
            cpih_version,
            ttl_secs,
        }
    }

    pub fn url(&self) -> String {
        format!(
            "{}/datasets/cpih01/editions/time-series/versions/{}/observations?time=*&geography=K02000001&aggregate=CP00",
            self.base_url.trim_end_matches('/'),
            self.cpih_version
        )
    }

    /// The full YoY series is cached; the window is applied afterwards.
    pub async fn fetch_cpih_yoy(
        &self,
        window: ResolvedWindow,
        bypass_cache: bool,
    ) -> anyhow::Result<Cached<SeriesItem>> {
        let url = self.url();
        let cache_key = format!("ons:{url}");

        let cached = self
            .cache
            .cached_fetch(&cache_key, self.ttl_secs, bypass_cache, || async {
                let res = self
                    .fetcher
                    .fetch(&HttpRequest::get(url.as_str()), "ons_cpih_fetch")
                    .await?;
                if !res.is_success() {
                    return Err(anyhow::Error::new(SeriesError::HttpStatus {
                        source_name: "ons",
                        status: res.status.as_u16(),
                    }));
                }
                parse_cpih_yoy(&res.body, Utc::now()).map_err(anyhow::Error::new)
            })
            .await?;

        let points = window.apply(&cached.value.points);
        Ok(Cached {
            value: cached.value.with_points(points),
            stale: cached.stale,
        })
    }
}
