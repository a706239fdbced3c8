use crate::domain::category::Category;
use crate::time::months::{lookback_start, month_key};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// Calendar month, `YYYY-MM`.
    pub month: String,
    /// Percentage, rounded to 2 decimals.
    #[serde(rename = "value_pct")]
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesItem {
    #[serde(rename = "seriesCode")]
    pub code: String,
    pub label: String,
    pub unit: String,
    #[serde(rename = "asOf")]
    pub as_of: DateTime<Utc>,
    /// Ascending by month; the latest observation is the last element.
    #[serde(rename = "data")]
    pub points: Vec<SeriesPoint>,
}

impl SeriesItem {
    pub fn latest(&self) -> Option<&SeriesPoint> {
        self.points.last()
    }

    pub fn latest_value(&self) -> f64 {
        self.latest().map(|p| p.value).unwrap_or(0.0)
    }

    pub fn with_points(&self, points: Vec<SeriesPoint>) -> Self {
        Self {
            points,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductsSnapshot {
    pub category: Category,
    pub series: Vec<SeriesItem>,
    /// At least one series was served from an expired cache record.
    #[serde(default)]
    pub stale: bool,
}

impl ProductsSnapshot {
    pub fn series(&self, code: &str) -> Option<&SeriesItem> {
        self.series.iter().find(|s| s.code == code)
    }
}

/// Caller-supplied date window. Explicit bounds win over the lookback count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Window {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub months: Option<u32>,
}

impl Window {
    pub fn months(months: u32) -> Self {
        Self {
            months: Some(months),
            ..Self::default()
        }
    }

    pub fn resolve(&self, today: NaiveDate, default_months: u32) -> ResolvedWindow {
        let months = self.months.unwrap_or(default_months).max(1);
        let to = self.to.unwrap_or(today);
        let from = self.from.unwrap_or_else(|| lookback_start(today, months));
        ResolvedWindow { from, to }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl ResolvedWindow {
    pub fn from_month(&self) -> String {
        month_key(self.from)
    }

    pub fn to_month(&self) -> String {
        month_key(self.to)
    }

    pub fn apply(&self, points: &[SeriesPoint]) -> Vec<SeriesPoint> {
        let (from, to) = (self.from_month(), self.to_month());
        points
            .iter()
            .filter(|p| p.month.as_str() >= from.as_str() && p.month.as_str() <= to.as_str())
            .cloned()
            .collect()
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Last `months` points, optionally ignoring anything after `end_month`.
pub fn take_last_months(points: &[SeriesPoint], months: usize, end_month: Option<&str>) -> Vec<SeriesPoint> {
    let filtered: Vec<&SeriesPoint> = match end_month {
        Some(end) => points.iter().filter(|p| p.month.as_str() <= end).collect(),
        None => points.iter().collect(),
    };
    let skip = filtered.len().saturating_sub(months);
    filtered.into_iter().skip(skip).cloned().collect()
}
