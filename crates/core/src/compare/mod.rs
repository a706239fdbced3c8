//! Deterministic scoring engines. Every engine is a pure function of the
//! snapshot and the criteria; option order in the result is the ranking.

pub mod credit_cards;
pub mod mortgages;
pub mod savings;

use crate::domain::category::Category;
use crate::domain::criteria::Criteria;
use crate::ingest::types::{ProductsSnapshot, SeriesItem, SeriesPoint};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
}

impl MetricValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Number(n) => Some(*n),
            MetricValue::Text(_) => None,
        }
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        MetricValue::Number(value)
    }
}

impl From<&str> for MetricValue {
    fn from(value: &str) -> Self {
        MetricValue::Text(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareOption {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_pct: Option<f64>,
    pub metrics: BTreeMap<String, MetricValue>,
}

impl CompareOption {
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).and_then(MetricValue::as_f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSeries {
    pub series_code: String,
    pub label: String,
    pub data: Vec<SeriesPoint>,
}

impl ChartSeries {
    fn from_series(series: &SeriesItem, data: Vec<SeriesPoint>) -> Self {
        Self {
            series_code: series.code.clone(),
            label: series.label.clone(),
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareResult {
    pub category: Category,
    pub as_of: BTreeMap<String, DateTime<Utc>>,
    pub assumptions: Vec<String>,
    /// Best first.
    pub options: Vec<CompareOption>,
    pub chart_series: Vec<ChartSeries>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stale: bool,
}

impl CompareResult {
    pub fn labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.options.iter().map(|o| o.label.as_str())
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels().any(|l| l == label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompareError {
    #[error("missing_savings_or_inflation_series")]
    MissingSeries,
    #[error("missing_savings_or_inflation_window")]
    EmptyWindow,
    #[error("criteria for {criteria} cannot score a {snapshot} snapshot")]
    CategoryMismatch { snapshot: Category, criteria: Category },
}

pub(crate) fn as_of_map(products: &ProductsSnapshot) -> BTreeMap<String, DateTime<Utc>> {
    products
        .series
        .iter()
        .map(|s| (s.code.clone(), s.as_of))
        .collect()
}

pub(crate) fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn score(products: &ProductsSnapshot, criteria: &Criteria) -> Result<CompareResult, CompareError> {
    if products.category != criteria.category() {
        return Err(CompareError::CategoryMismatch {
            snapshot: products.category,
            criteria: criteria.category(),
        });
    }
    let mut result = match criteria {
        Criteria::Mortgages(c) => mortgages::compare(products, c),
        Criteria::Savings(c) => savings::compare(products, c)?,
        Criteria::CreditCards(c) => credit_cards::compare(products, c),
    };
    result.stale = products.stale;
    Ok(result)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn series(code: &str, points: &[(&str, f64)]) -> SeriesItem {
        SeriesItem {
            code: code.to_string(),
            label: code.to_string(),
            unit: "percent".to_string(),
            as_of: Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap(),
            points: points
                .iter()
                .map(|(month, value)| SeriesPoint {
                    month: month.to_string(),
                    value: *value,
                })
                .collect(),
        }
    }

    pub(crate) fn snapshot(category: Category, series: Vec<SeriesItem>) -> ProductsSnapshot {
        ProductsSnapshot {
            category,
            series,
            stale: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::snapshot;
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_mismatched_category() {
        let criteria = Criteria::from_json(Category::CreditCards, &json!({"monthlySpend": 100})).unwrap();
        let err = score(&snapshot(Category::Savings, vec![]), &criteria).unwrap_err();
        assert!(matches!(err, CompareError::CategoryMismatch { .. }));
    }

    #[test]
    fn stale_flag_is_carried_and_omitted_when_false() {
        let criteria = Criteria::from_json(Category::CreditCards, &json!({"monthlySpend": 100})).unwrap();
        let mut products = snapshot(Category::CreditCards, vec![]);

        let fresh = score(&products, &criteria).unwrap();
        assert!(serde_json::to_value(&fresh).unwrap().get("stale").is_none());

        products.stale = true;
        let stale = score(&products, &criteria).unwrap();
        assert_eq!(serde_json::to_value(&stale).unwrap()["stale"], json!(true));
    }

    #[test]
    fn metric_values_serialize_untagged() {
        let value = serde_json::to_value(BTreeMap::from([
            ("a".to_string(), MetricValue::from(1.5)),
            ("b".to_string(), MetricValue::from("note")),
        ]))
        .unwrap();
        assert_eq!(value, json!({"a": 1.5, "b": "note"}));
    }
}
