use crate::compare::{as_of_map, strings, ChartSeries, CompareError, CompareOption, CompareResult, MetricValue};
use crate::domain::category::Category;
use crate::domain::criteria::SavingsCriteria;
use crate::ingest::boe::SAVINGS_SERIES;
use crate::ingest::ons::CPIH_YOY_CODE;
use crate::ingest::types::{round2, take_last_months, ProductsSnapshot};
use std::collections::BTreeMap;

pub const OPTION_ID: &str = "market-average-sight-deposit";
pub const OPTION_LABEL: &str = "Market-average sight deposit";

/// Real return against inflation, both read at a shared end month so the
/// shorter series is never extrapolated.
pub fn compare(products: &ProductsSnapshot, criteria: &SavingsCriteria) -> Result<CompareResult, CompareError> {
    let (Some(savings), Some(inflation)) = (products.series(SAVINGS_SERIES), products.series(CPIH_YOY_CODE))
    else {
        return Err(CompareError::MissingSeries);
    };
    let horizon = criteria.horizon();

    let end_month = match (savings.latest(), inflation.latest()) {
        (Some(a), Some(b)) => Some(a.month.as_str().min(b.month.as_str())),
        _ => None,
    };
    let savings_window = take_last_months(&savings.points, horizon as usize, end_month);
    let inflation_window = take_last_months(&inflation.points, horizon as usize, end_month);
    let (Some(nominal), Some(inflation_pct)) = (savings_window.last(), inflation_window.last()) else {
        return Err(CompareError::EmptyWindow);
    };
    let (nominal, inflation_pct) = (nominal.value, inflation_pct.value);
    let projected = criteria.deposit * (1.0 + nominal / 100.0 / 12.0).powi(horizon as i32);

    let metrics = BTreeMap::from([
        ("inflation_yoy_pct".to_string(), MetricValue::from(round2(inflation_pct))),
        ("real_rate_pct".to_string(), round2(nominal - inflation_pct).into()),
        ("projected_balance_est".to_string(), round2(projected).into()),
    ]);

    Ok(CompareResult {
        category: Category::Savings,
        as_of: as_of_map(products),
        assumptions: strings(&[
            "Real rate is approximated as nominal minus CPIH YoY",
            "Projection uses simple monthly compounding",
        ]),
        options: vec![CompareOption {
            id: OPTION_ID.to_string(),
            label: OPTION_LABEL.to_string(),
            rate_pct: Some(round2(nominal)),
            metrics,
        }],
        chart_series: vec![
            ChartSeries::from_series(savings, savings_window),
            ChartSeries::from_series(inflation, inflation_window),
        ],
        stale: false,
    })
}
