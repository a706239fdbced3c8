use crate::compare::{as_of_map, strings, ChartSeries, CompareOption, CompareResult, MetricValue};
use crate::domain::category::Category;
use crate::domain::criteria::MortgageCriteria;
use crate::ingest::types::{round2, ProductsSnapshot};
use std::collections::BTreeMap;

const VARIABLE_RATE_CODE: &str = "IUMTLMV";
const STRESS_BUMP_PCT: f64 = 1.0;

const CANDIDATES: [(&str, &str); 4] = [
    ("IUMBV34", "2y fixed"),
    ("IUMBV37", "3y fixed"),
    ("IUMBV42", "5y fixed"),
    (VARIABLE_RATE_CODE, "revert-to-rate"),
];

const CHART_CODES: [&str; 3] = ["IUMBV34", "IUMBV42", VARIABLE_RATE_CODE];

/// Fixed payment that fully amortises `principal` over `term_months`.
pub fn monthly_payment(principal: f64, annual_rate_pct: f64, term_months: u32) -> f64 {
    let n = term_months.max(1) as f64;
    let r = annual_rate_pct / 100.0 / 12.0;
    if r == 0.0 {
        return principal / n;
    }
    let pow = (1.0 + r).powf(n);
    principal * r * pow / (pow - 1.0)
}

/// Outstanding balance after `paid_months` regular payments.
pub fn balance_after(principal: f64, annual_rate_pct: f64, term_months: u32, paid_months: u32) -> f64 {
    let r = annual_rate_pct / 100.0 / 12.0;
    let payment = monthly_payment(principal, annual_rate_pct, term_months);
    let k = paid_months as f64;
    if r == 0.0 {
        return (principal - payment * k).max(0.0);
    }
    let growth = (1.0 + r).powf(k);
    principal * growth - payment * (growth - 1.0) / r
}

fn option_id(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
}

pub fn compare(products: &ProductsSnapshot, criteria: &MortgageCriteria) -> CompareResult {
    let principal = criteria.loan_amount;
    let term = criteria.term_months();
    let months_paid = criteria.horizon().min(term);

    let options = CANDIDATES
        .iter()
        .filter_map(|(code, label)| {
            let series = products.series(code)?;
            let rate = series.latest_value();
            let payment = monthly_payment(principal, rate, term);
            let principal_paid = principal - balance_after(principal, rate, term, months_paid);
            let interest = payment * months_paid as f64 - principal_paid;

            let mut metrics = BTreeMap::from([
                ("monthly_payment_est".to_string(), MetricValue::from(round2(payment))),
                (
                    "interest_cost_over_horizon_est".to_string(),
                    MetricValue::from(round2(interest)),
                ),
            ]);
            if *code == VARIABLE_RATE_CODE {
                let stressed = monthly_payment(principal, rate + STRESS_BUMP_PCT, term);
                metrics.insert("payment_if_plus_1pct".to_string(), round2(stressed).into());
            }

            Some(CompareOption {
                id: option_id(label),
                label: label.to_string(),
                rate_pct: Some(round2(rate)),
                metrics,
            })
        })
        .collect();

    let chart_series = CHART_CODES
        .iter()
        .filter_map(|code| products.series(code))
        .map(|s| ChartSeries::from_series(s, s.points.clone()))
        .collect();

    CompareResult {
        category: Category::Mortgages,
        as_of: as_of_map(products),
        assumptions: strings(&[
            "Monthly payment uses standard amortization",
            "Term defaults to 25 years when not provided",
            "Month-end series values use the last available point in month",
        ]),
        options,
        chart_series,
        stale: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::fixtures::{series, snapshot};

    fn criteria(loan_amount: f64, horizon_months: Option<u32>) -> MortgageCriteria {
        MortgageCriteria {
            loan_amount,
            ltv: None,
            horizon_months,
            term_years: 25.0,
            risk_tolerance: "balanced".to_string(),
        }
    }

    #[test]
    fn annuity_payment_matches_standard_formula() {
        assert_eq!(round2(monthly_payment(200_000.0, 6.0, 300)), 1288.60);
    }

    #[test]
    fn zero_rate_is_linear() {
        assert_eq!(monthly_payment(300_000.0, 0.0, 300), 1_000.0);
        assert_eq!(balance_after(300_000.0, 0.0, 300, 24), 276_000.0);
        assert_eq!(balance_after(300_000.0, 0.0, 300, 400), 0.0);
    }

    #[test]
    fn balance_reaches_zero_at_term() {
        assert!(balance_after(200_000.0, 6.0, 300, 300).abs() < 1e-6);
        assert!(balance_after(200_000.0, 6.0, 300, 24) < 200_000.0);
    }

    #[test]
    fn builds_options_for_available_series() {
        let products = snapshot(
            Category::Mortgages,
            vec![
                series("IUMBV34", &[("2025-12", 4.9), ("2026-01", 4.5)]),
                series("IUMBV42", &[("2026-01", 4.7)]),
                series("IUMTLMV", &[("2026-01", 7.25)]),
                series("IUMBEDR", &[("2026-01", 4.0)]),
            ],
        );
        let result = compare(&products, &criteria(200_000.0, None));

        let ids: Vec<_> = result.options.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, ["2y-fixed", "5y-fixed", "revert-to-rate"]);
        assert_eq!(result.options[0].rate_pct, Some(4.5));
        assert!(result.options[0].metric("payment_if_plus_1pct").is_none());

        let variable = &result.options[2];
        let base = variable.metric("monthly_payment_est").unwrap();
        let stressed = variable.metric("payment_if_plus_1pct").unwrap();
        assert!(stressed > base);

        let codes: Vec<_> = result.chart_series.iter().map(|s| s.series_code.as_str()).collect();
        assert_eq!(codes, ["IUMBV34", "IUMBV42", "IUMTLMV"]);
        assert_eq!(result.as_of.len(), 4);
    }

    #[test]
    fn interest_over_horizon_is_payments_minus_principal_repaid() {
        let products = snapshot(Category::Mortgages, vec![series("IUMBV34", &[("2026-01", 6.0)])]);
        let result = compare(&products, &criteria(200_000.0, Some(12)));
        let interest = result.options[0].metric("interest_cost_over_horizon_est").unwrap();

        let payment = monthly_payment(200_000.0, 6.0, 300);
        let repaid = 200_000.0 - balance_after(200_000.0, 6.0, 300, 12);
        assert_eq!(interest, round2(payment * 12.0 - repaid));
        // Roughly a year of 6% interest on a slowly amortising balance.
        assert!(interest > 11_500.0 && interest < 12_000.0);
    }
}
