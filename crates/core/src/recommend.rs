//! Deterministic recommendation composer: template text over the ranked
//! comparison, no free-form generation.

use crate::compare::{CompareOption, CompareResult};
use crate::domain::category::Category;
use crate::domain::criteria::Criteria;
use crate::domain::recommendation::{Confidence, Recommendation};

const NO_RECOMMENDATION: &str = "No recommendation";

/// Card results are already policy-sorted. Loan and savings results are
/// re-ranked cheapest first by horizon interest cost.
pub fn ranked_options(compare: &CompareResult) -> Vec<&CompareOption> {
    let mut options: Vec<&CompareOption> = compare.options.iter().collect();
    if compare.category != Category::CreditCards {
        let cost = |o: &CompareOption| o.metric("interest_cost_over_horizon_est").unwrap_or(0.0);
        options.sort_by(|a, b| cost(*a).total_cmp(&cost(*b)));
    }
    options
}

fn summary(category: Category, primary: &str, risk_tolerance: &str) -> String {
    match category {
        Category::Mortgages if risk_tolerance.contains("certainty") => format!(
            "Given your certainty preference and current spreads, {primary} is likely the safer option."
        ),
        Category::Mortgages => {
            format!("Based on the latest market data, {primary} is currently the strongest fit.")
        }
        Category::Savings => format!(
            "Savings rates are best interpreted against inflation, and {primary} currently balances return and access."
        ),
        Category::CreditCards => format!(
            "Based on your payment behavior and spending mix, {primary} is the most suitable card type right now."
        ),
    }
}

fn forecast(category: Category) -> &'static str {
    match category {
        Category::Mortgages => "If the base rate stays elevated over the next 6-12 months, fixed options are likely to remain more predictable for monthly budgeting.",
        Category::Savings => "If inflation cools faster than savings rates, real returns may improve over the next 6-12 months.",
        Category::CreditCards => "If you continue carrying balances, low-APR types are likely to stay more cost-effective than rewards-focused cards.",
    }
}

/// One factor quoting the top option's own numbers.
fn metric_factor(category: Category, top: &CompareOption) -> Option<String> {
    match category {
        Category::Mortgages => {
            let payment = top.metric("monthly_payment_est")?;
            let interest = top.metric("interest_cost_over_horizon_est")?;
            Some(format!(
                "{} costs about {payment:.2} a month and {interest:.2} in interest over your horizon",
                top.label
            ))
        }
        Category::Savings => {
            let real = top.metric("real_rate_pct")?;
            Some(format!("Real rate after CPIH inflation is {real:.2}%"))
        }
        Category::CreditCards => {
            let value = top.metric("estimated_annual_value")?;
            Some(format!("{} has an estimated annual value of {value:.2}", top.label))
        }
    }
}

fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn compose(compare: &CompareResult, criteria: &Criteria) -> Recommendation {
    let category = compare.category;
    let ranked = ranked_options(compare);
    let top = ranked.first().copied();
    let primary = top.map(|o| o.label.as_str()).unwrap_or(NO_RECOMMENDATION);
    let alternative = ranked.get(1).map(|o| o.label.as_str()).unwrap_or(primary);

    let mut key_factors = vec!["Based on latest available BoE/ONS series".to_string()];
    key_factors.push(match category {
        Category::CreditCards => "Compared with deterministic spending, debt, and goal-based scoring".to_string(),
        _ => "Compared using deterministic, transparent assumptions".to_string(),
    });
    key_factors.extend(top.and_then(|o| metric_factor(category, o)));

    Recommendation {
        short_summary: summary(category, primary, criteria.risk_tolerance()),
        primary_choice: primary.to_string(),
        alternative_choice: alternative.to_string(),
        confidence: Confidence::Medium,
        forecast: forecast(category).to_string(),
        key_factors,
        tradeoffs: lines(&[
            "Outcome is sensitive to future rate/inflation changes",
            "Figures are estimates and not provider-specific offers",
        ]),
        what_would_change: lines(&[
            "Material shift in base rate path or inflation trend",
            "Different user preferences or time horizon",
        ]),
        action_checklist: lines(&[
            "Review the top two options side by side in the comparison table",
            "Adjust your horizon or risk preference and re-run the scenario",
            "Use the trend chart to confirm whether current conditions are changing",
        ]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::fixtures::{series, snapshot};
    use crate::compare::score;
    use serde_json::json;

    fn mortgage_compare(risk: &str) -> (CompareResult, Criteria) {
        let products = snapshot(
            Category::Mortgages,
            vec![
                series("IUMBV34", &[("2026-01", 4.8)]),
                series("IUMBV42", &[("2026-01", 4.2)]),
                series("IUMTLMV", &[("2026-01", 7.5)]),
            ],
        );
        let criteria = Criteria::from_json(
            Category::Mortgages,
            &json!({"loanAmount": 250000, "riskTolerance": risk}),
        )
        .unwrap();
        (score(&products, &criteria).unwrap(), criteria)
    }

    #[test]
    fn mortgages_rank_cheapest_interest_first() {
        let (compare, criteria) = mortgage_compare("balanced");
        assert_eq!(compare.options[0].label, "2y fixed");

        let rec = compose(&compare, &criteria);
        assert_eq!(rec.primary_choice, "5y fixed");
        assert_eq!(rec.alternative_choice, "2y fixed");
        assert_eq!(rec.confidence, Confidence::Medium);
        assert!(rec.short_summary.starts_with("Based on the latest market data, 5y fixed"));
        assert_eq!(rec.key_factors.len(), 3);
        assert!(rec.key_factors[2].starts_with("5y fixed costs about"));
    }

    #[test]
    fn certainty_preference_changes_summary() {
        let (compare, criteria) = mortgage_compare("high certainty");
        let rec = compose(&compare, &criteria);
        assert!(rec.short_summary.starts_with("Given your certainty preference"));
    }

    #[test]
    fn card_order_is_taken_as_is() {
        let criteria = Criteria::from_json(
            Category::CreditCards,
            &json!({"monthlySpend": 1500, "payInFullMonthly": false}),
        )
        .unwrap();
        let compare = score(&snapshot(Category::CreditCards, vec![]), &criteria).unwrap();
        let rec = compose(&compare, &criteria);
        assert_eq!(rec.primary_choice, "Balance Transfer");
        assert_eq!(rec.alternative_choice, "Low APR");
    }

    #[test]
    fn single_option_uses_primary_as_alternative() {
        let products = snapshot(
            Category::Savings,
            vec![
                series("CFMHSCV", &[("2026-01", 3.0)]),
                series("CPIH_YOY", &[("2026-01", 2.0)]),
            ],
        );
        let criteria = Criteria::from_json(Category::Savings, &json!({"deposit": 1000})).unwrap();
        let compare = score(&products, &criteria).unwrap();
        let rec = compose(&compare, &criteria);
        assert_eq!(rec.primary_choice, "Market-average sight deposit");
        assert_eq!(rec.alternative_choice, rec.primary_choice);
        assert_eq!(rec.key_factors[2], "Real rate after CPIH inflation is 1.00%");
    }

    #[test]
    fn empty_comparison_has_placeholder_choice() {
        let (mut compare, criteria) = mortgage_compare("balanced");
        compare.options.clear();
        let rec = compose(&compare, &criteria);
        assert_eq!(rec.primary_choice, NO_RECOMMENDATION);
        assert_eq!(rec.key_factors.len(), 2);
    }

    #[test]
    fn composing_twice_is_byte_identical() {
        let (compare, criteria) = mortgage_compare("balanced");
        let a = serde_json::to_string(&compose(&compare, &criteria)).unwrap();
        let b = serde_json::to_string(&compose(&compare, &criteria)).unwrap();
        assert_eq!(a, b);
    }
}
