//! Prompt construction. Prompts embed only the deterministic comparison and
//! the validated criteria.

use crate::compare::{CompareResult, MetricValue};
use crate::domain::criteria::{CardCriteria, Criteria, SpendCategory};
use serde_json::{json, Value};

const RANKING_SIZE: usize = 5;

fn metric(value: Option<&MetricValue>) -> Value {
    match value {
        Some(MetricValue::Number(n)) => json!(n),
        Some(MetricValue::Text(s)) => json!(s),
        None => Value::Null,
    }
}

fn card_profile(criteria: &CardCriteria) -> serde_json::Result<Value> {
    let mut profile = serde_json::to_value(criteria)?;
    if criteria.top_categories.is_empty() {
        profile["topCategories"] = serde_json::to_value([SpendCategory::General])?;
    }
    Ok(profile)
}

fn card_ranking(compare: &CompareResult) -> Value {
    compare
        .options
        .iter()
        .take(RANKING_SIZE)
        .map(|o| {
            json!({
                "type": o.label,
                "score": metric(o.metrics.get("score")),
                "estimatedAnnualValue": metric(o.metrics.get("estimated_annual_value")),
                "estimatedAnnualRewards": metric(o.metrics.get("estimated_annual_rewards")),
                "estimatedAnnualInterestCost": metric(o.metrics.get("estimated_annual_interest_cost")),
                "assumedAnnualFee": metric(o.metrics.get("assumed_annual_fee")),
                "notes": metric(o.metrics.get("notes")),
            })
        })
        .collect()
}

fn credit_cards_prompt(compare: &CompareResult, criteria: &CardCriteria) -> serde_json::Result<String> {
    Ok([
        "You are a UK personal finance explainer for credit card type selection.".to_string(),
        "Do not decide ranking. Ranking is deterministic and final.".to_string(),
        "Use only provided numbers and profile. Do not invent data.".to_string(),
        "Tone: practical and plain language, no financial advice.".to_string(),
        "Return JSON only (no markdown).".to_string(),
        String::new(),
        "Category: credit-cards".to_string(),
        format!("UserProfile: {}", card_profile(criteria)?),
        format!("DeterministicRanking: {}", card_ranking(compare)),
        format!("Assumptions: {}", serde_json::to_string(&compare.assumptions)?),
        String::new(),
        "JSON schema:".to_string(),
        "{".to_string(),
        r#"  "recommendationShort": "1-2 sentence summary aligned with top deterministic type label","#.to_string(),
        r#"  "primaryChoice": "must match deterministic top type label","#.to_string(),
        r#"  "nextBestAlternative": "must match deterministic second type label","#.to_string(),
        r#"  "confidence": "low|medium|high","#.to_string(),
        r#"  "forecastMessage": "2-3 sentence scenario note for next 6-12 months","#.to_string(),
        r#"  "keyFactors": ["2-4 short bullets tied to profile + ranking numbers"],"#.to_string(),
        r#"  "tradeoffs": ["2-4 short bullets"],"#.to_string(),
        r#"  "whatWouldChange": ["2-4 short bullets including a pay-in-full vs revolving what-if"],"#.to_string(),
        r#"  "actionChecklist": ["2-4 short practical actions"]"#.to_string(),
        "}".to_string(),
    ]
    .join("\n"))
}

fn generic_prompt(compare: &CompareResult, criteria: &Criteria) -> serde_json::Result<String> {
    Ok([
        "You are a UK personal finance decision assistant.".to_string(),
        "Use ONLY the provided deterministic metrics and trends. Do not invent numbers.".to_string(),
        "The option ranking is fixed; choose labels only from the provided options.".to_string(),
        "Return JSON only (no markdown).".to_string(),
        String::new(),
        format!("Category: {}", compare.category),
        format!("Criteria: {}", serde_json::to_string(criteria)?),
        format!("CompareData: {}", serde_json::to_string(compare)?),
        String::new(),
        "JSON schema:".to_string(),
        "{".to_string(),
        r#"  "recommendationShort": "1-2 sentence plain-English summary","#.to_string(),
        r#"  "primaryChoice": "string matching an option label","#.to_string(),
        r#"  "nextBestAlternative": "string matching another option label","#.to_string(),
        r#"  "confidence": "low|medium|high","#.to_string(),
        r#"  "forecastMessage": "2-3 sentence scenario-based 6-12 month outlook","#.to_string(),
        r#"  "keyFactors": ["2-4 short bullets"],"#.to_string(),
        r#"  "tradeoffs": ["2-4 short bullets"],"#.to_string(),
        r#"  "whatWouldChange": ["2-4 short bullets"],"#.to_string(),
        r#"  "actionChecklist": ["2-4 short action steps for the user"]"#.to_string(),
        "}".to_string(),
    ]
    .join("\n"))
}

pub fn build_prompt(compare: &CompareResult, criteria: &Criteria) -> serde_json::Result<String> {
    match criteria {
        Criteria::CreditCards(c) => credit_cards_prompt(compare, c),
        _ => generic_prompt(compare, criteria),
    }
}
