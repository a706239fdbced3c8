//! Validation of untrusted model output into a typed recommendation draft.

use crate::domain::recommendation::Confidence;
use serde_json::{Map, Value};

pub const MAX_LIST_ITEMS: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
    #[error("model output is not a JSON object")]
    NotAnObject,
    #[error("model output is missing required field {0}")]
    MissingField(&'static str),
}

/// Model output after trimming and coercion. Labels are unchecked here;
/// they are reconciled against the deterministic options afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRecommendation {
    pub short_summary: String,
    pub primary_choice: String,
    pub alternative_choice: Option<String>,
    pub confidence: Confidence,
    pub forecast: String,
    pub key_factors: Vec<String>,
    pub tradeoffs: Vec<String>,
    pub what_would_change: Vec<String>,
    pub action_checklist: Vec<String>,
}

fn text(obj: &Map<String, Value>, key: &str) -> String {
    match obj.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn list(obj: &Map<String, Value>, key: &str) -> Vec<String> {
    let Some(Value::Array(items)) = obj.get(key) else {
        return Vec::new();
    };
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => s.trim().to_string(),
            Value::Null => String::new(),
            other => other.to_string(),
        })
        .filter(|s| !s.is_empty())
        .take(MAX_LIST_ITEMS)
        .collect()
}

fn required(value: String, field: &'static str) -> Result<String, ContractError> {
    if value.is_empty() {
        return Err(ContractError::MissingField(field));
    }
    Ok(value)
}

impl ModelRecommendation {
    pub fn from_value(value: &Value) -> Result<Self, ContractError> {
        let obj = value.as_object().ok_or(ContractError::NotAnObject)?;

        let short_summary = required(text(obj, "recommendationShort"), "recommendationShort")?;
        let primary_choice = required(text(obj, "primaryChoice"), "primaryChoice")?;
        let forecast = required(text(obj, "forecastMessage"), "forecastMessage")?;
        let key_factors = list(obj, "keyFactors");
        if key_factors.is_empty() {
            return Err(ContractError::MissingField("keyFactors"));
        }
        let alternative_choice = Some(text(obj, "nextBestAlternative")).filter(|s| !s.is_empty());

        Ok(Self {
            short_summary,
            primary_choice,
            alternative_choice,
            confidence: Confidence::coerce(&text(obj, "confidence")),
            forecast,
            key_factors,
            tradeoffs: list(obj, "tradeoffs"),
            what_would_change: list(obj, "whatWouldChange"),
            action_checklist: list(obj, "actionChecklist"),
        })
    }
}
