use crate::compare::CompareResult;
use crate::domain::category::Category;
use serde::{Deserialize, Serialize};

pub const DISCLAIMER: &str = "Educational, not financial advice.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    #[default]
    Medium,
    High,
}

impl Confidence {
    /// Unrecognised values become `Medium`.
    pub fn coerce(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "low" => Confidence::Low,
            "high" => Confidence::High,
            _ => Confidence::Medium,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    #[serde(rename = "recommendationShort")]
    pub short_summary: String,
    pub primary_choice: String,
    #[serde(rename = "nextBestAlternative")]
    pub alternative_choice: String,
    pub confidence: Confidence,
    #[serde(rename = "forecastMessage")]
    pub forecast: String,
    pub key_factors: Vec<String>,
    pub tradeoffs: Vec<String>,
    pub what_would_change: Vec<String>,
    pub action_checklist: Vec<String>,
}

/// Public taxonomy for why the AI narrative was not used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AiFallbackReason {
    #[serde(rename = "ai_not_configured")]
    NotConfigured,
    #[serde(rename = "ai_timeout")]
    Timeout,
    #[serde(rename = "ai_request_error")]
    RequestError,
    #[serde(rename = "ai_unavailable")]
    Unavailable,
    /// The caller never asked for the AI path.
    #[serde(rename = "deterministic_recommendation")]
    DeterministicOnly,
}

impl AiFallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiFallbackReason::NotConfigured => "ai_not_configured",
            AiFallbackReason::Timeout => "ai_timeout",
            AiFallbackReason::RequestError => "ai_request_error",
            AiFallbackReason::Unavailable => "ai_unavailable",
            AiFallbackReason::DeterministicOnly => "deterministic_recommendation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiStatus {
    pub used: bool,
    pub fallback: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<AiFallbackReason>,
}

impl AiStatus {
    pub fn used(model: impl Into<String>) -> Self {
        Self {
            used: true,
            fallback: false,
            model: Some(model.into()),
            reason: None,
        }
    }

    pub fn fallback(reason: AiFallbackReason) -> Self {
        Self {
            used: false,
            fallback: true,
            model: None,
            reason: Some(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationsResponse {
    pub category: Category,
    pub recommendation: Recommendation,
    pub disclaimer: String,
    pub data_freshness_note: String,
    pub ai: AiStatus,
    pub compare: CompareResult,
}

impl RecommendationsResponse {
    pub fn new(recommendation: Recommendation, ai: AiStatus, compare: CompareResult) -> Self {
        let data_freshness_note = if compare.stale {
            "Some source data was served from cache after a failed refresh and may lag the latest publication."
        } else {
            "Uses latest available source timestamps from current fetch."
        };
        Self {
            category: compare.category,
            recommendation,
            disclaimer: DISCLAIMER.to_string(),
            data_freshness_note: data_freshness_note.to_string(),
            ai,
            compare,
        }
    }
}
