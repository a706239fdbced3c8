//! Reconciliation guard around the model. The model may narrate a
//! recommendation but never changes which option wins: its claimed choices
//! are kept only when they name a deterministic option, and for credit cards
//! the deterministic ranking always stands.

use crate::compare::CompareResult;
use crate::config::Settings;
use crate::domain::category::Category;
use crate::domain::contract::ModelRecommendation;
use crate::domain::criteria::Criteria;
use crate::domain::recommendation::{AiFallbackReason, AiStatus, Recommendation};
use crate::llm::error::{ModelCallError, ModelCallKind};
use crate::llm::gemini::GeminiClient;
use crate::llm::{json, prompt, LlmClient, ModelVariant};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AiAdvisor {
    client: Option<Arc<dyn LlmClient>>,
    variants: Vec<ModelVariant>,
    timeout: Duration,
    max_attempts: u32,
}

impl AiAdvisor {
    pub fn new(
        client: Arc<dyn LlmClient>,
        variants: Vec<ModelVariant>,
        timeout: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            client: Some(client),
            variants,
            timeout,
            max_attempts,
        }
    }

    pub fn disabled() -> Self {
        Self {
            client: None,
            variants: Vec::new(),
            timeout: Duration::ZERO,
            max_attempts: 0,
        }
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let Some(client) = GeminiClient::from_settings(settings)? else {
            return Ok(Self::disabled());
        };
        Ok(Self::new(
            Arc::new(client),
            ModelVariant::rotation(&settings.gemini_model, &settings.gemini_fallback_model),
            settings.gemini_timeout,
            settings.gemini_max_attempts,
        ))
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    async fn attempt(
        &self,
        client: &dyn LlmClient,
        variant: &ModelVariant,
        prompt: &str,
    ) -> Result<ModelRecommendation, ModelCallError> {
        let text = client.generate(variant, prompt).await?;
        let value = json::parse_model_json(&text).ok_or_else(|| {
            ModelCallError::new(ModelCallKind::InvalidJson, "parse", "no JSON object in model text")
                .with_raw_output(text.clone())
        })?;
        ModelRecommendation::from_value(&value).map_err(|err| {
            ModelCallError::new(ModelCallKind::InvalidContract, "validate", err.to_string())
                .with_raw_output(text.clone())
        })
    }

    /// Never fails: any problem yields the deterministic recommendation
    /// unchanged, annotated with a public fallback reason.
    pub async fn narrate(
        &self,
        compare: &CompareResult,
        criteria: &Criteria,
        deterministic: Recommendation,
    ) -> (Recommendation, AiStatus) {
        let Some(client) = self.client.as_deref() else {
            return (deterministic, AiStatus::fallback(AiFallbackReason::NotConfigured));
        };
        let prompt = match prompt::build_prompt(compare, criteria) {
            Ok(p) => p,
            Err(err) => {
                tracing::warn!(error = %err, "failed to build model prompt");
                return (deterministic, AiStatus::fallback(AiFallbackReason::Unavailable));
            }
        };

        let mut reason = AiFallbackReason::Unavailable;
        let attempts = self.variants.iter().cycle().take(self.max_attempts as usize);
        for (attempt, variant) in attempts.enumerate() {
            let outcome = tokio::time::timeout(self.timeout, self.attempt(client, variant, &prompt)).await;
            let err = match outcome {
                Ok(Ok(model)) => {
                    let recommendation = reconcile(compare, &deterministic, model);
                    return (recommendation, AiStatus::used(variant.model.clone()));
                }
                Ok(Err(err)) => err,
                Err(_) => {
                    reason = AiFallbackReason::Timeout;
                    tracing::warn!(
                        attempt = attempt + 1,
                        model = %variant.model,
                        api_version = variant.api_version.as_str(),
                        timeout_ms = self.timeout.as_millis() as u64,
                        "model call timed out"
                    );
                    break;
                }
            };

            reason = err.fallback_reason();
            if let Some(raw) = err.raw_output.as_deref() {
                tracing::debug!(attempt = attempt + 1, stage = err.stage, raw_output = raw, "model raw output");
            }
            tracing::warn!(
                attempt = attempt + 1,
                model = %variant.model,
                api_version = variant.api_version.as_str(),
                reason = reason.as_str(),
                error = %err,
                "model attempt failed"
            );
            if err.aborts_retries() {
                break;
            }
        }

        tracing::info!(
            category = %compare.category,
            reason = reason.as_str(),
            "using deterministic recommendation"
        );
        (deterministic, AiStatus::fallback(reason))
    }
}

fn or_deterministic(model: Vec<String>, deterministic: &[String]) -> Vec<String> {
    if model.is_empty() {
        deterministic.to_vec()
    } else {
        model
    }
}

/// Merges validated model narrative with the deterministic choices.
pub fn reconcile(
    compare: &CompareResult,
    deterministic: &Recommendation,
    model: ModelRecommendation,
) -> Recommendation {
    let fixed_ranking = compare.category == Category::CreditCards;

    let primary_choice = if !fixed_ranking && compare.has_label(&model.primary_choice) {
        model.primary_choice.clone()
    } else {
        deterministic.primary_choice.clone()
    };
    // Primary and alternative may only coincide when there is a single option.
    let alternative_choice = match &model.alternative_choice {
        Some(alt) if !fixed_ranking && *alt != primary_choice && compare.has_label(alt) => alt.clone(),
        _ => [&deterministic.alternative_choice, &deterministic.primary_choice]
            .into_iter()
            .find(|label| **label != primary_choice)
            .unwrap_or(&primary_choice)
            .clone(),
    };

    // A summary written around a rejected choice would contradict the result.
    let short_summary = if model.primary_choice == primary_choice {
        model.short_summary
    } else {
        deterministic.short_summary.clone()
    };

    Recommendation {
        short_summary,
        primary_choice,
        alternative_choice,
        confidence: model.confidence,
        forecast: model.forecast,
        key_factors: model.key_factors,
        tradeoffs: or_deterministic(model.tradeoffs, &deterministic.tradeoffs),
        what_would_change: or_deterministic(model.what_would_change, &deterministic.what_would_change),
        action_checklist: or_deterministic(model.action_checklist, &deterministic.action_checklist),
    }
}
