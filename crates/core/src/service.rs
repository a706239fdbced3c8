//! End-to-end pipeline: products, deterministic comparison, recommendation.

use crate::cache::SeriesCache;
use crate::compare::{self, CompareResult};
use crate::config::Settings;
use crate::domain::category::Category;
use crate::domain::criteria::Criteria;
use crate::domain::recommendation::{AiFallbackReason, AiStatus, RecommendationsResponse};
use crate::ingest::fetch::{ReqwestTransport, Transport};
use crate::ingest::live::{MarketData, ProductsQuery};
use crate::ingest::types::{ProductsSnapshot, Window};
use crate::llm::guard::AiAdvisor;
use crate::recommend;
use chrono::NaiveDate;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecommendOptions {
    pub bypass_cache: bool,
    pub use_ai: bool,
}

impl Default for RecommendOptions {
    fn default() -> Self {
        Self {
            bypass_cache: false,
            use_ai: true,
        }
    }
}

#[derive(Clone)]
pub struct Advisor {
    market: MarketData,
    ai: AiAdvisor,
}

impl Advisor {
    pub fn new(market: MarketData, ai: AiAdvisor) -> Self {
        Self { market, ai }
    }

    pub fn from_settings(settings: &Settings, cache: SeriesCache) -> anyhow::Result<Self> {
        let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new()?);
        let market = MarketData::from_settings(settings, transport, cache);
        let ai = AiAdvisor::from_settings(settings)?;
        tracing::info!(ai_configured = ai.is_configured(), "advisor ready");
        Ok(Self::new(market, ai))
    }

    pub async fn products(
        &self,
        category: Category,
        query: ProductsQuery,
        today: NaiveDate,
    ) -> anyhow::Result<ProductsSnapshot> {
        self.market.products(category, query, today).await
    }

    pub async fn compare(
        &self,
        criteria: &Criteria,
        bypass_cache: bool,
        today: NaiveDate,
    ) -> anyhow::Result<CompareResult> {
        let months = criteria.history_months(self.market.default_months());
        let query = ProductsQuery {
            window: Window::months(months),
            bypass_cache,
        };
        let products = self.market.products(criteria.category(), query, today).await?;
        Ok(compare::score(&products, criteria)?)
    }

    /// Upstream data errors propagate; the AI step can only degrade to the
    /// deterministic recommendation.
    pub async fn recommend(
        &self,
        criteria: &Criteria,
        options: RecommendOptions,
        today: NaiveDate,
    ) -> anyhow::Result<RecommendationsResponse> {
        let compare = self.compare(criteria, options.bypass_cache, today).await?;
        let deterministic = recommend::compose(&compare, criteria);

        let (recommendation, ai) = if options.use_ai {
            self.ai.narrate(&compare, criteria, deterministic).await
        } else {
            (deterministic, AiStatus::fallback(AiFallbackReason::DeterministicOnly))
        };

        tracing::info!(
            category = %compare.category,
            primary = %recommendation.primary_choice,
            ai_used = ai.used,
            stale = compare.stale,
            "recommendation composed"
        );
        Ok(RecommendationsResponse::new(recommendation, ai, compare))
    }
}
