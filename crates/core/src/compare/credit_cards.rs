//! Card-type ranking. Six fixed archetypes are scored from spend, payment
//! behaviour, goal and spending mix. Revolving users get a policy override:
//! debt-control types always rank first, in a fixed tier order.

use crate::compare::{as_of_map, strings, CompareOption, CompareResult, MetricValue};
use crate::domain::category::Category;
use crate::domain::criteria::{CardCriteria, PrimaryGoal, SpendCategory};
use crate::ingest::types::{round2, ProductsSnapshot};
use std::collections::BTreeMap;

const REPRESENTATIVE_APR: f64 = 0.22;
const MAX_OPTIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardType {
    Cashback,
    RewardsPoints,
    Travel,
    LowApr,
    BalanceTransfer,
    ZeroPercentPurchases,
}

impl CardType {
    pub const ALL: [CardType; 6] = [
        CardType::Cashback,
        CardType::RewardsPoints,
        CardType::Travel,
        CardType::LowApr,
        CardType::BalanceTransfer,
        CardType::ZeroPercentPurchases,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            CardType::Cashback => "cashback",
            CardType::RewardsPoints => "rewards-points",
            CardType::Travel => "travel",
            CardType::LowApr => "low-apr",
            CardType::BalanceTransfer => "balance-transfer",
            CardType::ZeroPercentPurchases => "zero-percent-purchases",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CardType::Cashback => "Cashback",
            CardType::RewardsPoints => "Rewards / Points",
            CardType::Travel => "Travel",
            CardType::LowApr => "Low APR",
            CardType::BalanceTransfer => "Balance Transfer",
            CardType::ZeroPercentPurchases => "0% Purchases",
        }
    }

    fn notes(&self) -> &'static str {
        match self {
            CardType::Cashback => "Simple return on everyday spending.",
            CardType::RewardsPoints => "Useful if you redeem points efficiently.",
            CardType::Travel => "Most valuable for travel-heavy spending.",
            CardType::LowApr => "Prioritizes lower interest when balances are carried.",
            CardType::BalanceTransfer => "Helps reduce existing debt costs.",
            CardType::ZeroPercentPurchases => "Short-term cost control for planned spending.",
        }
    }

    fn reward_rate(&self, criteria: &CardCriteria) -> f64 {
        match self {
            CardType::Cashback => 0.01,
            CardType::RewardsPoints => 0.008,
            CardType::Travel if criteria.has_category(SpendCategory::Travel) => 0.012,
            CardType::Travel => 0.006,
            CardType::LowApr => 0.002,
            CardType::BalanceTransfer => 0.0,
            CardType::ZeroPercentPurchases => 0.001,
        }
    }

    fn annual_fee(&self) -> f64 {
        match self {
            CardType::Travel => 60.0,
            CardType::BalanceTransfer => 25.0,
            _ => 0.0,
        }
    }

    /// Fraction of the baseline interest this type avoids.
    fn interest_relief(&self) -> f64 {
        match self {
            CardType::LowApr => 0.45,
            CardType::BalanceTransfer => 0.70,
            CardType::ZeroPercentPurchases => 0.80,
            _ => 0.05,
        }
    }

    pub fn is_debt_control(&self) -> bool {
        matches!(
            self,
            CardType::LowApr | CardType::BalanceTransfer | CardType::ZeroPercentPurchases
        )
    }

    fn revolving_tier(&self) -> u8 {
        match self {
            CardType::BalanceTransfer => 3,
            CardType::LowApr => 2,
            CardType::ZeroPercentPurchases => 1,
            _ => 0,
        }
    }
}

fn behavior_boost(revolving: bool, card: CardType) -> f64 {
    match (revolving, card.is_debt_control()) {
        (true, true) => 28.0,
        (true, false) => -18.0,
        (false, true) => -10.0,
        (false, false) => 12.0,
    }
}

fn goal_boost(goal: PrimaryGoal, card: CardType) -> f64 {
    match goal {
        PrimaryGoal::MinimizeInterest if card.is_debt_control() => 24.0,
        PrimaryGoal::MinimizeInterest => -8.0,
        PrimaryGoal::TravelBenefits => match card {
            CardType::Travel => 22.0,
            CardType::RewardsPoints => 8.0,
            _ => -4.0,
        },
        PrimaryGoal::SimplicityNoFees => match card {
            CardType::Cashback => 14.0,
            CardType::LowApr => 8.0,
            CardType::Travel => -8.0,
            _ => 2.0,
        },
        PrimaryGoal::MaximizeRewards => match card {
            CardType::Cashback | CardType::RewardsPoints | CardType::Travel => 18.0,
            _ => -8.0,
        },
    }
}

fn category_boost(criteria: &CardCriteria, card: CardType) -> f64 {
    match card {
        CardType::Travel if criteria.has_category(SpendCategory::Travel) => 14.0,
        CardType::Cashback if criteria.has_everyday_category() => 8.0,
        CardType::RewardsPoints if criteria.has_everyday_category() => 6.0,
        _ => 0.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredCard {
    pub card: CardType,
    pub score: f64,
    pub annual_rewards: f64,
    pub annual_interest: f64,
    pub annual_net_value: f64,
}

/// Every archetype in final rank order, before truncation.
pub fn rank(criteria: &CardCriteria) -> Vec<ScoredCard> {
    let revolving = criteria.revolving();
    let annual_spend = criteria.monthly_spend * 12.0;
    let baseline_interest = if revolving {
        criteria.carry_debt_amount * REPRESENTATIVE_APR
    } else {
        0.0
    };

    let mut ranked: Vec<ScoredCard> = CardType::ALL
        .into_iter()
        .map(|card| {
            let annual_rewards = annual_spend * card.reward_rate(criteria);
            let annual_interest = baseline_interest * (1.0 - card.interest_relief());
            let annual_net_value = annual_rewards - annual_interest - card.annual_fee();
            let score = annual_net_value / 10.0
                + behavior_boost(revolving, card)
                + goal_boost(criteria.primary_goal, card)
                + category_boost(criteria, card);
            ScoredCard {
                card,
                score,
                annual_rewards,
                annual_interest,
                annual_net_value,
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    if revolving {
        ranked.sort_by(|a, b| {
            b.card
                .revolving_tier()
                .cmp(&a.card.revolving_tier())
                .then(b.score.total_cmp(&a.score))
        });
    }
    ranked
}

fn to_option(scored: &ScoredCard) -> CompareOption {
    let card = scored.card;
    let metrics = BTreeMap::from([
        (
            "score".to_string(),
            MetricValue::from((scored.score * 10.0).round() / 10.0),
        ),
        ("estimated_annual_value".to_string(), round2(scored.annual_net_value).into()),
        ("estimated_annual_rewards".to_string(), round2(scored.annual_rewards).into()),
        (
            "estimated_annual_interest_cost".to_string(),
            round2(scored.annual_interest).into(),
        ),
        ("assumed_annual_fee".to_string(), card.annual_fee().into()),
        ("notes".to_string(), card.notes().into()),
    ]);
    CompareOption {
        id: card.id().to_string(),
        label: card.label().to_string(),
        rate_pct: None,
        metrics,
    }
}

pub fn compare(products: &ProductsSnapshot, criteria: &CardCriteria) -> CompareResult {
    let options = rank(criteria).iter().take(MAX_OPTIONS).map(to_option).collect();

    CompareResult {
        category: Category::CreditCards,
        as_of: as_of_map(products),
        assumptions: strings(&[
            "cashbackRate=1.0%, rewardsRate=0.8%, representativeAPR=22%",
            "estimatedAnnualRewards = monthlySpend * 12 * assumedRate",
            "estimatedAnnualInterestCost is illustrative and applies when revolving",
            "If not paid in full or debt is carried, debt-control card types are prioritized",
        ]),
        options,
        chart_series: Vec::new(),
        stale: false,
    }
}
