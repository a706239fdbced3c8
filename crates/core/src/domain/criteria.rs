//! Typed per-category criteria and the lenient conversion from request JSON.
//!
//! Input is coerced the way form posts arrive (numbers as strings, booleans
//! as `yes`/`1`, lists as comma-separated text) and then range-checked. The
//! engines only ever see the validated types.

use crate::domain::category::Category;
use serde::Serialize;
use serde_json::{Map, Value};

pub const DEFAULT_MORTGAGE_HORIZON_MONTHS: u32 = 24;
pub const DEFAULT_TERM_YEARS: f64 = 25.0;
pub const DEFAULT_SAVINGS_HORIZON_MONTHS: u32 = 12;
pub const MAX_SAVINGS_HORIZON_MONTHS: u32 = 120;
pub const MAX_HISTORY_MONTHS: u32 = 360;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CriteriaError {
    #[error("criteria must be a JSON object")]
    NotAnObject,
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PrimaryGoal {
    #[serde(rename = "minimize interest")]
    MinimizeInterest,
    #[serde(rename = "maximize rewards")]
    MaximizeRewards,
    #[serde(rename = "simplicity/no fees")]
    SimplicityNoFees,
    #[serde(rename = "travel benefits")]
    TravelBenefits,
}

impl PrimaryGoal {
    /// Keyword match, checked in order; anything unrecognised means rewards.
    pub fn parse(raw: &str) -> Self {
        let goal = raw.to_lowercase();
        if goal.contains("interest") {
            PrimaryGoal::MinimizeInterest
        } else if goal.contains("travel") {
            PrimaryGoal::TravelBenefits
        } else if goal.contains("simplicity") || goal.contains("fees") {
            PrimaryGoal::SimplicityNoFees
        } else {
            PrimaryGoal::MaximizeRewards
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SpendCategory {
    #[serde(rename = "groceries")]
    Groceries,
    #[serde(rename = "fuel/transport")]
    FuelTransport,
    #[serde(rename = "travel")]
    Travel,
    #[serde(rename = "dining")]
    Dining,
    #[serde(rename = "online shopping")]
    OnlineShopping,
    #[serde(rename = "general")]
    General,
}

impl SpendCategory {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "groceries" => Some(SpendCategory::Groceries),
            "fuel/transport" => Some(SpendCategory::FuelTransport),
            "travel" => Some(SpendCategory::Travel),
            "dining" => Some(SpendCategory::Dining),
            "online shopping" => Some(SpendCategory::OnlineShopping),
            "general" => Some(SpendCategory::General),
            _ => None,
        }
    }

    pub fn is_everyday(&self) -> bool {
        !matches!(self, SpendCategory::Travel)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MortgageCriteria {
    pub loan_amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ltv: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horizon_months: Option<u32>,
    pub term_years: f64,
    pub risk_tolerance: String,
}

impl MortgageCriteria {
    pub fn horizon(&self) -> u32 {
        self.horizon_months
            .unwrap_or(DEFAULT_MORTGAGE_HORIZON_MONTHS)
            .clamp(1, MAX_HISTORY_MONTHS)
    }

    pub fn term_months(&self) -> u32 {
        ((self.term_years * 12.0).round() as u32).max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsCriteria {
    pub deposit: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horizon_months: Option<u32>,
    pub risk_tolerance: String,
}

impl SavingsCriteria {
    pub fn horizon(&self) -> u32 {
        self.horizon_months
            .unwrap_or(DEFAULT_SAVINGS_HORIZON_MONTHS)
            .clamp(1, MAX_SAVINGS_HORIZON_MONTHS)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardCriteria {
    pub monthly_spend: f64,
    pub pay_in_full_monthly: bool,
    pub carry_debt: bool,
    pub carry_debt_amount: f64,
    pub top_categories: Vec<SpendCategory>,
    pub primary_goal: PrimaryGoal,
}

impl CardCriteria {
    pub fn revolving(&self) -> bool {
        !self.pay_in_full_monthly || self.carry_debt
    }

    pub fn has_category(&self, category: SpendCategory) -> bool {
        self.top_categories.contains(&category)
    }

    pub fn has_everyday_category(&self) -> bool {
        self.top_categories.iter().any(SpendCategory::is_everyday)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Criteria {
    Mortgages(MortgageCriteria),
    Savings(SavingsCriteria),
    CreditCards(CardCriteria),
}

impl Criteria {
    pub fn category(&self) -> Category {
        match self {
            Criteria::Mortgages(_) => Category::Mortgages,
            Criteria::Savings(_) => Category::Savings,
            Criteria::CreditCards(_) => Category::CreditCards,
        }
    }

    /// Lookback used when fetching series for this request.
    pub fn history_months(&self, default_months: u32) -> u32 {
        let horizon = match self {
            Criteria::Mortgages(c) => c.horizon_months,
            Criteria::Savings(c) => c.horizon_months,
            Criteria::CreditCards(_) => None,
        };
        horizon.unwrap_or(default_months).clamp(1, MAX_HISTORY_MONTHS)
    }

    pub fn risk_tolerance(&self) -> &str {
        match self {
            Criteria::Mortgages(c) => &c.risk_tolerance,
            Criteria::Savings(c) => &c.risk_tolerance,
            Criteria::CreditCards(_) => "balanced",
        }
    }

    /// `null` is read as an empty object so GET requests without criteria
    /// report the missing required field rather than a type error.
    pub fn from_json(category: Category, value: &Value) -> Result<Self, CriteriaError> {
        let empty = Map::new();
        let obj = match value {
            Value::Object(map) => map,
            Value::Null => &empty,
            _ => return Err(CriteriaError::NotAnObject),
        };
        let fields = Fields(obj);

        match category {
            Category::Mortgages => Ok(Criteria::Mortgages(MortgageCriteria {
                loan_amount: fields.required_number("loanAmount", 1_000.0, 5_000_000.0)?,
                ltv: fields.optional_number("ltv", 0.05, 1.2)?,
                horizon_months: fields.optional_months("horizonMonths")?,
                term_years: fields
                    .optional_number("termYears", 1.0, 40.0)?
                    .unwrap_or(DEFAULT_TERM_YEARS),
                risk_tolerance: fields.risk_tolerance(),
            })),
            Category::Savings => Ok(Criteria::Savings(SavingsCriteria {
                deposit: fields.required_number("deposit", 1.0, 100_000_000.0)?,
                horizon_months: fields.optional_months("horizonMonths")?,
                risk_tolerance: fields.risk_tolerance(),
            })),
            Category::CreditCards => {
                let monthly_spend = fields.required_number("monthlySpend", 0.0, 1_000_000.0)?;
                let pay_in_full_monthly = fields.boolean("payInFullMonthly").unwrap_or(true);
                let carry_debt = fields.boolean("carryDebt").unwrap_or(!pay_in_full_monthly);
                let carry_debt_amount = fields
                    .optional_number("carryDebtAmount", 0.0, 10_000_000.0)?
                    .unwrap_or(monthly_spend);
                let top_categories = fields
                    .string_list("topCategories")
                    .iter()
                    .filter_map(|c| SpendCategory::parse(c))
                    .collect();
                let primary_goal = fields
                    .text("primaryGoal")
                    .map(|g| PrimaryGoal::parse(&g))
                    .unwrap_or(PrimaryGoal::MaximizeRewards);

                Ok(Criteria::CreditCards(CardCriteria {
                    monthly_spend,
                    pay_in_full_monthly,
                    carry_debt,
                    carry_debt_amount,
                    top_categories,
                    primary_goal,
                }))
            }
        }
    }
}

struct Fields<'a>(&'a Map<String, Value>);

impl Fields<'_> {
    fn present(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| match v {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            _ => true,
        })
    }

    fn number(&self, key: &str) -> Result<Option<f64>, CriteriaError> {
        let Some(raw) = self.present(key) else {
            return Ok(None);
        };
        let n = match raw {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match n.filter(|n| n.is_finite()) {
            Some(n) => Ok(Some(n)),
            None => Err(CriteriaError::Invalid(format!("{key} must be a number"))),
        }
    }

    fn optional_number(&self, key: &str, min: f64, max: f64) -> Result<Option<f64>, CriteriaError> {
        match self.number(key)? {
            Some(n) if !(min..=max).contains(&n) => Err(CriteriaError::Invalid(format!(
                "{key} must be between {min} and {max}"
            ))),
            other => Ok(other),
        }
    }

    fn required_number(&self, key: &str, min: f64, max: f64) -> Result<f64, CriteriaError> {
        self.optional_number(key, min, max)?
            .ok_or_else(|| CriteriaError::Invalid(format!("{key} is required")))
    }

    fn optional_months(&self, key: &str) -> Result<Option<u32>, CriteriaError> {
        Ok(self
            .optional_number(key, 1.0, MAX_HISTORY_MONTHS as f64)?
            .map(|n| n.round() as u32))
    }

    fn boolean(&self, key: &str) -> Option<bool> {
        match self.present(key)? {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_f64().map(|n| n != 0.0),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "y" | "1" => Some(true),
                "false" | "no" | "n" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    fn text(&self, key: &str) -> Option<String> {
        match self.present(key)? {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn string_list(&self, key: &str) -> Vec<String> {
        match self.present(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.trim().to_string()),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .filter(|s| !s.is_empty())
                .collect(),
            Some(Value::String(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    fn risk_tolerance(&self) -> String {
        self.text("riskTolerance")
            .map(|r| r.to_lowercase())
            .unwrap_or_else(|| "balanced".to_string())
    }
}
