use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::error::EngineError;

/// Contribution frequency. Only the cadences the storefront offers are representable.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Cadence {
    Annual,
    HalfYearly,
    Quarterly,
    #[default]
    Monthly,
}

impl Cadence {
    pub fn periods_per_year(self) -> u32 {
        match self {
            Cadence::Annual => 1,
            Cadence::HalfYearly => 2,
            Cadence::Quarterly => 4,
            Cadence::Monthly => 12,
        }
    }
}

impl TryFrom<u32> for Cadence {
    type Error = EngineError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Cadence::Annual),
            2 => Ok(Cadence::HalfYearly),
            4 => Ok(Cadence::Quarterly),
            12 => Ok(Cadence::Monthly),
            other => Err(EngineError::UnsupportedCadence(other)),
        }
    }
}

impl From<Cadence> for u32 {
    fn from(value: Cadence) -> Self {
        value.periods_per_year()
    }
}

/// Yearly increase applied to the per-period contribution.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum StepUp {
    /// Fixed money added to each period's contribution once a year.
    Amount(f64),
    /// Decimal ratio, 0.10 raises the contribution by 10% once a year.
    Percent(f64),
}

impl StepUp {
    pub(crate) fn apply(self, contribution: f64) -> f64 {
        match self {
            StepUp::Amount(amount) => contribution + amount,
            StepUp::Percent(ratio) => contribution * (1.0 + ratio),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionSchedule {
    pub base_amount: f64,
    #[serde(default)]
    pub periods_per_year: Cadence,
    pub years: f64,
    #[serde(default)]
    pub step_up: Option<StepUp>,
}

impl ContributionSchedule {
    pub fn monthly(base_amount: f64, years: f64) -> Self {
        Self {
            base_amount,
            periods_per_year: Cadence::Monthly,
            years,
            step_up: None,
        }
    }

    pub fn with_step_up(mut self, step_up: StepUp) -> Self {
        self.step_up = Some(step_up);
        self
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionResult {
    pub total_invested: f64,
    pub future_value: f64,
    pub total_returns: f64,
}

impl ProjectionResult {
    pub(crate) fn new(total_invested: f64, future_value: f64) -> Self {
        Self {
            total_invested,
            future_value,
            total_returns: future_value - total_invested,
        }
    }
}

/// One row of a year-by-year projection, for growth charts.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionYear {
    /// 1-based; a trailing partial year gets its own row.
    pub year: u32,
    pub periods: u32,
    pub contribution_per_period: f64,
    pub invested_to_date: f64,
    pub value_at_year_end: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub target_year: i32,
    pub current_cost: f64,
    pub inflation_rate: f64,
    pub expected_return: f64,
    #[serde(default)]
    pub contribution_step_up: f64,
    #[serde(default)]
    pub lumpsum_today: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Error)]
#[serde(rename_all = "kebab-case")]
pub enum UnreachableGoal {
    #[error("target year is not in the future")]
    GoalNotInFuture,
    #[error("no contribution bracket found within the doubling limit")]
    NoBracket,
    #[error("iteration cap reached before tolerance was met")]
    IterationCap,
    #[error("inflated cost or grown lumpsum exceeds the representable range")]
    Overflow,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalResult {
    pub years_to_goal: i32,
    pub future_cost: f64,
    pub lumpsum_future_value: f64,
    pub required_periodic_contribution: f64,
    pub converged: bool,
    pub iterations: u32,
    pub unreachable: Option<UnreachableGoal>,
    /// The solved schedule re-projected; absent when no schedule was needed or found.
    pub projection: Option<ProjectionResult>,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedAsset {
    pub value: f64,
    pub weight_percent: f64,
}

impl WeightedAsset {
    pub fn new(value: f64, weight_percent: f64) -> Self {
        Self {
            value,
            weight_percent,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedAverage {
    pub value: f64,
    pub weight_sum: f64,
    pub is_balanced: bool,
}

impl WeightedAverage {
    /// Display rounding: half away from zero at `decimals` places. Engine values are never rounded.
    pub fn rounded(&self, decimals: u32) -> f64 {
        let scale = 10f64.powi(decimals as i32);
        (self.value * scale).round() / scale
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundHolding {
    pub cagr: f64,
    pub risk_score: f64,
    pub weight_percent: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskBucket {
    Moderate,
    ModerateHigh,
    High,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BasketMetrics {
    pub cagr: WeightedAverage,
    pub risk_score: WeightedAverage,
    pub risk_bucket: RiskBucket,
    pub allocated_percent: f64,
    pub remaining_percent: f64,
}
