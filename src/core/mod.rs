//! Projection, goal-solving and allocation arithmetic for investment baskets.
//!
//! Everything here is a pure function of its arguments: no clock, no I/O, no
//! shared state. Rates are decimal ratios (12% is `0.12`) and money is in the
//! base currency unit.

mod aggregator;
mod error;
mod simulator;
mod solver;
mod types;

pub use aggregator::{
    AggregatorConfig, DEFAULT_BALANCE_EPSILON, FULL_ALLOCATION, RiskThresholds, apply_edit,
    basket_metrics, clamp, equal_split, is_valid, remaining_percent, weighted_average,
    weighted_average_with,
};
pub use error::{EngineError, Result};
pub use simulator::{MAX_PROJECTION_YEARS, project, project_lumpsum, project_yearly};
pub use solver::{GoalSolveConfig, solve, solve_with};
pub use types::{
    BasketMetrics, Cadence, ContributionSchedule, FundHolding, Goal, GoalResult,
    ProjectionResult, ProjectionYear, RiskBucket, StepUp, UnreachableGoal, WeightedAsset,
    WeightedAverage,
};
