use log::{debug, warn};

use super::error::{EngineError, Result, require_finite, require_non_negative, require_rate};
use super::simulator::{project, project_lumpsum};
use super::types::{
    Cadence, ContributionSchedule, Goal, GoalResult, ProjectionResult, StepUp, UnreachableGoal,
};

#[derive(Debug, Clone, Copy)]
pub struct GoalSolveConfig {
    pub cadence: Cadence,
    /// Accepted overshoot of the projected value, as a fraction of the residual.
    pub relative_tolerance: f64,
    /// Floor on the accepted overshoot, in currency units.
    pub min_tolerance: f64,
    pub max_iterations: u32,
    pub max_doublings: u32,
}

impl Default for GoalSolveConfig {
    fn default() -> Self {
        Self {
            cadence: Cadence::Monthly,
            relative_tolerance: 1e-6,
            min_tolerance: 1.0,
            max_iterations: 60,
            max_doublings: 64,
        }
    }
}

/// Periodic contribution needed to reach `goal`, solved with the default config.
pub fn solve(goal: &Goal, current_year: i32) -> Result<GoalResult> {
    solve_with(goal, current_year, &GoalSolveConfig::default())
}

pub fn solve_with(goal: &Goal, current_year: i32, config: &GoalSolveConfig) -> Result<GoalResult> {
    validate_goal(goal)?;
    validate_config(config)?;

    let years_to_goal = goal.target_year.saturating_sub(current_year);
    if years_to_goal <= 0 {
        warn!(
            "goal for {} cannot be funded from {current_year}: no contribution periods remain",
            goal.target_year
        );
        return Ok(GoalResult {
            years_to_goal,
            future_cost: goal.current_cost,
            lumpsum_future_value: goal.lumpsum_today,
            required_periodic_contribution: 0.0,
            converged: false,
            iterations: 0,
            unreachable: Some(UnreachableGoal::GoalNotInFuture),
            projection: None,
        });
    }

    let years = years_to_goal as f64;
    let future_cost = if goal.current_cost == 0.0 {
        0.0
    } else {
        goal.current_cost * (1.0 + goal.inflation_rate).powf(years)
    };
    let lumpsum_future_value =
        match project_lumpsum(goal.lumpsum_today, goal.expected_return, years) {
            Ok(projection) => projection.future_value,
            Err(EngineError::Overflow { value, .. }) => value,
            Err(e) => return Err(e),
        };

    let mut result = GoalResult {
        years_to_goal,
        future_cost,
        lumpsum_future_value,
        required_periodic_contribution: 0.0,
        converged: true,
        iterations: 0,
        unreachable: None,
        projection: None,
    };
    if !future_cost.is_finite() || !lumpsum_future_value.is_finite() {
        warn!(
            "goal over {years_to_goal} years overflows: cost {future_cost}, lumpsum {lumpsum_future_value}"
        );
        result.converged = false;
        result.unreachable = Some(UnreachableGoal::Overflow);
        return Ok(result);
    }

    let residual = (future_cost - lumpsum_future_value).max(0.0);
    if residual <= 0.0 {
        debug!("lumpsum already covers goal cost {future_cost:.2}");
        return Ok(result);
    }

    let search = ContributionSearch {
        template: ContributionSchedule {
            base_amount: 0.0,
            periods_per_year: config.cadence,
            years,
            step_up: Some(StepUp::Percent(goal.contribution_step_up)),
        },
        expected_return: goal.expected_return,
    };
    let tolerance = (residual * config.relative_tolerance).max(config.min_tolerance);

    let Some((upper, upper_projection)) = search.bracket(residual, config)? else {
        warn!(
            "no contribution bracket for residual {residual:.2} within {} doublings",
            config.max_doublings
        );
        result.converged = false;
        result.unreachable = Some(UnreachableGoal::NoBracket);
        return Ok(result);
    };

    let mut lo = 0.0;
    let mut hi = upper;
    let mut hi_projection = upper_projection;
    let mut converged = hi_projection.future_value - residual <= tolerance;
    while !converged && result.iterations < config.max_iterations {
        result.iterations += 1;
        let mid = (lo + hi) * 0.5;
        // Smaller than a contribution that already projected, so this cannot overflow.
        let Some(projection) = search.projection_at(mid)? else {
            break;
        };
        if projection.future_value >= residual {
            hi = mid;
            hi_projection = projection;
        } else {
            lo = mid;
        }
        converged = hi_projection.future_value - residual <= tolerance;
    }

    debug!(
        "goal solver converged={converged} after {} iterations: contribution {hi:.4}",
        result.iterations
    );
    if !converged {
        warn!(
            "goal solver hit {} iterations before tolerance {tolerance:.4}; returning best estimate",
            config.max_iterations
        );
        result.unreachable = Some(UnreachableGoal::IterationCap);
    }
    result.converged = converged;
    result.required_periodic_contribution = hi;
    result.projection = Some(hi_projection);
    Ok(result)
}

struct ContributionSearch {
    template: ContributionSchedule,
    expected_return: f64,
}

impl ContributionSearch {
    /// `None` when the projection overflows `f64`.
    fn projection_at(&self, contribution: f64) -> Result<Option<ProjectionResult>> {
        let schedule = ContributionSchedule {
            base_amount: contribution,
            ..self.template
        };
        match project(&schedule, self.expected_return) {
            Ok(projection) => Ok(Some(projection)),
            Err(EngineError::Overflow { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Doubles a seed contribution until its projection reaches `residual`.
    fn bracket(
        &self,
        residual: f64,
        config: &GoalSolveConfig,
    ) -> Result<Option<(f64, ProjectionResult)>> {
        let periods = self.template.years * config.cadence.periods_per_year() as f64;
        let mut upper = residual / periods.max(1.0);
        let Some(mut projection) = self.projection_at(upper)? else {
            return Ok(None);
        };
        let mut doublings = 0;

        // Written as a negation so a NaN projection keeps searching instead of passing.
        while !(projection.future_value >= residual) {
            if doublings == config.max_doublings {
                return Ok(None);
            }
            upper *= 2.0;
            if !upper.is_finite() {
                return Ok(None);
            }
            let Some(next) = self.projection_at(upper)? else {
                return Ok(None);
            };
            projection = next;
            doublings += 1;
        }

        debug!("bracketed goal contribution in [0, {upper:.4}] after {doublings} doublings");
        Ok(Some((upper, projection)))
    }
}

fn validate_goal(goal: &Goal) -> Result<()> {
    require_non_negative("current_cost", goal.current_cost)?;
    require_rate("inflation_rate", goal.inflation_rate)?;
    require_rate("expected_return", goal.expected_return)?;
    require_rate("contribution_step_up", goal.contribution_step_up)?;
    require_non_negative("lumpsum_today", goal.lumpsum_today)?;
    Ok(())
}

fn validate_config(config: &GoalSolveConfig) -> Result<()> {
    require_non_negative("relative_tolerance", config.relative_tolerance)?;
    require_finite("min_tolerance", config.min_tolerance)?;
    if config.min_tolerance <= 0.0 {
        return Err(EngineError::invalid("min_tolerance must be > 0"));
    }
    if config.max_iterations == 0 {
        return Err(EngineError::invalid("max_iterations must be > 0"));
    }
    Ok(())
}
