use super::error::{
    EngineError, Result, require_non_negative, require_rate, require_representable,
};
use super::types::{ContributionSchedule, ProjectionResult, ProjectionYear, StepUp};

/// Upper bound on schedule length; keeps every projection a bounded loop.
pub const MAX_PROJECTION_YEARS: f64 = 1_000.0;

/// Absorbs representation error when `years * periods_per_year` should land on an integer.
const PERIOD_COUNT_SLACK: f64 = 1e-9;

/// Future value of a periodic schedule, compounding once per period.
///
/// Each period the contribution is added and the balance then grows by
/// `annual_rate / periods_per_year`. The step-up is applied to the running
/// per-period contribution at the start of every year after the first.
pub fn project(schedule: &ContributionSchedule, annual_rate: f64) -> Result<ProjectionResult> {
    validate_schedule(schedule)?;
    require_rate("annual_rate", annual_rate)?;
    walk_schedule(schedule, annual_rate, |_| {})
}

/// Same walk as [`project`], reported one row per year.
pub fn project_yearly(
    schedule: &ContributionSchedule,
    annual_rate: f64,
) -> Result<Vec<ProjectionYear>> {
    validate_schedule(schedule)?;
    require_rate("annual_rate", annual_rate)?;

    let mut rows = Vec::with_capacity(schedule.years.ceil() as usize);
    walk_schedule(schedule, annual_rate, |row| rows.push(row))?;
    Ok(rows)
}

pub fn project_lumpsum(principal: f64, annual_rate: f64, years: f64) -> Result<ProjectionResult> {
    require_non_negative("principal", principal)?;
    require_rate("annual_rate", annual_rate)?;
    require_years(years)?;

    // 0 * inf would be NaN once the growth factor overflows.
    let future_value = if principal == 0.0 {
        0.0
    } else {
        principal * (1.0 + annual_rate).powf(years)
    };
    require_representable("future_value", future_value)?;
    Ok(ProjectionResult::new(principal, future_value))
}

fn validate_schedule(schedule: &ContributionSchedule) -> Result<()> {
    require_non_negative("base_amount", schedule.base_amount)?;
    require_years(schedule.years)?;
    match schedule.step_up {
        Some(StepUp::Amount(amount)) => {
            require_non_negative("step_up amount", amount)?;
        }
        Some(StepUp::Percent(ratio)) => {
            require_rate("step_up percent", ratio)?;
        }
        None => {}
    }
    Ok(())
}

fn require_years(years: f64) -> Result<f64> {
    require_non_negative("years", years)?;
    if years > MAX_PROJECTION_YEARS {
        return Err(EngineError::OutOfRange {
            param: "years",
            message: "must be <= 1000",
            value: years,
        });
    }
    Ok(years)
}

fn total_periods(years: f64, periods_per_year: u32) -> u32 {
    (years * periods_per_year as f64 + PERIOD_COUNT_SLACK).floor() as u32
}

fn walk_schedule<F>(
    schedule: &ContributionSchedule,
    annual_rate: f64,
    mut on_year: F,
) -> Result<ProjectionResult>
where
    F: FnMut(ProjectionYear),
{
    let periods_per_year = schedule.periods_per_year.periods_per_year();
    let growth = 1.0 + annual_rate / periods_per_year as f64;
    let total = total_periods(schedule.years, periods_per_year);

    let mut contribution = schedule.base_amount;
    let mut accumulated = 0.0;
    let mut invested = 0.0;
    let mut elapsed = 0;
    let mut year = 0;

    while elapsed < total {
        if year > 0 {
            if let Some(step_up) = schedule.step_up {
                contribution = step_up.apply(contribution);
            }
        }

        let periods = periods_per_year.min(total - elapsed);
        for _ in 0..periods {
            accumulated = (accumulated + contribution) * growth;
            invested += contribution;
        }
        elapsed += periods;
        year += 1;

        on_year(ProjectionYear {
            year,
            periods,
            contribution_per_period: contribution,
            invested_to_date: invested,
            value_at_year_end: accumulated,
        });
    }

    require_representable("total_invested", invested)?;
    require_representable("future_value", accumulated)?;
    Ok(ProjectionResult::new(invested, accumulated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Cadence;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    fn assert_approx_tol(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn schedule(base_amount: f64, cadence: Cadence, years: f64) -> ContributionSchedule {
        ContributionSchedule {
            base_amount,
            periods_per_year: cadence,
            years,
            step_up: None,
        }
    }

    #[test]
    fn monthly_sip_over_ten_years_matches_reference_value() {
        let result = project(&ContributionSchedule::monthly(10_000.0, 10.0), 0.12).expect("valid");
        assert_eq!(result.total_invested, 1_200_000.0);
        assert_approx_tol(result.future_value, 2_323_391.0, 10.0);
        assert_approx_tol(result.total_returns, 1_123_391.0, 10.0);
        assert_eq!(
            result.total_returns,
            result.future_value - result.total_invested
        );
    }

    #[test]
    fn lumpsum_over_ten_years_matches_reference_value() {
        let result = project_lumpsum(100_000.0, 0.12, 10.0).expect("valid");
        assert_eq!(result.total_invested, 100_000.0);
        assert_approx_tol(result.future_value, 310_585.0, 5.0);
    }

    #[test]
    fn lumpsum_with_zero_years_returns_principal() {
        let result = project_lumpsum(42_500.0, 0.18, 0.0).expect("valid");
        assert_eq!(result.future_value, 42_500.0);
        assert_eq!(result.total_returns, 0.0);
    }

    #[test]
    fn zero_rate_adds_contributions_without_growth() {
        let sip = schedule(2_500.0, Cadence::Quarterly, 7.0).with_step_up(StepUp::Percent(0.07));
        let result = project(&sip, 0.0).expect("valid");
        assert_eq!(result.future_value, result.total_invested);
        assert_eq!(result.total_returns, 0.0);
    }

    #[test]
    fn amount_step_up_is_applied_once_per_completed_year() {
        let sip = schedule(1_000.0, Cadence::Annual, 3.0).with_step_up(StepUp::Amount(500.0));
        let result = project(&sip, 0.0).expect("valid");
        assert_eq!(result.total_invested, 1_000.0 + 1_500.0 + 2_000.0);
    }

    #[test]
    fn percent_step_up_raises_every_period_of_the_following_year() {
        let sip = ContributionSchedule::monthly(1_000.0, 2.0).with_step_up(StepUp::Percent(0.10));
        let result = project(&sip, 0.0).expect("valid");
        assert_approx_tol(result.total_invested, 12.0 * 1_000.0 + 12.0 * 1_100.0, 1e-6);
    }

    #[test]
    fn partial_final_year_contributes_leftover_periods() {
        let sip = ContributionSchedule::monthly(1_000.0, 1.5).with_step_up(StepUp::Percent(0.10));
        let result = project(&sip, 0.0).expect("valid");
        assert_approx_tol(result.total_invested, 12.0 * 1_000.0 + 6.0 * 1_100.0, 1e-6);

        let rows = project_yearly(&sip, 0.0).expect("valid");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].periods, 6);
    }

    #[test]
    fn fractional_periods_are_truncated() {
        let result = project(&schedule(100.0, Cadence::Quarterly, 1.6), 0.0).expect("valid");
        assert_eq!(result.total_invested, 600.0);
    }

    #[test]
    fn zero_base_amount_projects_to_zero() {
        let result = project(&ContributionSchedule::monthly(0.0, 25.0), 0.30).expect("valid");
        assert_eq!(result.total_invested, 0.0);
        assert_eq!(result.future_value, 0.0);
    }

    #[test]
    fn yearly_rows_end_at_projected_value() {
        let sip = ContributionSchedule::monthly(5_000.0, 12.0).with_step_up(StepUp::Percent(0.05));
        let total = project(&sip, 0.11).expect("valid");
        let rows = project_yearly(&sip, 0.11).expect("valid");
        assert_eq!(rows.len(), 12);
        let last = rows.last().expect("rows");
        assert_eq!(last.value_at_year_end, total.future_value);
        assert_eq!(last.invested_to_date, total.total_invested);
        assert_approx_tol(rows[1].contribution_per_period, 5_250.0, 1e-9);
    }

    #[test]
    fn unsupported_cadence_is_rejected() {
        let err = Cadence::try_from(3).expect_err("3 periods per year is not offered");
        assert_eq!(err, EngineError::UnsupportedCadence(3));
        assert_eq!(Cadence::try_from(12), Ok(Cadence::Monthly));
    }

    #[test]
    fn invalid_inputs_are_rejected_before_projecting() {
        assert!(project(&ContributionSchedule::monthly(1_000.0, -1.0), 0.1).is_err());
        assert!(project(&ContributionSchedule::monthly(-5.0, 1.0), 0.1).is_err());
        assert!(project(&ContributionSchedule::monthly(1_000.0, 1.0), -1.5).is_err());
        assert!(project(&ContributionSchedule::monthly(f64::NAN, 1.0), 0.1).is_err());
        assert!(project(&ContributionSchedule::monthly(1_000.0, 5_000.0), 0.1).is_err());
        assert!(project_lumpsum(1_000.0, 0.1, f64::INFINITY).is_err());
        assert!(project_lumpsum(-1.0, 0.1, 2.0).is_err());

        let negative_step = ContributionSchedule::monthly(1_000.0, 2.0)
            .with_step_up(StepUp::Amount(-10.0));
        assert!(project(&negative_step, 0.1).is_err());
    }

    #[test]
    fn runaway_step_up_is_rejected_instead_of_returning_nan() {
        let sip = schedule(1_000.0, Cadence::Annual, 3.0).with_step_up(StepUp::Percent(1e300));
        let err = project(&sip, 0.0).expect_err("contributions overflow");
        assert!(matches!(err, EngineError::Overflow { param: "total_invested", .. }));
        assert!(project_yearly(&sip, 0.0).is_err());
    }

    #[test]
    fn overflowing_growth_is_rejected() {
        let err = project_lumpsum(1.0, 10.0, 400.0).expect_err("growth overflows");
        assert!(matches!(err, EngineError::Overflow { param: "future_value", .. }));

        let sip = ContributionSchedule::monthly(1.0, 400.0);
        assert!(matches!(
            project(&sip, 10.0),
            Err(EngineError::Overflow { param: "future_value", .. })
        ));
    }

    #[test]
    fn zero_principal_stays_zero_under_overflowing_growth() {
        let result = project_lumpsum(0.0, 10.0, 400.0).expect("valid");
        assert_eq!(result.future_value, 0.0);
    }

    #[test]
    fn total_loss_rate_is_accepted() {
        let result = project_lumpsum(1_000.0, -1.0, 3.0).expect("valid");
        assert_eq!(result.future_value, 0.0);
        assert_eq!(result.total_returns, -1_000.0);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_zero_rate_future_value_equals_invested(
            base in 0u32..100_000,
            years_tenths in 0u32..400,
            cadence_idx in 0usize..4,
            step_bp in 0u32..3_000,
            step_is_amount in proptest::bool::ANY
        ) {
            let cadence = [Cadence::Annual, Cadence::HalfYearly, Cadence::Quarterly, Cadence::Monthly][cadence_idx];
            let step_up = if step_is_amount {
                StepUp::Amount(step_bp as f64)
            } else {
                StepUp::Percent(step_bp as f64 / 10_000.0)
            };
            let sip = schedule(base as f64, cadence, years_tenths as f64 / 10.0).with_step_up(step_up);
            let result = project(&sip, 0.0).expect("valid");
            prop_assert_eq!(result.future_value, result.total_invested);
        }

        #[test]
        fn prop_future_value_increases_with_base_amount(
            base in 1u32..50_000,
            extra in 1u32..50_000,
            years in 1u32..40,
            rate_bp in -5_000i32..3_000
        ) {
            let rate = rate_bp as f64 / 10_000.0;
            let low = project(&ContributionSchedule::monthly(base as f64, years as f64), rate).expect("valid");
            let high = project(&ContributionSchedule::monthly((base + extra) as f64, years as f64), rate).expect("valid");
            prop_assert!(high.future_value > low.future_value);
        }

        #[test]
        fn prop_future_value_increases_with_rate(
            base in 1u32..50_000,
            years in 1u32..40,
            rate_bp in -9_000i32..3_000,
            bump_bp in 1i32..500
        ) {
            let sip = ContributionSchedule::monthly(base as f64, years as f64)
                .with_step_up(StepUp::Percent(0.05));
            let low = project(&sip, rate_bp as f64 / 10_000.0).expect("valid");
            let high = project(&sip, (rate_bp + bump_bp) as f64 / 10_000.0).expect("valid");
            prop_assert!(high.future_value > low.future_value);

            let lump_low = project_lumpsum(base as f64, rate_bp as f64 / 10_000.0, years as f64).expect("valid");
            let lump_high = project_lumpsum(base as f64, (rate_bp + bump_bp) as f64 / 10_000.0, years as f64).expect("valid");
            prop_assert!(lump_high.future_value > lump_low.future_value);
        }

        #[test]
        fn prop_future_value_increases_with_years(
            base in 1u32..50_000,
            years in 0u32..40,
            rate_bp in 0i32..3_000
        ) {
            let rate = rate_bp as f64 / 10_000.0;
            let shorter = project(&ContributionSchedule::monthly(base as f64, years as f64), rate).expect("valid");
            let longer = project(&ContributionSchedule::monthly(base as f64, (years + 1) as f64), rate).expect("valid");
            prop_assert!(longer.future_value > shorter.future_value);
        }
    }
}
