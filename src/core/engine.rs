use log::debug;

use super::error::{ProjectionError, ProjectionOutcome};
use super::growth::{check_compounding_rate, check_finite_amount, future_value, present_value};
use super::types::{
    DepletionMode, FixedHorizonMode, FixedHorizonProjection, Longevity, ProjectionParameters,
    ProjectionResult, ProjectionSummary,
};

pub(crate) const MAX_AGE: u32 = 150;
pub(crate) const MAX_PROJECTION_YEARS: u32 = 150;

impl ProjectionResult {
    fn push_year(&mut self, age: u32, withdrawal: f64, balance: f64) {
        self.ages.push(age);
        self.withdrawals.push(withdrawal);
        self.balances.push(balance);
    }
}

pub fn project_fixed_horizon(
    params: &ProjectionParameters,
    mode: FixedHorizonMode,
) -> ProjectionOutcome<FixedHorizonProjection> {
    if params.life_expectancy_age <= params.retirement_age {
        return Err(ProjectionError::InvalidHorizon {
            retirement_age: params.retirement_age,
            life_expectancy_age: params.life_expectancy_age,
        });
    }
    validate_parameters(params)?;

    let years_to_retirement = params.years_to_retirement();
    let value_at_retirement =
        future_value(params.principal, params.annual_return_rate, years_to_retirement)?;
    let value_at_retirement_real =
        present_value(value_at_retirement, params.inflation_rate, years_to_retirement)?;

    let horizon = params.retirement_years();
    let real_return = params.real_return();
    let first_withdrawal = value_at_retirement * params.withdrawal_rate;
    let mut result = ProjectionResult::with_capacity(horizon as usize);
    let mut balance = value_at_retirement;

    for year in 0..horizon {
        let age = params.retirement_age + year;
        let scheduled = match mode {
            FixedHorizonMode::GrowingAnnuity => {
                escalate(first_withdrawal, params.withdrawal_growth_rate, year)
            }
            FixedHorizonMode::SelfCorrecting => balance * params.withdrawal_rate,
        };
        let scheduled = check_finite_amount("withdrawal", scheduled)?;
        if scheduled < params.min_withdrawal_floor {
            debug!(
                "fixed horizon stopped at age {age}: withdrawal {scheduled:.2} below floor {:.2}",
                params.min_withdrawal_floor
            );
            break;
        }

        let withdrawal = scheduled.min(balance);
        balance = carry_forward(balance, withdrawal, real_return)?;
        result.push_year(age, withdrawal, balance);

        if balance <= 0.0 {
            debug!("fixed horizon depleted at age {age}");
            result.depletion_age = Some(age);
            push_zero_tail(&mut result, age + 1, params.life_expectancy_age);
            break;
        }
    }

    Ok(FixedHorizonProjection {
        years_to_retirement,
        value_at_retirement,
        value_at_retirement_real,
        result,
    })
}

pub fn simulate_depletion(
    params: &ProjectionParameters,
    mode: DepletionMode,
) -> ProjectionOutcome<ProjectionResult> {
    validate_parameters(params)?;
    let annual_return = params.annual_return_rate;
    run_depletion_path(params, mode, |_| annual_return)
}

/// Open-horizon loop shared by the deterministic and stochastic simulators.
/// `annual_return` is asked for the return of each simulated year, in order.
pub(crate) fn run_depletion_path<F>(
    params: &ProjectionParameters,
    mode: DepletionMode,
    mut annual_return: F,
) -> ProjectionOutcome<ProjectionResult>
where
    F: FnMut(u32) -> f64,
{
    let years = params.max_projection_years;
    let level_withdrawal = params.principal * params.withdrawal_rate;
    let mut result = ProjectionResult::with_capacity(years as usize);
    let mut balance = params.principal;

    for year in 0..years {
        let age = params.retirement_age + year;
        let scheduled = match mode {
            DepletionMode::PercentOfBalance => balance * params.withdrawal_rate,
            DepletionMode::LevelAmount => {
                escalate(level_withdrawal, params.withdrawal_growth_rate, year)
            }
        };
        let scheduled = check_finite_amount("withdrawal", scheduled)?;
        if scheduled < params.min_withdrawal_floor {
            debug!(
                "depletion run stopped at age {age}: withdrawal {scheduled:.2} below floor {:.2}",
                params.min_withdrawal_floor
            );
            break;
        }

        let withdrawal = scheduled.min(balance);
        balance = carry_forward(balance, withdrawal, annual_return(year))?;
        result.push_year(age, withdrawal, balance);

        if balance <= 0.0 {
            result.depletion_age = Some(age);
            break;
        }
    }

    Ok(result)
}

pub fn assess_longevity(result: &ProjectionResult) -> Longevity {
    match result.depletion_age {
        None => Longevity::Sustainable,
        Some(at_age) => Longevity::Depleted { at_age },
    }
}

/// Report figures for a single projection. `starting_balance` stands in for the
/// final balance when the run was cut before its first year.
pub fn summarize(
    result: &ProjectionResult,
    starting_balance: f64,
    value_at_retirement: Option<f64>,
) -> ProjectionSummary {
    let first_year_withdrawal = result.withdrawals.first().copied().unwrap_or(0.0);
    ProjectionSummary {
        value_at_retirement,
        first_year_withdrawal,
        monthly_income: first_year_withdrawal / 12.0,
        total_withdrawn: result.withdrawals.iter().sum(),
        final_balance: result.final_balance().unwrap_or(starting_balance),
        years_projected: result.len(),
        longevity: assess_longevity(result),
    }
}

pub(crate) fn validate_parameters(params: &ProjectionParameters) -> ProjectionOutcome<()> {
    for (field, age) in [
        ("current_age", params.current_age),
        ("retirement_age", params.retirement_age),
        ("life_expectancy_age", params.life_expectancy_age),
    ] {
        if age > MAX_AGE {
            return Err(ProjectionError::InvalidInput {
                field,
                reason: format!("{age} must be at most {MAX_AGE}"),
            });
        }
    }

    if params.retirement_age <= params.current_age {
        return Err(ProjectionError::InvalidInput {
            field: "retirement_age",
            reason: format!(
                "{} must be greater than current age {}",
                params.retirement_age, params.current_age
            ),
        });
    }

    if !params.principal.is_finite() || params.principal < 0.0 {
        return Err(ProjectionError::InvalidInput {
            field: "principal",
            reason: format!("{} must be a finite amount >= 0", params.principal),
        });
    }

    check_compounding_rate("annual_return_rate", params.annual_return_rate)?;
    check_compounding_rate("inflation_rate", params.inflation_rate)?;
    check_compounding_rate("real_return", params.real_return())?;
    check_compounding_rate("withdrawal_growth_rate", params.withdrawal_growth_rate)?;

    if !(0.0..=1.0).contains(&params.withdrawal_rate) {
        return Err(ProjectionError::InvalidRate {
            field: "withdrawal_rate",
            value: params.withdrawal_rate,
            reason: "must be between 0 and 100%",
        });
    }

    if params.max_projection_years == 0 || params.max_projection_years > MAX_PROJECTION_YEARS {
        return Err(ProjectionError::InvalidInput {
            field: "max_projection_years",
            reason: format!(
                "{} must be between 1 and {MAX_PROJECTION_YEARS}",
                params.max_projection_years
            ),
        });
    }

    if !params.min_withdrawal_floor.is_finite() || params.min_withdrawal_floor < 0.0 {
        return Err(ProjectionError::InvalidInput {
            field: "min_withdrawal_floor",
            reason: format!("{} must be a finite amount >= 0", params.min_withdrawal_floor),
        });
    }

    Ok(())
}

// Clamp before any depletion check so a depleted year never reports a negative balance.
// Checked before the clamp: `max(0.0)` maps NaN to zero.
fn carry_forward(balance: f64, withdrawal: f64, annual_return: f64) -> ProjectionOutcome<f64> {
    let carried = check_finite_amount("balance", (balance - withdrawal) * (1.0 + annual_return))?;
    Ok(carried.max(0.0))
}

// A zero first-year amount stays zero however far the growth factor runs.
fn escalate(first_amount: f64, growth_rate: f64, year: u32) -> f64 {
    if first_amount == 0.0 {
        0.0
    } else {
        first_amount * (1.0 + growth_rate).powi(year as i32)
    }
}

fn push_zero_tail(result: &mut ProjectionResult, start_age: u32, end_age: u32) {
    for age in start_age..end_age {
        result.push_year(age, 0.0, 0.0);
    }
}
