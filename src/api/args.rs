use clap::{Args, ValueEnum};
use serde::Deserialize;

use crate::core::{
    DepletionMode, FixedHorizonMode, ProjectionParameters, RateSolveConfig, StochasticConfig,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliFixedHorizonMode {
    GrowingAnnuity,
    SelfCorrecting,
}

impl From<CliFixedHorizonMode> for FixedHorizonMode {
    fn from(value: CliFixedHorizonMode) -> Self {
        match value {
            CliFixedHorizonMode::GrowingAnnuity => FixedHorizonMode::GrowingAnnuity,
            CliFixedHorizonMode::SelfCorrecting => FixedHorizonMode::SelfCorrecting,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliDepletionMode {
    PercentOfBalance,
    LevelAmount,
}

impl From<CliDepletionMode> for DepletionMode {
    fn from(value: CliDepletionMode) -> Self {
        match value {
            CliDepletionMode::PercentOfBalance => DepletionMode::PercentOfBalance,
            CliDepletionMode::LevelAmount => DepletionMode::LevelAmount,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiFixedHorizonMode {
    #[serde(alias = "growingAnnuity", alias = "growing_annuity", alias = "growing")]
    GrowingAnnuity,
    #[serde(alias = "selfCorrecting", alias = "self_correcting")]
    SelfCorrecting,
}

impl From<ApiFixedHorizonMode> for CliFixedHorizonMode {
    fn from(value: ApiFixedHorizonMode) -> Self {
        match value {
            ApiFixedHorizonMode::GrowingAnnuity => CliFixedHorizonMode::GrowingAnnuity,
            ApiFixedHorizonMode::SelfCorrecting => CliFixedHorizonMode::SelfCorrecting,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiDepletionMode {
    #[serde(alias = "percentOfBalance", alias = "percent_of_balance", alias = "percent")]
    PercentOfBalance,
    #[serde(alias = "levelAmount", alias = "level_amount", alias = "level")]
    LevelAmount,
}

impl From<ApiDepletionMode> for CliDepletionMode {
    fn from(value: ApiDepletionMode) -> Self {
        match value {
            ApiDepletionMode::PercentOfBalance => CliDepletionMode::PercentOfBalance,
            ApiDepletionMode::LevelAmount => CliDepletionMode::LevelAmount,
        }
    }
}

/// Rates are entered in percent, the way the calculator sliders show them.
#[derive(Args, Debug, Clone)]
pub struct ProjectionArgs {
    #[arg(long, default_value_t = 45)]
    pub current_age: u32,
    #[arg(long, default_value_t = 65)]
    pub retirement_age: u32,
    #[arg(long, default_value_t = 90, help = "Age to fund through (fixed horizon)")]
    pub life_expectancy_age: u32,
    #[arg(
        long,
        default_value_t = 1_000_000.0,
        help = "Current savings, or the lump sum invested at retirement"
    )]
    pub principal: f64,
    #[arg(long, default_value_t = 7.0, help = "Expected annual return in percent")]
    pub annual_return: f64,
    #[arg(long, default_value_t = 0.0, help = "Expected annual inflation in percent")]
    pub inflation: f64,
    #[arg(long, default_value_t = 4.0, help = "Annual withdrawal rate in percent")]
    pub withdrawal_rate: f64,
    #[arg(
        long,
        default_value_t = 3.0,
        help = "Annual growth of the withdrawal amount in percent"
    )]
    pub withdrawal_growth: f64,
    #[arg(long, default_value_t = 50, help = "Longest horizon to simulate in years")]
    pub max_years: u32,
    #[arg(
        long,
        default_value_t = 10.0,
        help = "Withdrawals below this amount end the projection"
    )]
    pub min_withdrawal: f64,
}

impl Default for ProjectionArgs {
    fn default() -> Self {
        Self {
            current_age: 45,
            retirement_age: 65,
            life_expectancy_age: 90,
            principal: 1_000_000.0,
            annual_return: 7.0,
            inflation: 0.0,
            withdrawal_rate: 4.0,
            withdrawal_growth: 3.0,
            max_years: 50,
            min_withdrawal: 10.0,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct FixedHorizonArgs {
    #[command(flatten)]
    pub projection: ProjectionArgs,
    #[arg(long, value_enum, default_value_t = CliFixedHorizonMode::GrowingAnnuity)]
    pub mode: CliFixedHorizonMode,
}

#[derive(Args, Debug, Clone)]
pub struct LivingAnnuityArgs {
    #[command(flatten)]
    pub projection: ProjectionArgs,
    #[arg(long, value_enum, default_value_t = CliDepletionMode::PercentOfBalance)]
    pub mode: CliDepletionMode,
}

#[derive(Args, Debug, Clone)]
pub struct MonteCarloArgs {
    #[command(flatten)]
    pub annuity: LivingAnnuityArgs,
    #[arg(long, default_value_t = 1_000)]
    pub runs: u32,
    #[arg(long, default_value_t = 12.0, help = "Annual return volatility in percent")]
    pub volatility: f64,
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
    #[arg(long, help = "Include every run's balance path in the output")]
    pub include_runs: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SolveRateArgs {
    #[command(flatten)]
    pub projection: ProjectionArgs,
    #[arg(long, value_enum, default_value_t = CliDepletionMode::LevelAmount)]
    pub mode: CliDepletionMode,
    #[arg(long, default_value_t = 12.0, help = "Annual return volatility in percent")]
    pub volatility: f64,
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
    #[arg(
        long,
        default_value_t = 90.0,
        help = "Required share of non-depleting runs in percent"
    )]
    pub target_success: f64,
    #[arg(long, default_value_t = 0.5, help = "Lowest withdrawal rate to try in percent")]
    pub search_min: f64,
    #[arg(long, default_value_t = 17.5, help = "Highest withdrawal rate to try in percent")]
    pub search_max: f64,
    #[arg(long, default_value_t = 0.01, help = "Rate tolerance in percentage points")]
    pub tolerance: f64,
    #[arg(long, default_value_t = 30)]
    pub max_iterations: u32,
    #[arg(long, default_value_t = 500)]
    pub runs_per_iteration: u32,
    #[arg(long, default_value_t = 2_000)]
    pub final_runs: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectionPayload {
    current_age: Option<u32>,
    retirement_age: Option<u32>,
    life_expectancy_age: Option<u32>,
    principal: Option<f64>,
    annual_return: Option<f64>,
    inflation: Option<f64>,
    withdrawal_rate: Option<f64>,
    withdrawal_growth: Option<f64>,
    max_years: Option<u32>,
    min_withdrawal: Option<f64>,

    fixed_horizon_mode: Option<ApiFixedHorizonMode>,
    depletion_mode: Option<ApiDepletionMode>,

    runs: Option<u32>,
    volatility: Option<f64>,
    seed: Option<u64>,
    include_runs: Option<bool>,

    target_success: Option<f64>,
    search_min: Option<f64>,
    search_max: Option<f64>,
    tolerance: Option<f64>,
    max_iterations: Option<u32>,
    runs_per_iteration: Option<u32>,
    final_runs: Option<u32>,
}

pub fn build_parameters(args: &ProjectionArgs) -> Result<ProjectionParameters, String> {
    if args.retirement_age <= args.current_age {
        return Err("--retirement-age must be > --current-age".to_string());
    }

    if !args.principal.is_finite() || args.principal < 0.0 {
        return Err("--principal must be >= 0".to_string());
    }

    if !(0.0..=100.0).contains(&args.withdrawal_rate) {
        return Err("--withdrawal-rate must be between 0 and 100".to_string());
    }

    for (name, rate) in [
        ("--annual-return", args.annual_return),
        ("--inflation", args.inflation),
        ("--withdrawal-growth", args.withdrawal_growth),
    ] {
        if !rate.is_finite() || rate <= -100.0 {
            return Err(format!("{name} must be > -100"));
        }
    }

    if args.max_years == 0 {
        return Err("--max-years must be > 0".to_string());
    }

    if !args.min_withdrawal.is_finite() || args.min_withdrawal < 0.0 {
        return Err("--min-withdrawal must be >= 0".to_string());
    }

    Ok(ProjectionParameters {
        current_age: args.current_age,
        retirement_age: args.retirement_age,
        life_expectancy_age: args.life_expectancy_age,
        principal: args.principal,
        annual_return_rate: args.annual_return / 100.0,
        inflation_rate: args.inflation / 100.0,
        withdrawal_rate: args.withdrawal_rate / 100.0,
        withdrawal_growth_rate: args.withdrawal_growth / 100.0,
        max_projection_years: args.max_years,
        min_withdrawal_floor: args.min_withdrawal,
    })
}

pub fn build_stochastic_config(args: &MonteCarloArgs) -> Result<StochasticConfig, String> {
    if args.runs == 0 {
        return Err("--runs must be > 0".to_string());
    }
    if !args.volatility.is_finite() || args.volatility < 0.0 {
        return Err("--volatility must be >= 0".to_string());
    }
    Ok(StochasticConfig {
        run_count: args.runs,
        volatility: args.volatility / 100.0,
        seed: args.seed,
    })
}

pub fn build_solve_config(args: &SolveRateArgs) -> Result<RateSolveConfig, String> {
    if !(0.0..=100.0).contains(&args.target_success) {
        return Err("--target-success must be between 0 and 100".to_string());
    }
    if args.search_max <= args.search_min {
        return Err("--search-max must be > --search-min".to_string());
    }
    if !args.volatility.is_finite() || args.volatility < 0.0 {
        return Err("--volatility must be >= 0".to_string());
    }
    Ok(RateSolveConfig {
        target_success_rate: args.target_success / 100.0,
        search_min: args.search_min / 100.0,
        search_max: args.search_max / 100.0,
        tolerance: args.tolerance / 100.0,
        max_iterations: args.max_iterations,
        runs_per_iteration: args.runs_per_iteration,
        final_runs: args.final_runs,
        volatility: args.volatility / 100.0,
        seed: args.seed,
    })
}

impl ProjectionPayload {
    fn projection_args(&self) -> ProjectionArgs {
        let mut args = ProjectionArgs::default();
        if let Some(v) = self.current_age {
            args.current_age = v;
        }
        if let Some(v) = self.retirement_age {
            args.retirement_age = v;
        }
        if let Some(v) = self.life_expectancy_age {
            args.life_expectancy_age = v;
        }
        if let Some(v) = self.principal {
            args.principal = v;
        }
        if let Some(v) = self.annual_return {
            args.annual_return = v;
        }
        if let Some(v) = self.inflation {
            args.inflation = v;
        }
        if let Some(v) = self.withdrawal_rate {
            args.withdrawal_rate = v;
        }
        if let Some(v) = self.withdrawal_growth {
            args.withdrawal_growth = v;
        }
        if let Some(v) = self.max_years {
            args.max_years = v;
        }
        if let Some(v) = self.min_withdrawal {
            args.min_withdrawal = v;
        }
        args
    }

    pub fn fixed_horizon_args(&self) -> FixedHorizonArgs {
        FixedHorizonArgs {
            projection: self.projection_args(),
            mode: self
                .fixed_horizon_mode
                .map(Into::into)
                .unwrap_or(CliFixedHorizonMode::GrowingAnnuity),
        }
    }

    pub fn living_annuity_args(&self) -> LivingAnnuityArgs {
        LivingAnnuityArgs {
            projection: self.projection_args(),
            mode: self
                .depletion_mode
                .map(Into::into)
                .unwrap_or(CliDepletionMode::PercentOfBalance),
        }
    }

    pub fn monte_carlo_args(&self) -> MonteCarloArgs {
        MonteCarloArgs {
            annuity: self.living_annuity_args(),
            runs: self.runs.unwrap_or(1_000),
            volatility: self.volatility.unwrap_or(12.0),
            seed: self.seed.unwrap_or(42),
            include_runs: self.include_runs.unwrap_or(false),
        }
    }

    pub fn solve_rate_args(&self) -> SolveRateArgs {
        SolveRateArgs {
            projection: self.projection_args(),
            mode: self
                .depletion_mode
                .map(Into::into)
                .unwrap_or(CliDepletionMode::LevelAmount),
            volatility: self.volatility.unwrap_or(12.0),
            seed: self.seed.unwrap_or(42),
            target_success: self.target_success.unwrap_or(90.0),
            search_min: self.search_min.unwrap_or(0.5),
            search_max: self.search_max.unwrap_or(17.5),
            tolerance: self.tolerance.unwrap_or(0.01),
            max_iterations: self.max_iterations.unwrap_or(30),
            runs_per_iteration: self.runs_per_iteration.unwrap_or(500),
            final_runs: self.final_runs.unwrap_or(2_000),
        }
    }
}
