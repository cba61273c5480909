use serde::Serialize;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FixedHorizonMode {
    /// First-year amount escalated by `withdrawal_growth_rate` every year.
    #[default]
    GrowingAnnuity,
    /// `withdrawal_rate` re-applied to the carried balance every year.
    SelfCorrecting,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DepletionMode {
    #[default]
    PercentOfBalance,
    LevelAmount,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionParameters {
    pub current_age: u32,
    pub retirement_age: u32,
    pub life_expectancy_age: u32,
    pub principal: f64,
    pub annual_return_rate: f64,
    pub inflation_rate: f64,
    pub withdrawal_rate: f64,
    pub withdrawal_growth_rate: f64,
    pub max_projection_years: u32,
    pub min_withdrawal_floor: f64,
}

impl Default for ProjectionParameters {
    fn default() -> Self {
        Self {
            current_age: 45,
            retirement_age: 65,
            life_expectancy_age: 90,
            principal: 1_000_000.0,
            annual_return_rate: 0.07,
            inflation_rate: 0.0,
            withdrawal_rate: 0.04,
            withdrawal_growth_rate: 0.03,
            max_projection_years: 50,
            min_withdrawal_floor: 10.0,
        }
    }
}

impl ProjectionParameters {
    pub fn real_return(&self) -> f64 {
        self.annual_return_rate - self.inflation_rate
    }

    pub fn years_to_retirement(&self) -> u32 {
        self.retirement_age.saturating_sub(self.current_age)
    }

    pub fn retirement_years(&self) -> u32 {
        self.life_expectancy_age.saturating_sub(self.retirement_age)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionResult {
    pub ages: Vec<u32>,
    pub balances: Vec<f64>,
    pub withdrawals: Vec<f64>,
    pub depletion_age: Option<u32>,
}

impl ProjectionResult {
    pub(crate) fn with_capacity(years: usize) -> Self {
        Self {
            ages: Vec::with_capacity(years),
            balances: Vec::with_capacity(years),
            withdrawals: Vec::with_capacity(years),
            depletion_age: None,
        }
    }

    pub fn len(&self) -> usize {
        self.ages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ages.is_empty()
    }

    pub fn final_balance(&self) -> Option<f64> {
        self.balances.last().copied()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedHorizonProjection {
    pub years_to_retirement: u32,
    pub value_at_retirement: f64,
    /// `value_at_retirement` deflated to today's money at the inflation rate.
    pub value_at_retirement_real: f64,
    pub result: ProjectionResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StochasticConfig {
    pub run_count: u32,
    pub volatility: f64,
    pub seed: u64,
}

impl Default for StochasticConfig {
    fn default() -> Self {
        Self {
            run_count: 1_000,
            volatility: 0.12,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StochasticResult {
    pub ages: Vec<u32>,
    /// One balance path per run, each `ages.len()` long.
    pub runs: Vec<Vec<f64>>,
    pub depletion_ages: Vec<Option<u32>>,
    pub median_balances: Vec<f64>,
    pub p10_balances: Vec<f64>,
    pub p90_balances: Vec<f64>,
    pub success_rate: f64,
}

impl StochasticResult {
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Longevity {
    Sustainable,
    #[serde(rename_all = "camelCase")]
    Depleted { at_age: u32 },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionSummary {
    pub value_at_retirement: Option<f64>,
    pub first_year_withdrawal: f64,
    pub monthly_income: f64,
    pub total_withdrawn: f64,
    pub final_balance: f64,
    pub years_projected: usize,
    pub longevity: Longevity,
}
