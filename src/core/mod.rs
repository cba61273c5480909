mod engine;
mod error;
mod growth;
mod solver;
mod stochastic;
mod types;

pub use engine::{assess_longevity, project_fixed_horizon, simulate_depletion, summarize};
pub use error::{ProjectionError, ProjectionOutcome};
pub use growth::{future_value, present_value};
pub use solver::{RateSolveConfig, RateSolveIteration, RateSolveResult, solve_withdrawal_rate};
pub use stochastic::simulate_stochastic;
pub use types::{
    DepletionMode, FixedHorizonMode, FixedHorizonProjection, Longevity, ProjectionParameters,
    ProjectionResult, ProjectionSummary, StochasticConfig, StochasticResult,
};
