use log::debug;
use serde::Serialize;

use super::error::{ProjectionError, ProjectionOutcome};
use super::stochastic::simulate_stochastic;
use super::types::{DepletionMode, ProjectionParameters, StochasticConfig};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateSolveConfig {
    pub target_success_rate: f64,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
    pub runs_per_iteration: u32,
    pub final_runs: u32,
    pub volatility: f64,
    pub seed: u64,
}

impl Default for RateSolveConfig {
    fn default() -> Self {
        Self {
            target_success_rate: 0.90,
            search_min: 0.005,
            search_max: 0.175,
            tolerance: 0.0001,
            max_iterations: 30,
            runs_per_iteration: 500,
            final_runs: 2_000,
            volatility: 0.12,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateSolveIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_rate: f64,
    pub success_rate: f64,
    pub success_ci_half_width: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateSolveResult {
    pub config: RateSolveConfig,
    pub mode: DepletionMode,
    pub solved_rate: Option<f64>,
    pub first_year_withdrawal: Option<f64>,
    pub achieved_success_rate: Option<f64>,
    pub achieved_success_ci_half_width: Option<f64>,
    pub iterations: Vec<RateSolveIteration>,
    pub converged: bool,
    pub feasible: bool,
    pub message: String,
}

/// Highest withdrawal rate whose share of non-depleting runs still meets
/// `target_success_rate`. Every candidate reuses the same seed, so the
/// comparison between rates is not blurred by sampling noise.
pub fn solve_withdrawal_rate(
    params: &ProjectionParameters,
    mode: DepletionMode,
    config: RateSolveConfig,
) -> ProjectionOutcome<RateSolveResult> {
    validate_config(config)?;

    let mut iterations = Vec::with_capacity(config.max_iterations as usize);
    let low_eval = evaluate_candidate(params, mode, config, config.search_min, None)?;
    let high_eval = evaluate_candidate(params, mode, config, config.search_max, None)?;

    let mut solved_rate = None;
    let mut converged = false;
    let feasible;
    let message;

    if low_eval.success_rate + 1e-12 < config.target_success_rate {
        feasible = false;
        message = "No feasible withdrawal rate found within the search bounds.".to_string();
    } else if high_eval.success_rate + 1e-12 >= config.target_success_rate {
        solved_rate = Some(config.search_max);
        converged = true;
        feasible = true;
        message = "Upper withdrawal rate bound is still feasible; increase search max for a higher rate."
            .to_string();
    } else {
        let mut lo = config.search_min;
        let mut hi = config.search_max;
        let mut it = 0;
        while it < config.max_iterations {
            it += 1;
            let mid = (lo + hi) * 0.5;
            let eval = evaluate_candidate(params, mode, config, mid, None)?;
            iterations.push(RateSolveIteration {
                iteration: it,
                lower_bound: lo,
                upper_bound: hi,
                candidate_rate: mid,
                success_rate: eval.success_rate,
                success_ci_half_width: eval.success_ci_half_width,
            });

            if eval.success_rate + 1e-12 >= config.target_success_rate {
                lo = mid;
            } else {
                hi = mid;
            }

            if (hi - lo).abs() <= config.tolerance {
                converged = true;
                solved_rate = Some(lo);
                break;
            }
        }
        if solved_rate.is_none() {
            solved_rate = Some(lo);
        }
        feasible = true;
        message = if converged {
            "Solved maximum sustainable withdrawal rate.".to_string()
        } else {
            "Reached max iterations before tolerance was met; returning best estimate.".to_string()
        };
    }
    debug!(
        "withdrawal rate solve finished after {} iterations: {message}",
        iterations.len()
    );

    let mut achieved_success_rate = None;
    let mut achieved_success_ci_half_width = None;
    if let Some(rate) = solved_rate {
        let final_eval = evaluate_candidate(params, mode, config, rate, Some(config.final_runs))?;
        achieved_success_rate = Some(final_eval.success_rate);
        achieved_success_ci_half_width = Some(final_eval.success_ci_half_width);
    }

    Ok(RateSolveResult {
        config,
        mode,
        solved_rate,
        first_year_withdrawal: solved_rate.map(|rate| params.principal * rate),
        achieved_success_rate,
        achieved_success_ci_half_width,
        iterations,
        converged,
        feasible,
        message,
    })
}

#[derive(Debug, Clone, Copy)]
struct CandidateEval {
    success_rate: f64,
    success_ci_half_width: f64,
}

fn evaluate_candidate(
    base_params: &ProjectionParameters,
    mode: DepletionMode,
    config: RateSolveConfig,
    candidate_rate: f64,
    run_count: Option<u32>,
) -> ProjectionOutcome<CandidateEval> {
    let params = ProjectionParameters {
        withdrawal_rate: candidate_rate,
        ..base_params.clone()
    };
    let run_count = run_count.unwrap_or(config.runs_per_iteration);
    let stochastic = StochasticConfig {
        run_count,
        volatility: config.volatility,
        seed: config.seed,
    };

    let result = simulate_stochastic(&params, mode, stochastic)?;
    Ok(CandidateEval {
        success_rate: result.success_rate,
        success_ci_half_width: binomial_ci_half_width(result.success_rate, run_count),
    })
}

fn binomial_ci_half_width(p: f64, n: u32) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = p.clamp(0.0, 1.0);
    1.96 * (p * (1.0 - p) / n as f64).sqrt()
}

fn validate_config(config: RateSolveConfig) -> ProjectionOutcome<()> {
    let invalid = |msg: &str| Err(ProjectionError::InvalidSimulationConfig(msg.to_string()));

    if !(0.0..=1.0).contains(&config.target_success_rate) {
        return invalid("target_success_rate must be between 0 and 1");
    }
    if !(0.0..=1.0).contains(&config.search_min) || !(0.0..=1.0).contains(&config.search_max) {
        return invalid("search bounds must be withdrawal rates between 0 and 1");
    }
    if config.search_max <= config.search_min {
        return invalid("search_max must be greater than search_min");
    }
    if !config.tolerance.is_finite() || config.tolerance <= 0.0 {
        return invalid("tolerance must be > 0");
    }
    if config.max_iterations == 0 {
        return invalid("max_iterations must be > 0");
    }
    if config.runs_per_iteration == 0 {
        return invalid("runs_per_iteration must be > 0");
    }
    if config.final_runs == 0 {
        return invalid("final_runs must be > 0");
    }
    Ok(())
}
