use log::debug;
use rand::SeedableRng;
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rayon::prelude::*;
use statrs::distribution::Normal;

use super::engine::{run_depletion_path, validate_parameters};
use super::error::{ProjectionError, ProjectionOutcome};
use super::types::{
    DepletionMode, ProjectionParameters, ProjectionResult, StochasticConfig, StochasticResult,
};

// A year cannot lose more than the whole pot.
const MIN_ANNUAL_RETURN: f64 = -1.0;

pub fn simulate_stochastic(
    params: &ProjectionParameters,
    mode: DepletionMode,
    config: StochasticConfig,
) -> ProjectionOutcome<StochasticResult> {
    validate_config(config)?;
    validate_parameters(params)?;

    let mean = params.annual_return_rate;
    let distribution = if config.volatility > 0.0 {
        let normal = Normal::new(mean, config.volatility).map_err(|e| {
            ProjectionError::InvalidSimulationConfig(format!(
                "invalid return distribution: {e}"
            ))
        })?;
        Some(normal)
    } else {
        None
    };

    let years = params.max_projection_years as usize;
    debug!(
        "running {} stochastic paths over {years} years (mean {mean}, volatility {})",
        config.run_count, config.volatility
    );

    let paths = (0..config.run_count)
        .into_par_iter()
        .map(|run_id| {
            let mut rng = StdRng::seed_from_u64(derive_seed(config.seed, run_id));
            run_depletion_path(params, mode, |_| {
                sample_return(distribution.as_ref(), mean, &mut rng)
            })
        })
        .collect::<ProjectionOutcome<Vec<ProjectionResult>>>()?;

    let ages = (0..params.max_projection_years)
        .map(|year| params.retirement_age + year)
        .collect::<Vec<_>>();
    let depletion_ages = paths.iter().map(|p| p.depletion_age).collect::<Vec<_>>();
    let runs = paths
        .iter()
        .map(|p| padded_balances(p, years, params.principal))
        .collect::<Vec<_>>();

    let sustainable = depletion_ages.iter().filter(|age| age.is_none()).count();
    let success_rate = sustainable as f64 / config.run_count as f64;

    let mut median_balances = Vec::with_capacity(years);
    let mut p10_balances = Vec::with_capacity(years);
    let mut p90_balances = Vec::with_capacity(years);
    let mut column = Vec::with_capacity(runs.len());
    for year in 0..years {
        column.clear();
        column.extend(runs.iter().map(|run| run[year]));
        median_balances.push(percentile(&mut column, 50.0));
        p10_balances.push(percentile(&mut column, 10.0));
        p90_balances.push(percentile(&mut column, 90.0));
    }

    Ok(StochasticResult {
        ages,
        runs,
        depletion_ages,
        median_balances,
        p10_balances,
        p90_balances,
        success_rate,
    })
}

pub(crate) fn validate_config(config: StochasticConfig) -> ProjectionOutcome<()> {
    if config.run_count == 0 {
        return Err(ProjectionError::InvalidSimulationConfig(
            "run_count must be > 0".to_string(),
        ));
    }
    if !config.volatility.is_finite() || config.volatility < 0.0 {
        return Err(ProjectionError::InvalidSimulationConfig(format!(
            "volatility must be a finite value >= 0, got {}",
            config.volatility
        )));
    }
    Ok(())
}

fn sample_return(distribution: Option<&Normal>, mean: f64, rng: &mut StdRng) -> f64 {
    match distribution {
        Some(normal) => normal.sample(rng).max(MIN_ANNUAL_RETURN),
        None => mean,
    }
}

// Depleted paths stay at zero; paths cut by the withdrawal floor hold their last balance.
fn padded_balances(path: &ProjectionResult, years: usize, principal: f64) -> Vec<f64> {
    let fill = match path.depletion_age {
        Some(_) => 0.0,
        None => path.final_balance().unwrap_or(principal),
    };
    let mut balances = path.balances.clone();
    balances.resize(years, fill);
    balances
}

pub(crate) fn derive_seed(base_seed: u64, run_id: u32) -> u64 {
    splitmix64(base_seed ^ ((run_id as u64) << 32) ^ run_id as u64)
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

fn percentile(values: &mut [f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    values.sort_by(|a, b| a.total_cmp(b));

    let n = values.len();
    if n == 1 {
        return values[0];
    }

    let rank = (p / 100.0) * (n as f64 - 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;

    if lower == upper {
        values[lower]
    } else {
        let w = rank - lower as f64;
        values[lower] * (1.0 - w) + values[upper] * w
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::engine::simulate_depletion;
    use proptest::prelude::{any, prop_assert, prop_assert_eq, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_params() -> ProjectionParameters {
        ProjectionParameters {
            current_age: 60,
            retirement_age: 65,
            life_expectancy_age: 90,
            principal: 5_000_000.0,
            annual_return_rate: 0.07,
            inflation_rate: 0.0,
            withdrawal_rate: 0.04,
            withdrawal_growth_rate: 0.0,
            max_projection_years: 50,
            min_withdrawal_floor: 10.0,
        }
    }

    fn assert_stochastic_invariants(result: &StochasticResult, years: usize, runs: usize) {
        assert_eq!(result.ages.len(), years);
        assert_eq!(result.run_count(), runs);
        assert_eq!(result.depletion_ages.len(), runs);
        assert_eq!(result.median_balances.len(), years);
        assert!((0.0..=1.0).contains(&result.success_rate));
        for run in &result.runs {
            assert_eq!(run.len(), years);
            assert!(run.iter().all(|b| b.is_finite() && *b >= 0.0));
        }
        for idx in 0..years {
            assert!(result.p10_balances[idx] <= result.median_balances[idx] + EPS);
            assert!(result.median_balances[idx] <= result.p90_balances[idx] + EPS);
        }
    }

    #[test]
    fn zero_volatility_runs_match_deterministic_simulation() {
        let params = sample_params();
        let config = StochasticConfig {
            run_count: 1_000,
            volatility: 0.0,
            seed: 9,
        };

        let deterministic = simulate_depletion(&params, DepletionMode::PercentOfBalance)
            .expect("valid parameters");
        let stochastic = simulate_stochastic(&params, DepletionMode::PercentOfBalance, config)
            .expect("valid config");

        assert_eq!(stochastic.run_count(), 1_000);
        for run in &stochastic.runs {
            assert_eq!(run, &deterministic.balances);
        }
        assert_eq!(stochastic.median_balances, deterministic.balances);
        assert_approx(stochastic.success_rate, 1.0);
    }

    #[test]
    fn zero_volatility_depleting_runs_pad_with_zero() {
        let mut params = sample_params();
        params.principal = 1_000_000.0;
        params.withdrawal_rate = 0.10;
        params.annual_return_rate = 0.03;
        let config = StochasticConfig {
            run_count: 50,
            volatility: 0.0,
            seed: 3,
        };

        let deterministic =
            simulate_depletion(&params, DepletionMode::LevelAmount).expect("valid parameters");
        let depleted_at = deterministic.depletion_age.expect("must deplete");
        let stochastic = simulate_stochastic(&params, DepletionMode::LevelAmount, config)
            .expect("valid config");

        let years_run = deterministic.len();
        for (run, depletion_age) in stochastic.runs.iter().zip(&stochastic.depletion_ages) {
            assert_eq!(&run[..years_run], deterministic.balances.as_slice());
            assert!(run[years_run..].iter().all(|b| *b == 0.0));
            assert_eq!(*depletion_age, Some(depleted_at));
        }
        assert_approx(stochastic.success_rate, 0.0);
    }

    #[test]
    fn floor_truncated_runs_hold_last_balance() {
        let mut params = sample_params();
        params.principal = 100.0;
        params.annual_return_rate = 0.0;
        params.withdrawal_rate = 0.5;
        let config = StochasticConfig {
            run_count: 4,
            volatility: 0.0,
            seed: 1,
        };

        let result = simulate_stochastic(&params, DepletionMode::PercentOfBalance, config)
            .expect("valid config");
        for run in &result.runs {
            assert_eq!(run.len(), 50);
            assert_approx(run[2], 12.5);
            assert_approx(run[49], 12.5);
        }
        assert_approx(result.success_rate, 1.0);
    }

    #[test]
    fn seeded_reruns_are_identical() {
        let params = sample_params();
        let config = StochasticConfig {
            run_count: 200,
            volatility: 0.15,
            seed: 123,
        };

        let a = simulate_stochastic(&params, DepletionMode::LevelAmount, config)
            .expect("valid config");
        let b = simulate_stochastic(&params, DepletionMode::LevelAmount, config)
            .expect("valid config");
        assert_eq!(a.runs, b.runs);
        assert_eq!(a.depletion_ages, b.depletion_ages);
        assert_eq!(a.median_balances, b.median_balances);
        assert_eq!(a.success_rate, b.success_rate);
    }

    #[test]
    fn different_seeds_give_different_paths() {
        let params = sample_params();
        let a = simulate_stochastic(
            &params,
            DepletionMode::PercentOfBalance,
            StochasticConfig {
                run_count: 20,
                volatility: 0.12,
                seed: 1,
            },
        )
        .expect("valid config");
        let b = simulate_stochastic(
            &params,
            DepletionMode::PercentOfBalance,
            StochasticConfig {
                run_count: 20,
                volatility: 0.12,
                seed: 2,
            },
        )
        .expect("valid config");
        assert_ne!(a.runs, b.runs);
    }

    #[test]
    fn runs_within_a_batch_are_independent() {
        let result = simulate_stochastic(
            &sample_params(),
            DepletionMode::PercentOfBalance,
            StochasticConfig {
                run_count: 10,
                volatility: 0.12,
                seed: 77,
            },
        )
        .expect("valid config");
        assert_ne!(result.runs[0], result.runs[1]);
    }

    #[test]
    fn success_rate_counts_sustainable_runs() {
        let mut params = sample_params();
        params.withdrawal_rate = 0.08;
        let result = simulate_stochastic(
            &params,
            DepletionMode::LevelAmount,
            StochasticConfig {
                run_count: 300,
                volatility: 0.18,
                seed: 5,
            },
        )
        .expect("valid config");

        let sustainable = result.depletion_ages.iter().filter(|a| a.is_none()).count();
        assert_approx(result.success_rate, sustainable as f64 / 300.0);
        for (run, depletion_age) in result.runs.iter().zip(&result.depletion_ages) {
            if let Some(age) = depletion_age {
                let idx = (age - params.retirement_age) as usize;
                assert!(run[idx..].iter().all(|b| *b == 0.0));
            }
        }
        assert_stochastic_invariants(&result, 50, 300);
    }

    #[test]
    fn extreme_volatility_never_goes_negative() {
        let result = simulate_stochastic(
            &sample_params(),
            DepletionMode::PercentOfBalance,
            StochasticConfig {
                run_count: 100,
                volatility: 3.0,
                seed: 11,
            },
        )
        .expect("valid config");
        assert_stochastic_invariants(&result, 50, 100);
    }

    #[test]
    fn overflowing_paths_fail_the_whole_simulation() {
        let params = ProjectionParameters {
            principal: 1e307,
            withdrawal_rate: 0.0,
            min_withdrawal_floor: 0.0,
            max_projection_years: 150,
            ..sample_params()
        };
        let err = simulate_stochastic(
            &params,
            DepletionMode::PercentOfBalance,
            StochasticConfig {
                run_count: 16,
                volatility: 0.0,
                seed: 4,
            },
        )
        .expect_err("must reject overflow");
        assert!(matches!(err, ProjectionError::InvalidInput { field: "balance", .. }));
    }

    #[test]
    fn rejects_invalid_config_before_sampling() {
        let params = sample_params();
        for config in [
            StochasticConfig {
                run_count: 0,
                volatility: 0.1,
                seed: 1,
            },
            StochasticConfig {
                run_count: 10,
                volatility: -0.01,
                seed: 1,
            },
            StochasticConfig {
                run_count: 10,
                volatility: f64::NAN,
                seed: 1,
            },
        ] {
            let err = simulate_stochastic(&params, DepletionMode::PercentOfBalance, config)
                .expect_err("must reject config");
            assert!(matches!(err, ProjectionError::InvalidSimulationConfig(_)));
        }
    }

    #[test]
    fn percentile_interpolates_between_points() {
        let mut values = vec![1.0, 2.0, 3.0, 4.0];
        assert_approx(percentile(&mut values, 25.0), 1.75);
        assert_approx(percentile(&mut values, 50.0), 2.5);
    }

    #[test]
    fn derive_seed_changes_per_run() {
        assert_ne!(derive_seed(42, 0), derive_seed(42, 1));
        assert_ne!(derive_seed(42, 0), derive_seed(43, 0));
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(16))]

        #[test]
        fn prop_stochastic_outputs_have_common_length_and_are_non_negative(
            seed in any::<u64>(),
            run_count in 1u32..40,
            max_years in 1u32..60,
            volatility_bp in 0u32..4_000,
            withdrawal_bp in 0u32..2_500,
            return_bp in -2_000i32..2_000,
            level in proptest::bool::ANY,
        ) {
            let params = ProjectionParameters {
                max_projection_years: max_years,
                withdrawal_rate: withdrawal_bp as f64 / 10_000.0,
                annual_return_rate: return_bp as f64 / 10_000.0,
                ..sample_params()
            };
            let config = StochasticConfig {
                run_count,
                volatility: volatility_bp as f64 / 10_000.0,
                seed,
            };
            let mode = if level { DepletionMode::LevelAmount } else { DepletionMode::PercentOfBalance };

            let result = simulate_stochastic(&params, mode, config).expect("valid config");
            prop_assert_eq!(result.run_count(), run_count as usize);
            prop_assert!(result.ages.len() == max_years as usize);
            assert_stochastic_invariants(&result, max_years as usize, run_count as usize);
        }
    }
}
