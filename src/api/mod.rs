mod args;

use axum::{
    Json, Router,
    extract::Query,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use log::{info, warn};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::core::{
    DepletionMode, FixedHorizonMode, FixedHorizonProjection, ProjectionParameters,
    ProjectionResult, ProjectionSummary, RateSolveResult, StochasticConfig, project_fixed_horizon,
    simulate_depletion, simulate_stochastic, solve_withdrawal_rate, summarize,
};

pub use args::{
    CliDepletionMode, CliFixedHorizonMode, FixedHorizonArgs, LivingAnnuityArgs, MonteCarloArgs,
    ProjectionArgs, ProjectionPayload, SolveRateArgs, build_parameters, build_solve_config,
    build_stochastic_config,
};

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedHorizonResponse {
    pub mode: FixedHorizonMode,
    pub parameters: ProjectionParameters,
    pub projection: FixedHorizonProjection,
    pub summary: ProjectionSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LivingAnnuityResponse {
    pub mode: DepletionMode,
    pub parameters: ProjectionParameters,
    pub result: ProjectionResult,
    pub summary: ProjectionSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonteCarloResponse {
    pub mode: DepletionMode,
    pub parameters: ProjectionParameters,
    pub config: StochasticConfig,
    pub ages: Vec<u32>,
    pub median_balances: Vec<f64>,
    pub p10_balances: Vec<f64>,
    pub p90_balances: Vec<f64>,
    pub depletion_ages: Vec<Option<u32>>,
    pub success_rate: f64,
    /// The same parameters run once at the expected return.
    pub deterministic: ProjectionSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runs: Option<Vec<Vec<f64>>>,
}

pub fn fixed_horizon_response(args: &FixedHorizonArgs) -> Result<FixedHorizonResponse, String> {
    let parameters = build_parameters(&args.projection)?;
    let mode = FixedHorizonMode::from(args.mode);
    let projection = project_fixed_horizon(&parameters, mode).map_err(|e| e.to_string())?;
    let summary = summarize(
        &projection.result,
        projection.value_at_retirement,
        Some(projection.value_at_retirement),
    );
    Ok(FixedHorizonResponse {
        mode,
        parameters,
        projection,
        summary,
    })
}

pub fn living_annuity_response(args: &LivingAnnuityArgs) -> Result<LivingAnnuityResponse, String> {
    let parameters = build_parameters(&args.projection)?;
    let mode = DepletionMode::from(args.mode);
    let result = simulate_depletion(&parameters, mode).map_err(|e| e.to_string())?;
    let summary = summarize(&result, parameters.principal, None);
    Ok(LivingAnnuityResponse {
        mode,
        parameters,
        result,
        summary,
    })
}

pub fn monte_carlo_response(args: &MonteCarloArgs) -> Result<MonteCarloResponse, String> {
    let parameters = build_parameters(&args.annuity.projection)?;
    let config = build_stochastic_config(args)?;
    let mode = DepletionMode::from(args.annuity.mode);

    let stochastic = simulate_stochastic(&parameters, mode, config).map_err(|e| e.to_string())?;
    let deterministic = simulate_depletion(&parameters, mode).map_err(|e| e.to_string())?;

    Ok(MonteCarloResponse {
        mode,
        config,
        ages: stochastic.ages,
        median_balances: stochastic.median_balances,
        p10_balances: stochastic.p10_balances,
        p90_balances: stochastic.p90_balances,
        depletion_ages: stochastic.depletion_ages,
        success_rate: stochastic.success_rate,
        deterministic: summarize(&deterministic, parameters.principal, None),
        runs: args.include_runs.then_some(stochastic.runs),
        parameters,
    })
}

pub fn solve_rate_response(args: &SolveRateArgs) -> Result<RateSolveResult, String> {
    let parameters = build_parameters(&args.projection)?;
    let config = build_solve_config(args)?;
    solve_withdrawal_rate(&parameters, args.mode.into(), config).map_err(|e| e.to_string())
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route(
            "/api/fixed-horizon",
            get(fixed_horizon_get_handler).post(fixed_horizon_post_handler),
        )
        .route(
            "/api/living-annuity",
            get(living_annuity_get_handler).post(living_annuity_post_handler),
        )
        .route(
            "/api/monte-carlo",
            get(monte_carlo_get_handler).post(monte_carlo_post_handler),
        )
        .route("/api/solve-rate", post(solve_rate_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!("drawdown HTTP API listening on http://{addr}");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn fixed_horizon_get_handler(Query(payload): Query<ProjectionPayload>) -> Response {
    respond(fixed_horizon_response(&payload.fixed_horizon_args()))
}

async fn fixed_horizon_post_handler(Json(payload): Json<ProjectionPayload>) -> Response {
    respond(fixed_horizon_response(&payload.fixed_horizon_args()))
}

async fn living_annuity_get_handler(Query(payload): Query<ProjectionPayload>) -> Response {
    respond(living_annuity_response(&payload.living_annuity_args()))
}

async fn living_annuity_post_handler(Json(payload): Json<ProjectionPayload>) -> Response {
    respond(living_annuity_response(&payload.living_annuity_args()))
}

async fn monte_carlo_get_handler(Query(payload): Query<ProjectionPayload>) -> Response {
    monte_carlo_handler_impl(payload).await
}

async fn monte_carlo_post_handler(Json(payload): Json<ProjectionPayload>) -> Response {
    monte_carlo_handler_impl(payload).await
}

async fn monte_carlo_handler_impl(payload: ProjectionPayload) -> Response {
    let args = payload.monte_carlo_args();
    run_blocking(move || monte_carlo_response(&args)).await
}

async fn solve_rate_handler(Json(payload): Json<ProjectionPayload>) -> Response {
    let args = payload.solve_rate_args();
    run_blocking(move || solve_rate_response(&args)).await
}

/// Monte-Carlo work runs off the async workers.
async fn run_blocking<T, F>(work: F) -> Response
where
    T: Serialize + Send + 'static,
    F: FnOnce() -> Result<T, String> + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(outcome) => respond(outcome),
        Err(e) => {
            warn!("simulation task failed: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Simulation failed")
        }
    }
}

fn respond<T: Serialize>(outcome: Result<T, String>) -> Response {
    match outcome {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(msg) => {
            warn!("rejected request: {msg}");
            error_response(StatusCode::BAD_REQUEST, &msg)
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Longevity;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn payload(json: &str) -> ProjectionPayload {
        serde_json::from_str(json).expect("json should parse")
    }

    #[test]
    fn fixed_horizon_response_matches_worked_example() {
        let args = payload(
            r#"{
              "currentAge": 30,
              "retirementAge": 65,
              "lifeExpectancyAge": 90,
              "principal": 100000,
              "annualReturn": 7,
              "inflation": 0,
              "withdrawalRate": 4,
              "withdrawalGrowth": 3,
              "minWithdrawal": 0
            }"#,
        )
        .fixed_horizon_args();

        let response = fixed_horizon_response(&args).expect("valid request");
        assert_eq!(response.projection.years_to_retirement, 35);
        assert_approx(
            response.projection.value_at_retirement,
            100_000.0 * 1.07_f64.powi(35),
        );
        assert_eq!(response.projection.result.len(), 25);
        assert_approx(
            response.summary.first_year_withdrawal,
            response.projection.value_at_retirement * 0.04,
        );
        assert_approx(
            response.summary.monthly_income,
            response.summary.first_year_withdrawal / 12.0,
        );
    }

    #[test]
    fn fixed_horizon_response_reports_invalid_horizon() {
        let args = payload(r#"{ "retirementAge": 65, "lifeExpectancyAge": 60 }"#)
            .fixed_horizon_args();
        let err = fixed_horizon_response(&args).expect_err("must reject horizon");
        assert!(err.contains("65"));
    }

    #[test]
    fn fixed_horizon_response_rejects_huge_life_expectancy() {
        let args = payload(r#"{ "lifeExpectancyAge": 4000000000 }"#).fixed_horizon_args();
        let err = fixed_horizon_response(&args).expect_err("must reject age");
        assert!(err.contains("life_expectancy_age"));
    }

    #[test]
    fn fixed_horizon_response_rejects_overflowing_principal() {
        let args = payload(r#"{ "principal": 1e308 }"#).fixed_horizon_args();
        let err = fixed_horizon_response(&args).expect_err("must reject overflow");
        assert!(err.contains("future_value"));
    }

    #[test]
    fn living_annuity_response_depletes_with_level_amount() {
        let args = payload(
            r#"{
              "principal": 1000,
              "annualReturn": 0,
              "withdrawalRate": 20,
              "withdrawalGrowth": 0,
              "minWithdrawal": 0,
              "depletionMode": "level-amount"
            }"#,
        )
        .living_annuity_args();

        let response = living_annuity_response(&args).expect("valid request");
        assert_eq!(response.mode, DepletionMode::LevelAmount);
        assert_eq!(response.result.withdrawals.len(), 5);
        assert_eq!(
            response.summary.longevity,
            Longevity::Depleted { at_age: 69 }
        );
        assert_approx(response.summary.total_withdrawn, 1_000.0);
        assert_approx(response.summary.final_balance, 0.0);
    }

    #[test]
    fn living_annuity_response_rejects_bad_principal() {
        let args = payload(r#"{ "principal": -5 }"#).living_annuity_args();
        let err = living_annuity_response(&args).expect_err("must reject principal");
        assert!(err.contains("--principal"));
    }

    #[test]
    fn monte_carlo_response_omits_runs_unless_requested() {
        let base = r#"{ "runs": 20, "volatility": 10, "seed": 3, "maxYears": 15 }"#;
        let response = monte_carlo_response(&payload(base).monte_carlo_args())
            .expect("valid request");
        assert!(response.runs.is_none());
        assert_eq!(response.median_balances.len(), response.ages.len());
        assert_eq!(response.depletion_ages.len(), 20);

        let json = serde_json::to_string(&response).expect("response should serialize");
        assert!(!json.contains("\"runs\""));
        assert!(json.contains("\"successRate\""));
        assert!(json.contains("\"p10Balances\""));
        assert!(json.contains("\"deterministic\""));

        let with_runs = r#"{ "runs": 20, "volatility": 10, "seed": 3, "maxYears": 15, "includeRuns": true }"#;
        let response = monte_carlo_response(&payload(with_runs).monte_carlo_args())
            .expect("valid request");
        assert_eq!(response.runs.map(|runs| runs.len()), Some(20));
    }

    #[test]
    fn monte_carlo_response_rejects_zero_runs() {
        let err = monte_carlo_response(&payload(r#"{ "runs": 0 }"#).monte_carlo_args())
            .expect_err("must reject runs");
        assert!(err.contains("--runs"));
    }

    #[test]
    fn solve_rate_response_serialization_contains_expected_fields() {
        let args = payload(
            r#"{
              "principal": 1000,
              "annualReturn": 0,
              "withdrawalGrowth": 0,
              "minWithdrawal": 0,
              "maxYears": 10,
              "volatility": 0,
              "targetSuccess": 100,
              "runsPerIteration": 1,
              "finalRuns": 1
            }"#,
        )
        .solve_rate_args();

        let response = solve_rate_response(&args).expect("valid request");
        assert!(response.feasible);
        let json = serde_json::to_string(&response).expect("response should serialize");
        assert!(json.contains("\"solvedRate\""));
        assert!(json.contains("\"achievedSuccessRate\""));
        assert!(json.contains("\"iterations\""));
        assert!(json.contains("\"mode\":\"level-amount\""));
    }

    #[test]
    fn error_response_sets_status_and_no_store() {
        let response = error_response(StatusCode::BAD_REQUEST, "bad");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response
                .headers()
                .get(header::CACHE_CONTROL)
                .and_then(|v| v.to_str().ok()),
            Some("no-store")
        );
    }
}
