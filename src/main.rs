use clap::{Parser, Subcommand};
use serde::Serialize;

use drawdown::api::{
    self, FixedHorizonArgs, LivingAnnuityArgs, MonteCarloArgs, SolveRateArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "drawdown",
    about = "Retirement drawdown projections: fixed horizon, living annuity and Monte-Carlo"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the JSON API.
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Grow savings to retirement, then draw down to the life-expectancy age.
    FixedHorizon(FixedHorizonArgs),
    /// Draw down a lump sum until it runs out or the year cap is reached.
    LivingAnnuity(LivingAnnuityArgs),
    /// Run seeded Monte-Carlo drawdowns and report balance percentiles.
    MonteCarlo(MonteCarloArgs),
    /// Find the highest withdrawal rate that meets a success target.
    SolveRate(SolveRateArgs),
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let outcome = match cli.command {
        Command::Serve { port } => {
            if let Err(e) = api::run_http_server(port).await {
                eprintln!("Server error: {e}");
                std::process::exit(1);
            }
            return;
        }
        Command::FixedHorizon(args) => api::fixed_horizon_response(&args).and_then(to_json),
        Command::LivingAnnuity(args) => api::living_annuity_response(&args).and_then(to_json),
        Command::MonteCarlo(args) => api::monte_carlo_response(&args).and_then(to_json),
        Command::SolveRate(args) => api::solve_rate_response(&args).and_then(to_json),
    };

    match outcome {
        Ok(json) => println!("{json}"),
        Err(msg) => {
            eprintln!("Input error: {msg}");
            std::process::exit(1);
        }
    }
}

fn to_json<T: Serialize>(body: T) -> Result<String, String> {
    serde_json::to_string_pretty(&body).map_err(|e| format!("Failed to encode output: {e}"))
}
