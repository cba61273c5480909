use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionError {
    #[error(
        "life expectancy age {life_expectancy_age} must be greater than retirement age {retirement_age}"
    )]
    InvalidHorizon {
        retirement_age: u32,
        life_expectancy_age: u32,
    },

    #[error("invalid rate {field} = {value}: {reason}")]
    InvalidRate {
        field: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("invalid simulation config: {0}")]
    InvalidSimulationConfig(String),

    #[error("invalid input {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },
}

pub type ProjectionOutcome<T> = Result<T, ProjectionError>;
