use super::error::{ProjectionError, ProjectionOutcome};

/// Rejects rates at or below -100%, where `1 + rate` stops being a growth factor.
pub(crate) fn check_compounding_rate(field: &'static str, rate: f64) -> ProjectionOutcome<()> {
    if !rate.is_finite() {
        return Err(ProjectionError::InvalidRate {
            field,
            value: rate,
            reason: "must be finite",
        });
    }
    if rate <= -1.0 {
        return Err(ProjectionError::InvalidRate {
            field,
            value: rate,
            reason: "must be greater than -100%",
        });
    }
    Ok(())
}

/// Passes `value` through when it is still a finite amount.
pub(crate) fn check_finite_amount(field: &'static str, value: f64) -> ProjectionOutcome<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ProjectionError::InvalidInput {
            field,
            reason: format!("{value} is outside the representable range"),
        })
    }
}

/// `present_value * (1 + rate)^periods`, the zero-payment future value.
pub fn future_value(present_value: f64, rate: f64, periods: u32) -> ProjectionOutcome<f64> {
    check_compounding_rate("rate", rate)?;
    check_finite_amount("future_value", present_value * growth_factor(rate, periods))
}

/// Inverse of [`future_value`]: the sum today that compounds to `future_value`.
pub fn present_value(future_value: f64, rate: f64, periods: u32) -> ProjectionOutcome<f64> {
    check_compounding_rate("rate", rate)?;
    check_finite_amount("present_value", future_value / growth_factor(rate, periods))
}

fn growth_factor(rate: f64, periods: u32) -> f64 {
    (1.0 + rate).powi(periods as i32)
}
