/*!
 * # Time-series models
 *
 * Numerical core of the sales analysis:
 *
 * - `decomposition`: additive seasonal decomposition with a centred moving-average trend
 * - `arima`: ARIMA(p, d, q) fitted by conditional sum of squares
 * - `order_search`: bounded random search over ARIMA orders scored by AIC
 * - `forecasting`: daily forecast points built from the winning order
 */

pub mod arima;
pub mod decomposition;
pub mod forecasting;
mod linalg;
pub mod optimizer;
pub mod order_search;

pub use arima::ArimaModel;
pub use decomposition::{seasonal_decompose, Decomposition};
pub use forecasting::{forecast_dates, generate_forecast, ForecastPoint};
pub use order_search::{
    FixedSampler, OrderSampler, OrderSearch, RandomSampler, SearchOutcome, SearchSpace, Trial,
};

/// Failures raised while decomposing, fitting or forecasting a series.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("insufficient data: need at least {required} observations, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("linear system is singular")]
    Singular,

    #[error("optimizer did not converge after {iterations} iterations")]
    NotConverged { iterations: usize },

    #[error("no feasible model among {trials} trials")]
    NoFeasibleTrial { trials: usize },
}

fn ensure_finite(values: &[f64]) -> Result<(), ModelError> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(ModelError::InvalidData(format!(
            "non-finite value at position {}",
            index
        ))),
        None => Ok(()),
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}
