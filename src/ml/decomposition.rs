//! Additive seasonal decomposition: `value = trend + seasonal + residual`.

use serde::Serialize;

use super::{ensure_finite, ModelError};

/// Components of an additive decomposition. Every vector has the input length;
/// trend and residual are undefined (`None`) within half a period of either edge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decomposition {
    pub period: usize,
    pub trend: Vec<Option<f64>>,
    pub seasonal: Vec<f64>,
    pub residual: Vec<Option<f64>>,
}

impl Decomposition {
    pub fn len(&self) -> usize {
        self.seasonal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seasonal.is_empty()
    }

    /// The seasonal pattern for one full period, starting at the first observation.
    pub fn seasonal_pattern(&self) -> &[f64] {
        &self.seasonal[..self.period.min(self.seasonal.len())]
    }
}

/// Moving-average weights: flat for odd periods, `2 x m` (half weight at both ends) for even ones.
fn trend_filter(period: usize) -> Vec<f64> {
    let weight = 1.0 / period as f64;
    if period % 2 == 1 {
        vec![weight; period]
    } else {
        let mut filter = vec![weight; period + 1];
        filter[0] = 0.5 * weight;
        filter[period] = 0.5 * weight;
        filter
    }
}

fn centred_moving_average(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let filter = trend_filter(period);
    let half = filter.len() / 2;
    let n = values.len();

    (0..n)
        .map(|i| {
            if i < half || i + half >= n {
                return None;
            }
            let window = &values[i - half..=i + half];
            Some(window.iter().zip(&filter).map(|(v, w)| v * w).sum())
        })
        .collect()
}

/// Splits `values` into trend, seasonal and residual components.
///
/// Requires at least two full periods. The seasonal component is the mean
/// detrended value per position in the cycle, centred so one period sums to zero.
pub fn seasonal_decompose(values: &[f64], period: usize) -> Result<Decomposition, ModelError> {
    if period < 2 {
        return Err(ModelError::InvalidParameter(format!(
            "seasonal period must be at least 2, got {}",
            period
        )));
    }
    let required = 2 * period;
    if values.len() < required {
        return Err(ModelError::InsufficientData {
            required,
            actual: values.len(),
        });
    }
    ensure_finite(values)?;

    let trend = centred_moving_average(values, period);

    let mut sums = vec![0.0; period];
    let mut counts = vec![0usize; period];
    for (i, (value, t)) in values.iter().zip(&trend).enumerate() {
        if let Some(t) = t {
            sums[i % period] += value - t;
            counts[i % period] += 1;
        }
    }
    let mut pattern: Vec<f64> = sums
        .iter()
        .zip(&counts)
        .map(|(sum, &count)| if count == 0 { 0.0 } else { sum / count as f64 })
        .collect();
    let offset = pattern.iter().sum::<f64>() / period as f64;
    pattern.iter_mut().for_each(|s| *s -= offset);

    let seasonal: Vec<f64> = (0..values.len()).map(|i| pattern[i % period]).collect();
    let residual = values
        .iter()
        .zip(&trend)
        .zip(&seasonal)
        .map(|((value, t), s)| t.map(|t| value - t - s))
        .collect();

    Ok(Decomposition {
        period,
        trend,
        seasonal,
        residual,
    })
}
