//! ARIMA(p, d, q) estimated by conditional sum of squares (CSS).
//!
//! The series is differenced `d` times and an ARMA(p, q) model, with a mean
//! term only when `d == 0`, is fitted to the result. Coefficients are searched
//! in an unconstrained space mapped through partial autocorrelations, so every
//! candidate AR polynomial is stationary and every MA polynomial invertible.

use std::f64::consts::PI;

use tracing::trace;

use super::linalg::least_squares;
use super::optimizer::NelderMead;
use super::{ensure_finite, mean, variance, ModelError};
use crate::models::ArimaOrder;

/// A fitted ARIMA model.
#[derive(Debug, Clone)]
pub struct ArimaModel {
    order: ArimaOrder,
    mean: f64,
    ar: Vec<f64>,
    ma: Vec<f64>,
    sigma2: f64,
    log_likelihood: f64,
    aic: f64,
    iterations: usize,
    /// The `d`-times differenced series the ARMA part was fitted on.
    differenced: Vec<f64>,
    residuals: Vec<f64>,
    /// `tails[k]` is the last value of the series differenced `k` times.
    tails: Vec<f64>,
}

impl ArimaModel {
    /// Minimum series length for `order`: the differenced series must leave
    /// more observations than estimated coefficients plus the variance.
    pub fn min_observations(order: ArimaOrder) -> usize {
        order.d + order.arma_terms() + 2
    }

    /// Fits `order` to `series`.
    ///
    /// Fails when the series is too short, contains non-finite values, or the
    /// optimiser stops without converging.
    pub fn fit(series: &[f64], order: ArimaOrder) -> Result<Self, ModelError> {
        Self::fit_with(series, order, &NelderMead::default())
    }

    pub fn fit_with(
        series: &[f64],
        order: ArimaOrder,
        optimizer: &NelderMead,
    ) -> Result<Self, ModelError> {
        ensure_finite(series)?;
        let required = Self::min_observations(order);
        if series.len() < required {
            return Err(ModelError::InsufficientData {
                required,
                actual: series.len(),
            });
        }

        let ArimaOrder { p, d, q } = order;
        let mut tails = Vec::with_capacity(d);
        let mut differenced = series.to_vec();
        for _ in 0..d {
            tails.push(differenced[differenced.len() - 1]);
            differenced = difference(&differenced);
        }

        let with_mean = d == 0;
        let sample_mean = if with_mean { mean(&differenced) } else { 0.0 };
        let (ar_start, ma_start) = initial_estimates(&differenced, sample_mean, p, q);

        let mut start = Vec::with_capacity(usize::from(with_mean) + order.arma_terms());
        let mut steps = Vec::with_capacity(start.capacity());
        if with_mean {
            start.push(sample_mean);
            steps.push(0.1 * variance(&differenced).sqrt() + 1e-3 * sample_mean.abs().max(1.0));
        }
        start.extend(unconstrain_stationary(&ar_start));
        start.extend(unconstrain_stationary(&negate(&ma_start)));
        steps.resize(start.len(), 0.1);

        let objective = |params: &[f64]| {
            let (m, ar, ma) = unpack(params, with_mean, p, q);
            css(&differenced, m, &ar, &ma)
        };
        let minimum = optimizer.minimize(objective, &start, &steps);
        if !minimum.converged {
            return Err(ModelError::NotConverged {
                iterations: minimum.iterations,
            });
        }

        let (fitted_mean, ar, ma) = unpack(&minimum.point, with_mean, p, q);
        let residuals = conditional_residuals(&differenced, fitted_mean, &ar, &ma);
        let effective = (differenced.len() - p) as f64;
        let sum_squares: f64 = residuals[p..].iter().map(|e| e * e).sum();
        let floor = 1e-10 * variance(&differenced).max(1.0);
        let sigma2 = (sum_squares / effective).max(floor);
        let log_likelihood = -0.5 * effective * ((2.0 * PI * sigma2).ln() + 1.0);
        let parameters = (order.arma_terms() + usize::from(with_mean) + 1) as f64;
        let aic = -2.0 * log_likelihood + 2.0 * parameters;

        trace!(
            %order,
            aic,
            sigma2,
            iterations = minimum.iterations,
            "arima model fitted"
        );

        Ok(Self {
            order,
            mean: fitted_mean,
            ar,
            ma,
            sigma2,
            log_likelihood,
            aic,
            iterations: minimum.iterations,
            differenced,
            residuals,
            tails,
        })
    }

    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    pub fn aic(&self) -> f64 {
        self.aic
    }

    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    pub fn ar_coefficients(&self) -> &[f64] {
        &self.ar
    }

    pub fn ma_coefficients(&self) -> &[f64] {
        &self.ma
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Point forecasts for the next `steps` observations on the original scale.
    /// Future innovations are taken as zero.
    pub fn forecast(&self, steps: usize) -> Vec<f64> {
        let n = self.differenced.len();
        let mut w = self.differenced.clone();
        let mut e = self.residuals.clone();

        for _ in 0..steps {
            let t = w.len();
            let next = one_step(&w, &e, t, self.mean, &self.ar, &self.ma);
            w.push(next);
            e.push(0.0);
        }

        let mut values = w.split_off(n);
        for tail in self.tails.iter().rev() {
            let mut level = *tail;
            for v in values.iter_mut() {
                level += *v;
                *v = level;
            }
        }
        values
    }
}

/// First differences: `x[t] - x[t - 1]`.
pub fn difference(series: &[f64]) -> Vec<f64> {
    series.windows(2).map(|w| w[1] - w[0]).collect()
}

fn negate(values: &[f64]) -> Vec<f64> {
    values.iter().map(|v| -v).collect()
}

fn unpack(params: &[f64], with_mean: bool, p: usize, q: usize) -> (f64, Vec<f64>, Vec<f64>) {
    let (m, rest) = if with_mean {
        (params[0], &params[1..])
    } else {
        (0.0, params)
    };
    let ar = constrain_stationary(&rest[..p]);
    let ma = negate(&constrain_stationary(&rest[p..p + q]));
    (m, ar, ma)
}

fn one_step(w: &[f64], e: &[f64], t: usize, mean: f64, ar: &[f64], ma: &[f64]) -> f64 {
    let mut prediction = mean;
    for (i, phi) in ar.iter().enumerate() {
        prediction += phi * (w[t - 1 - i] - mean);
    }
    for (j, theta) in ma.iter().enumerate() {
        if t > j {
            prediction += theta * e[t - 1 - j];
        }
    }
    prediction
}

/// In-sample one-step residuals; the first `p` are zero by conditioning.
fn conditional_residuals(w: &[f64], mean: f64, ar: &[f64], ma: &[f64]) -> Vec<f64> {
    let mut e = vec![0.0; w.len()];
    for t in ar.len()..w.len() {
        e[t] = w[t] - one_step(w, &e, t, mean, ar, ma);
    }
    e
}

fn css(w: &[f64], mean: f64, ar: &[f64], ma: &[f64]) -> f64 {
    conditional_residuals(w, mean, ar, ma)[ar.len()..]
        .iter()
        .map(|e| e * e)
        .sum()
}

/// Maps unconstrained reals to the coefficients of a stationary AR polynomial
/// via partial autocorrelations and the Durbin-Levinson recursion.
fn constrain_stationary(unconstrained: &[f64]) -> Vec<f64> {
    let n = unconstrained.len();
    if n == 0 {
        return Vec::new();
    }
    let r: Vec<f64> = unconstrained
        .iter()
        .map(|x| x / (1.0 + x * x).sqrt())
        .collect();

    let mut y = vec![vec![0.0; n]; n];
    for k in 0..n {
        for i in 0..k {
            y[k][i] = y[k - 1][i] + r[k] * y[k - 1][k - i - 1];
        }
        y[k][k] = r[k];
    }
    negate(&y[n - 1])
}

/// Inverse of [`constrain_stationary`]. Non-stationary input maps to zeros.
fn unconstrain_stationary(constrained: &[f64]) -> Vec<f64> {
    let n = constrained.len();
    if n == 0 {
        return Vec::new();
    }

    let mut y = vec![vec![0.0; n]; n];
    y[n - 1] = negate(constrained);
    for k in (1..n).rev() {
        let pivot = y[k][k];
        if pivot.abs() >= 1.0 {
            return vec![0.0; n];
        }
        for i in 0..k {
            y[k - 1][i] = (y[k][i] - pivot * y[k][k - i - 1]) / (1.0 - pivot * pivot);
        }
    }

    let mut unconstrained = Vec::with_capacity(n);
    for (k, row) in y.iter().enumerate() {
        let r = row[k];
        if !r.is_finite() || r.abs() >= 1.0 {
            return vec![0.0; n];
        }
        unconstrained.push(r / (1.0 - r * r).sqrt());
    }
    unconstrained
}

/// Hannan-Rissanen starting values: a long autoregression supplies residual
/// estimates, then lags and lagged residuals are regressed jointly.
/// Falls back to zeros when either regression is degenerate.
fn initial_estimates(w: &[f64], mean: f64, p: usize, q: usize) -> (Vec<f64>, Vec<f64>) {
    let zeros = (vec![0.0; p], vec![0.0; q]);
    if p + q == 0 {
        return zeros;
    }
    let z: Vec<f64> = w.iter().map(|v| v - mean).collect();
    let n = z.len();

    let (innovations, start) = if q > 0 {
        let long = (p + q).max(((n as f64).ln().powi(2)).ceil() as usize).min(n / 3);
        if long == 0 {
            return zeros;
        }
        let design: Vec<Vec<f64>> = (long..n)
            .map(|t| (1..=long).map(|lag| z[t - lag]).collect())
            .collect();
        let Ok(phi) = least_squares(&design, &z[long..]) else {
            return zeros;
        };
        let mut e = vec![0.0; n];
        for t in long..n {
            let fitted: f64 = phi.iter().enumerate().map(|(i, c)| c * z[t - 1 - i]).sum();
            e[t] = z[t] - fitted;
        }
        (e, p.max(long + q))
    } else {
        (Vec::new(), p)
    };

    if n <= start + p + q {
        return zeros;
    }
    let design: Vec<Vec<f64>> = (start..n)
        .map(|t| {
            (1..=p)
                .map(|lag| z[t - lag])
                .chain((1..=q).map(|lag| innovations[t - lag]))
                .collect()
        })
        .collect();
    match least_squares(&design, &z[start..]) {
        Ok(beta) => (beta[..p].to_vec(), beta[p..].to_vec()),
        Err(_) => zeros,
    }
}
