//! Bounded random search over ARIMA orders, scored by AIC.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

use super::arima::ArimaModel;
use super::ModelError;
use crate::config::AnalysisConfig;
use crate::models::ArimaOrder;

/// Inclusive upper bounds of the order search; lower bounds are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchSpace {
    pub max_p: usize,
    pub max_d: usize,
    pub max_q: usize,
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self {
            max_p: 5,
            max_d: 2,
            max_q: 5,
        }
    }
}

impl SearchSpace {
    pub fn contains(&self, order: ArimaOrder) -> bool {
        order.p <= self.max_p && order.d <= self.max_d && order.q <= self.max_q
    }

    /// Number of distinct orders in the space.
    pub fn size(&self) -> usize {
        (self.max_p + 1) * (self.max_d + 1) * (self.max_q + 1)
    }
}

/// Proposes the order evaluated by each trial.
pub trait OrderSampler {
    fn sample(&mut self, space: &SearchSpace, trial: usize) -> ArimaOrder;
}

/// Uniform independent draws, optionally seeded for reproducible runs.
#[derive(Debug, Clone)]
pub struct RandomSampler {
    rng: StdRng,
}

impl RandomSampler {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }
}

impl OrderSampler for RandomSampler {
    fn sample(&mut self, space: &SearchSpace, _trial: usize) -> ArimaOrder {
        ArimaOrder::new(
            self.rng.gen_range(0..=space.max_p),
            self.rng.gen_range(0..=space.max_d),
            self.rng.gen_range(0..=space.max_q),
        )
    }
}

/// Replays a fixed list of orders, cycling when the search asks for more.
#[derive(Debug, Clone)]
pub struct FixedSampler {
    orders: Vec<ArimaOrder>,
}

impl FixedSampler {
    pub fn new(orders: Vec<ArimaOrder>) -> Self {
        Self { orders }
    }
}

impl OrderSampler for FixedSampler {
    fn sample(&mut self, _space: &SearchSpace, trial: usize) -> ArimaOrder {
        if self.orders.is_empty() {
            return ArimaOrder::new(0, 0, 0);
        }
        self.orders[trial % self.orders.len()]
    }
}

/// Outcome of one evaluated order. Exactly one of `aic` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trial {
    pub number: usize,
    pub order: ArimaOrder,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aic: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Trial {
    /// AIC for feasible trials, `+inf` for failed ones.
    pub fn score(&self) -> f64 {
        self.aic.unwrap_or(f64::INFINITY)
    }

    pub fn is_feasible(&self) -> bool {
        self.aic.is_some()
    }
}

/// The winning order and the full trial history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub best_order: ArimaOrder,
    pub best_aic: f64,
    pub trials: Vec<Trial>,
}

#[derive(Debug, Clone)]
pub struct OrderSearch {
    space: SearchSpace,
    trials: usize,
}

impl OrderSearch {
    pub fn new(space: SearchSpace, trials: usize) -> Self {
        Self { space, trials }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(
            SearchSpace {
                max_p: config.max_p,
                max_d: config.max_d,
                max_q: config.max_q,
            },
            config.search_trials,
        )
    }

    pub fn space(&self) -> &SearchSpace {
        &self.space
    }

    /// Evaluates `trials` sampled orders on `series` and returns the one with
    /// the lowest AIC. Failed fits are recorded as infeasible and never win;
    /// the first of several equal scores is kept.
    pub fn run<S: OrderSampler + ?Sized>(
        &self,
        series: &[f64],
        sampler: &mut S,
    ) -> Result<SearchOutcome, ModelError> {
        let mut trials = Vec::with_capacity(self.trials);
        let mut best: Option<(ArimaOrder, f64)> = None;

        for number in 0..self.trials {
            let order = sampler.sample(&self.space, number);
            let fitted = if self.space.contains(order) {
                ArimaModel::fit(series, order)
            } else {
                Err(ModelError::InvalidParameter(format!(
                    "order {} outside search space",
                    order
                )))
            };

            let trial = match fitted {
                Ok(model) if model.aic().is_finite() => {
                    let aic = model.aic();
                    debug!(trial = number, %order, aic, "trial fitted");
                    if best.map_or(true, |(_, best_aic)| aic < best_aic) {
                        best = Some((order, aic));
                    }
                    Trial {
                        number,
                        order,
                        aic: Some(aic),
                        error: None,
                    }
                }
                Ok(_) => Trial {
                    number,
                    order,
                    aic: None,
                    error: Some("non-finite AIC".to_string()),
                },
                Err(err) => {
                    debug!(trial = number, %order, error = %err, "trial infeasible");
                    Trial {
                        number,
                        order,
                        aic: None,
                        error: Some(err.to_string()),
                    }
                }
            };
            trials.push(trial);
        }

        let (best_order, best_aic) = best.ok_or(ModelError::NoFeasibleTrial {
            trials: self.trials,
        })?;
        info!(%best_order, best_aic, trials = self.trials, "order search finished");

        Ok(SearchOutcome {
            best_order,
            best_aic,
            trials,
        })
    }
}
