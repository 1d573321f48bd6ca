//! Derivative-free minimisation (Nelder-Mead simplex).

/// Result of a minimisation run.
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub point: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Nelder-Mead simplex minimiser with standard coefficients.
#[derive(Debug, Clone)]
pub struct NelderMead {
    pub max_iterations: usize,
    /// Absolute tolerance on the simplex spread in parameter space.
    pub x_tolerance: f64,
    /// Relative tolerance on the spread of objective values.
    pub f_tolerance: f64,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            max_iterations: 5_000,
            x_tolerance: 1e-6,
            f_tolerance: 1e-10,
        }
    }
}

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
const SHRINK: f64 = 0.5;

impl NelderMead {
    pub fn with_max_iterations(max_iterations: usize) -> Self {
        Self {
            max_iterations,
            ..Self::default()
        }
    }

    /// Minimises `objective` starting from `start`, with one initial simplex
    /// vertex per coordinate displaced by the matching entry of `steps`.
    /// Non-finite objective values are treated as `+inf`.
    pub fn minimize<F>(&self, objective: F, start: &[f64], steps: &[f64]) -> Minimum
    where
        F: Fn(&[f64]) -> f64,
    {
        let eval = |x: &[f64]| {
            let v = objective(x);
            if v.is_finite() {
                v
            } else {
                f64::INFINITY
            }
        };

        let dim = start.len();
        if dim == 0 {
            return Minimum {
                point: Vec::new(),
                value: eval(start),
                iterations: 0,
                converged: true,
            };
        }

        let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(dim + 1);
        simplex.push(start.to_vec());
        for i in 0..dim {
            let mut vertex = start.to_vec();
            let step = steps.get(i).copied().unwrap_or(0.1);
            vertex[i] += if step == 0.0 { 0.1 } else { step };
            simplex.push(vertex);
        }
        let mut values: Vec<f64> = simplex.iter().map(|v| eval(v)).collect();

        let mut iterations = 0;
        let mut converged = false;
        while iterations < self.max_iterations {
            let mut order: Vec<usize> = (0..=dim).collect();
            order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
            simplex = order.iter().map(|&i| simplex[i].clone()).collect();
            values = order.iter().map(|&i| values[i]).collect();

            if self.has_converged(&simplex, &values) {
                converged = true;
                break;
            }
            iterations += 1;

            let centroid: Vec<f64> = (0..dim)
                .map(|j| simplex[..dim].iter().map(|v| v[j]).sum::<f64>() / dim as f64)
                .collect();
            let worst = simplex[dim].clone();
            let toward = |coef: f64| -> Vec<f64> {
                centroid
                    .iter()
                    .zip(&worst)
                    .map(|(c, w)| c + coef * (c - w))
                    .collect()
            };

            let reflected = toward(REFLECTION);
            let f_reflected = eval(&reflected);

            if f_reflected < values[0] {
                let expanded = toward(REFLECTION * EXPANSION);
                let f_expanded = eval(&expanded);
                if f_expanded < f_reflected {
                    simplex[dim] = expanded;
                    values[dim] = f_expanded;
                } else {
                    simplex[dim] = reflected;
                    values[dim] = f_reflected;
                }
                continue;
            }

            if f_reflected < values[dim - 1] {
                simplex[dim] = reflected;
                values[dim] = f_reflected;
                continue;
            }

            let (candidate, f_candidate, accept) = if f_reflected < values[dim] {
                let outside = toward(REFLECTION * CONTRACTION);
                let f = eval(&outside);
                (outside, f, f <= f_reflected)
            } else {
                let inside = toward(-CONTRACTION);
                let f = eval(&inside);
                (inside, f, f < values[dim])
            };

            if accept {
                simplex[dim] = candidate;
                values[dim] = f_candidate;
                continue;
            }

            let best = simplex[0].clone();
            for i in 1..=dim {
                simplex[i] = best
                    .iter()
                    .zip(&simplex[i])
                    .map(|(b, x)| b + SHRINK * (x - b))
                    .collect();
                values[i] = eval(&simplex[i]);
            }
        }

        let best = (0..=dim)
            .min_by(|&a, &b| values[a].total_cmp(&values[b]))
            .unwrap_or(0);
        Minimum {
            point: simplex[best].clone(),
            value: values[best],
            iterations,
            converged: converged && values[best].is_finite(),
        }
    }

    fn has_converged(&self, simplex: &[Vec<f64>], values: &[f64]) -> bool {
        let best = values[0];
        if !best.is_finite() {
            return false;
        }
        let f_spread = values
            .iter()
            .skip(1)
            .fold(0.0_f64, |acc, v| acc.max((v - best).abs()));
        let x_spread = simplex.iter().skip(1).fold(0.0_f64, |acc, vertex| {
            vertex
                .iter()
                .zip(&simplex[0])
                .fold(acc, |inner, (a, b)| inner.max((a - b).abs()))
        });

        f_spread <= self.f_tolerance * (best.abs() + 1e-12) || x_spread <= self.x_tolerance
    }
}
