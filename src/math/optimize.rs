//! Derivative-free minimization.
//!
//! A Nelder–Mead simplex over a box-bounded parameter space. Parameters are
//! clamped into their bounds whenever a trial point is generated, which keeps
//! constrained quantities (e.g. beta > 0) valid throughout the search.

use crate::error::{PhaseSpaceError, Result};

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Stopping criteria for [`minimize`].
#[derive(Debug, Clone, Copy)]
pub struct SimplexOptions {
    /// Maximum number of iterations.
    pub max_iterations: usize,
    /// Stop when the simplex diameter falls below this (relative) value.
    pub x_tolerance: f64,
    /// Stop when the spread of objective values falls below this value.
    pub f_tolerance: f64,
    /// Relative size of the initial simplex around the guess.
    pub initial_step: f64,
}

/// Result of a successful minimization.
#[derive(Debug, Clone)]
pub struct Minimum {
    /// Location of the minimum.
    pub x: Vec<f64>,
    /// Objective value at `x`.
    pub value: f64,
    /// Iterations used.
    pub iterations: usize,
}

fn clamp(x: &mut [f64], bounds: &[(f64, f64)]) {
    for (v, &(lo, hi)) in x.iter_mut().zip(bounds) {
        *v = v.clamp(lo, hi);
    }
}

/// Minimize `objective` starting from `guess` within `bounds`.
///
/// # Errors
///
/// Returns [`PhaseSpaceError::NonConvergence`] if the tolerances are not met
/// within `max_iterations`, and [`PhaseSpaceError::NumericalInstability`] if
/// the objective is not finite at the starting point.
pub fn minimize<F>(
    objective: F,
    guess: &[f64],
    bounds: &[(f64, f64)],
    options: &SimplexOptions,
) -> Result<Minimum>
where
    F: Fn(&[f64]) -> f64,
{
    let n = guess.len();
    if bounds.len() != n {
        return Err(PhaseSpaceError::dimension_mismatch(n, bounds.len()));
    }

    let mut start = guess.to_vec();
    clamp(&mut start, bounds);

    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    simplex.push(start.clone());
    for i in 0..n {
        let mut vertex = start.clone();
        let step = if vertex[i] == 0.0 {
            options.initial_step
        } else {
            options.initial_step * vertex[i].abs()
        };
        vertex[i] += step;
        clamp(&mut vertex, bounds);
        if vertex[i] == start[i] {
            vertex[i] -= 2.0 * step;
            clamp(&mut vertex, bounds);
        }
        simplex.push(vertex);
    }
    let mut values: Vec<f64> = simplex.iter().map(|x| objective(x)).collect();
    if !values[0].is_finite() {
        return Err(PhaseSpaceError::numerical_instability(
            "objective is not finite at the initial guess",
        ));
    }

    for iteration in 0..options.max_iterations {
        let mut order: Vec<usize> = (0..=n).collect();
        order.sort_by(|&a, &b| {
            values[a]
                .partial_cmp(&values[b])
                .unwrap_or(std::cmp::Ordering::Greater)
        });
        simplex = order.iter().map(|&i| simplex[i].clone()).collect();
        values = order.iter().map(|&i| values[i]).collect();

        let f_spread = (values[n] - values[0]).abs();
        let scale = simplex[0].iter().fold(1.0f64, |acc, v| acc.max(v.abs()));
        let x_spread = simplex[1..]
            .iter()
            .flat_map(|v| v.iter().zip(&simplex[0]).map(|(a, b)| (a - b).abs()))
            .fold(0.0f64, f64::max);
        tracing::trace!(iteration, best = values[0], f_spread, x_spread, "simplex step");
        if f_spread <= options.f_tolerance && x_spread <= options.x_tolerance * scale {
            return Ok(Minimum {
                x: simplex[0].clone(),
                value: values[0],
                iterations: iteration,
            });
        }

        let centroid: Vec<f64> = (0..n)
            .map(|j| simplex[..n].iter().map(|v| v[j]).sum::<f64>() / n as f64)
            .collect();
        let towards = |coef: f64| -> Vec<f64> {
            let mut x: Vec<f64> = centroid
                .iter()
                .zip(&simplex[n])
                .map(|(c, w)| c + coef * (c - w))
                .collect();
            clamp(&mut x, bounds);
            x
        };

        let reflected = towards(REFLECTION);
        let f_reflected = objective(&reflected);
        if f_reflected < values[0] {
            let expanded = towards(EXPANSION);
            let f_expanded = objective(&expanded);
            if f_expanded < f_reflected {
                simplex[n] = expanded;
                values[n] = f_expanded;
            } else {
                simplex[n] = reflected;
                values[n] = f_reflected;
            }
            continue;
        }
        if f_reflected < values[n - 1] {
            simplex[n] = reflected;
            values[n] = f_reflected;
            continue;
        }

        let (contracted, f_contracted) = if f_reflected < values[n] {
            let x = towards(CONTRACTION);
            let f = objective(&x);
            (x, f)
        } else {
            let x = towards(-CONTRACTION);
            let f = objective(&x);
            (x, f)
        };
        if f_contracted < values[n].min(f_reflected) {
            simplex[n] = contracted;
            values[n] = f_contracted;
            continue;
        }

        let best = simplex[0].clone();
        for i in 1..=n {
            let mut x: Vec<f64> = best
                .iter()
                .zip(&simplex[i])
                .map(|(b, v)| b + SHRINK * (v - b))
                .collect();
            clamp(&mut x, bounds);
            values[i] = objective(&x);
            simplex[i] = x;
        }
    }

    Err(PhaseSpaceError::non_convergence(
        options.max_iterations,
        "simplex tolerances not reached",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn options() -> SimplexOptions {
        SimplexOptions {
            max_iterations: 5000,
            x_tolerance: 1e-10,
            f_tolerance: 1e-14,
            initial_step: 0.1,
        }
    }

    #[test]
    fn test_quadratic_minimum() {
        let f = |x: &[f64]| (x[0] - 1.0).powi(2) + 3.0 * (x[1] + 2.0).powi(2);
        let unbounded = [(f64::NEG_INFINITY, f64::INFINITY); 2];
        let min = minimize(f, &[0.0, 0.0], &unbounded, &options()).unwrap();
        assert_abs_diff_eq!(min.x[0], 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(min.x[1], -2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_bounds_respected() {
        let f = |x: &[f64]| (x[0] + 3.0).powi(2);
        let min = minimize(f, &[1.0], &[(0.5, 10.0)], &options()).unwrap();
        assert_abs_diff_eq!(min.x[0], 0.5, epsilon = 1e-8);
    }

    #[test]
    fn test_non_convergence_reported() {
        let f = |x: &[f64]| (x[0] - 1.0).powi(2) + (x[1] - 1.0).powi(2);
        let unbounded = [(f64::NEG_INFINITY, f64::INFINITY); 2];
        let opts = SimplexOptions {
            max_iterations: 2,
            ..options()
        };
        assert!(matches!(
            minimize(f, &[-5.0, 7.0], &unbounded, &opts),
            Err(PhaseSpaceError::NonConvergence { iterations: 2, .. })
        ));
    }
}
