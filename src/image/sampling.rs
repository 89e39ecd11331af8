//! Sampling continuous points from a binned density.

use super::check_coords;
use crate::error::{PhaseSpaceError, Result};
use crate::math::grid::{edges_from_centers, unravel_index};
use ndarray::{Array1, Array2, ArrayViewD};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

/// Draw `n_samples` points from the density `f`.
///
/// A bin is chosen with probability proportional to its value, then the
/// point is placed uniformly within that bin. `coords` holds the (evenly
/// spaced) bin centers along each axis; the bin edges are derived from them.
///
/// # Errors
///
/// Returns an error if the coordinates do not match the image, an axis has
/// fewer than two bins, or the weights are negative or sum to zero.
pub fn sample_grid<R: Rng + ?Sized>(
    f: &ArrayViewD<f64>,
    coords: &[Array1<f64>],
    n_samples: usize,
    rng: &mut R,
) -> Result<Array2<f64>> {
    check_coords(coords, f.shape())?;
    let edges = coords
        .iter()
        .map(|c| edges_from_centers(&c.view()))
        .collect::<Result<Vec<_>>>()?;
    let dist = WeightedIndex::<f64>::new(f.iter())
        .map_err(|e| PhaseSpaceError::invalid_argument(format!("invalid bin weights: {e}")))?;
    tracing::debug!(shape = ?f.shape(), n_samples, "sampling from grid");

    let shape = f.shape().to_vec();
    let mut samples = Array2::zeros((n_samples, shape.len()));
    for mut row in samples.rows_mut() {
        let index = unravel_index(dist.sample(rng), &shape);
        for (axis, &i) in index.iter().enumerate() {
            let lb = edges[axis][i];
            let ub = edges[axis][i + 1];
            row[axis] = lb + (ub - lb) * rng.gen::<f64>();
        }
    }
    Ok(samples)
}

/// [`sample_grid`] using the thread-local random number generator.
///
/// # Errors
///
/// See [`sample_grid`].
pub fn sample_grid_with_thread_rng(
    f: &ArrayViewD<f64>,
    coords: &[Array1<f64>],
    n_samples: usize,
) -> Result<Array2<f64>> {
    sample_grid(f, coords, n_samples, &mut rand::thread_rng())
}
