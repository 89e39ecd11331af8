//! Regular-grid utilities: bin edges and centers, bin lookup, flat/multi
//! index conversion, n-sphere volumes and multilinear interpolation.

use crate::config::BinSpec;
use crate::error::{PhaseSpaceError, Result};
use ndarray::{Array1, ArrayD, ArrayView1, IxDyn};
use std::f64::consts::PI;

/// Compute bin centers from bin edges.
#[must_use]
pub fn centers_from_edges(edges: &ArrayView1<f64>) -> Array1<f64> {
    if edges.len() < 2 {
        return Array1::zeros(0);
    }
    Array1::from_shape_fn(edges.len() - 1, |i| 0.5 * (edges[i] + edges[i + 1]))
}

/// Compute bin edges from evenly spaced bin centers.
///
/// # Errors
///
/// Returns an error if fewer than two centers are given.
pub fn edges_from_centers(centers: &ArrayView1<f64>) -> Result<Array1<f64>> {
    let n = centers.len();
    if n < 2 {
        return Err(PhaseSpaceError::invalid_argument(
            "at least two bin centers are needed to infer edges",
        ));
    }
    let delta = centers[1] - centers[0];
    Ok(Array1::from_shape_fn(n + 1, |i| {
        if i < n {
            centers[i] - 0.5 * delta
        } else {
            centers[n - 1] + 0.5 * delta
        }
    }))
}

/// Compute bin edges for one axis.
///
/// With [`BinSpec::Count`], `n + 1` equally spaced edges span `limits`, or the
/// data range when no limits are given. A zero-width range is widened by 0.5
/// on each side. Explicit edges are returned unchanged.
///
/// # Errors
///
/// Returns an error if the bin specification is invalid or the data contain NaN.
pub fn histogram_bin_edges(
    values: &ArrayView1<f64>,
    spec: &BinSpec,
    limits: Option<(f64, f64)>,
) -> Result<Array1<f64>> {
    match spec {
        BinSpec::Edges(edges) => {
            if edges.len() < 2 {
                return Err(PhaseSpaceError::invalid_argument(
                    "at least two bin edges are required",
                ));
            }
            Ok(Array1::from(edges.clone()))
        }
        BinSpec::Count(0) => Err(PhaseSpaceError::invalid_argument(
            "bin count must be at least 1",
        )),
        BinSpec::Count(n) => {
            let (mut lo, mut hi) = match limits {
                Some(range) => range,
                None if values.is_empty() => (0.0, 1.0),
                None => values
                    .iter()
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                        (lo.min(v), hi.max(v))
                    }),
            };
            if !(lo.is_finite() && hi.is_finite()) || lo > hi {
                return Err(PhaseSpaceError::invalid_argument(format!(
                    "invalid bin range ({lo}, {hi})"
                )));
            }
            if lo == hi {
                lo -= 0.5;
                hi += 0.5;
            }
            let n = *n;
            let width = hi - lo;
            Ok(Array1::from_shape_fn(n + 1, |i| {
                if i == n {
                    hi
                } else {
                    lo + width * i as f64 / n as f64
                }
            }))
        }
    }
}

/// Index of the bin containing `x`, following the convention of
/// `numpy.digitize`: `i` such that `edges[i - 1] <= x < edges[i]`, `0` below
/// the first edge and `edges.len()` at or above the last.
#[must_use]
#[inline]
pub fn digitize(x: f64, edges: &[f64]) -> usize {
    edges.partition_point(|&e| e <= x)
}

/// Histogram bin of `x`: bins are half-open except the last, which includes
/// its upper edge. `None` if `x` lies outside the edges.
#[must_use]
#[inline]
pub fn bin_index(x: f64, edges: &[f64]) -> Option<usize> {
    let n_edges = edges.len();
    if n_edges < 2 || !(x >= edges[0] && x <= edges[n_edges - 1]) {
        return None;
    }
    if x == edges[n_edges - 1] {
        return Some(n_edges - 2);
    }
    Some(digitize(x, edges) - 1)
}

/// Convert a multi-index to a row-major flat index.
#[must_use]
pub fn ravel_multi_index(index: &[usize], shape: &[usize]) -> usize {
    index
        .iter()
        .zip(shape)
        .fold(0, |flat, (&i, &n)| flat * n + i)
}

/// Convert a row-major flat index to a multi-index.
#[must_use]
pub fn unravel_index(mut flat: usize, shape: &[usize]) -> Vec<usize> {
    let mut index = vec![0; shape.len()];
    for (axis, &n) in shape.iter().enumerate().rev() {
        index[axis] = flat % n;
        flat /= n;
    }
    index
}

/// Volume of the unit ball in `d` dimensions.
#[must_use]
pub fn unit_ball_volume(d: usize) -> f64 {
    // V_d = V_{d-2} * 2π / d
    let (mut volume, start) = if d % 2 == 0 { (1.0, 2) } else { (2.0, 3) };
    let mut k = start;
    while k <= d {
        volume *= 2.0 * PI / k as f64;
        k += 2;
    }
    volume
}

/// Volume of the spherical shell `rmin <= r <= rmax` in `d` dimensions.
#[must_use]
pub fn sphere_shell_volume(rmin: f64, rmax: f64, d: usize) -> f64 {
    let exp = i32::try_from(d).unwrap_or(i32::MAX);
    unit_ball_volume(d) * (rmax.powi(exp) - rmin.powi(exp))
}

/// Multilinear interpolator on a regular (rectilinear) grid.
///
/// Points outside the grid evaluate to `fill_value`.
#[derive(Debug, Clone)]
pub struct GridInterpolator {
    coords: Vec<Array1<f64>>,
    values: ArrayD<f64>,
    fill_value: f64,
}

impl GridInterpolator {
    /// Create an interpolator from per-axis coordinates and grid values.
    ///
    /// # Errors
    ///
    /// Returns an error if the coordinate lengths do not match the value shape.
    pub fn new(coords: Vec<Array1<f64>>, values: ArrayD<f64>, fill_value: f64) -> Result<Self> {
        if coords.len() != values.ndim() {
            return Err(PhaseSpaceError::dimension_mismatch(
                values.ndim(),
                coords.len(),
            ));
        }
        for (c, &n) in coords.iter().zip(values.shape()) {
            if c.len() != n {
                return Err(PhaseSpaceError::dimension_mismatch(n, c.len()));
            }
        }
        Ok(Self {
            coords,
            values,
            fill_value,
        })
    }

    /// Evaluate at one point.
    #[must_use]
    pub fn evaluate(&self, point: &[f64]) -> f64 {
        let ndim = self.coords.len();
        if point.len() != ndim {
            return self.fill_value;
        }
        let mut lower = Vec::with_capacity(ndim);
        let mut frac = Vec::with_capacity(ndim);
        for (axis, &x) in point.iter().enumerate().take(ndim) {
            let c = &self.coords[axis];
            let n = c.len();
            if n == 0 || !(x >= c[0] && x <= c[n - 1]) {
                return self.fill_value;
            }
            if n == 1 {
                lower.push(0);
                frac.push(0.0);
                continue;
            }
            let i = c
                .iter()
                .take_while(|&&v| v <= x)
                .count()
                .saturating_sub(1)
                .min(n - 2);
            let t = (x - c[i]) / (c[i + 1] - c[i]);
            lower.push(i);
            frac.push(t);
        }

        let mut total = 0.0;
        let mut index = vec![0usize; ndim];
        for corner in 0..(1usize << ndim) {
            let mut weight = 1.0;
            for axis in 0..ndim {
                let upper = (corner >> axis) & 1 == 1;
                if upper {
                    if self.coords[axis].len() == 1 {
                        weight = 0.0;
                        break;
                    }
                    index[axis] = lower[axis] + 1;
                    weight *= frac[axis];
                } else {
                    index[axis] = lower[axis];
                    weight *= 1.0 - frac[axis];
                }
            }
            if weight != 0.0 {
                total += weight * self.values[IxDyn(&index)];
            }
        }
        total
    }
}
