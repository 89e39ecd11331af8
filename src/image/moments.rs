//! Moments and radial profiles of images.

use super::check_coords;
use super::projection::project;
use crate::error::{PhaseSpaceError, Result};
use crate::math::linalg::{cov_to_corr, ensure_square, mahalanobis, try_inverse};
use nalgebra::DMatrix;
use ndarray::{Array1, ArrayD, ArrayViewD, IxDyn};

fn default_coords(shape: &[usize]) -> Vec<Array1<f64>> {
    shape
        .iter()
        .map(|&n| Array1::from_shape_fn(n, |i| i as f64))
        .collect()
}

/// Weighted covariance over every grid point. Zero if the image sums to zero.
fn weighted_cov(f: &ArrayViewD<f64>, coords: &[Array1<f64>]) -> DMatrix<f64> {
    let n = f.ndim();
    let mut sigma = DMatrix::zeros(n, n);
    let total = f.sum();
    if !(total > 0.0) {
        return sigma;
    }

    let mut mean = vec![0.0; n];
    for (index, &w) in f.indexed_iter() {
        for (k, m) in mean.iter_mut().enumerate() {
            *m += w * coords[k][index[k]];
        }
    }
    for m in &mut mean {
        *m /= total;
    }

    let mut x = vec![0.0; n];
    for (index, &w) in f.indexed_iter() {
        for (k, xk) in x.iter_mut().enumerate() {
            *xk = coords[k][index[k]] - mean[k];
        }
        for i in 0..n {
            for j in 0..=i {
                sigma[(i, j)] += w * x[i] * x[j];
            }
        }
    }
    for i in 0..n {
        for j in 0..=i {
            let v = sigma[(i, j)] / total;
            sigma[(i, j)] = v;
            sigma[(j, i)] = v;
        }
    }
    sigma
}

/// Covariance matrix of an image treated as a weighted grid.
///
/// `coords` gives the bin centers along each axis (bin indices by default).
/// Images with three or more axes are reduced pair by pair: each
/// off-diagonal element comes from the 2-D projection onto its two axes,
/// which avoids a pass over the full grid per element. An image that sums
/// to zero gives a zero matrix.
///
/// # Errors
///
/// Returns an error if the coordinates do not match the image shape.
pub fn cov(f: &ArrayViewD<f64>, coords: Option<&[Array1<f64>]>) -> Result<DMatrix<f64>> {
    let owned;
    let coords = match coords {
        Some(c) => c,
        None => {
            owned = default_coords(f.shape());
            &owned
        }
    };
    check_coords(coords, f.shape())?;

    let n = f.ndim();
    tracing::debug!(shape = ?f.shape(), "image covariance");
    if n < 3 {
        return Ok(weighted_cov(f, coords));
    }

    let mut sigma = DMatrix::zeros(n, n);
    for i in 0..n {
        for j in 0..i {
            let image = project(f, &[i, j])?;
            let pair = [coords[i].clone(), coords[j].clone()];
            let s = weighted_cov(&image.view(), &pair);
            sigma[(i, i)] = s[(0, 0)];
            sigma[(j, j)] = s[(1, 1)];
            sigma[(i, j)] = s[(0, 1)];
            sigma[(j, i)] = s[(0, 1)];
        }
    }
    Ok(sigma)
}

/// Correlation matrix of an image; see [`cov`].
///
/// # Errors
///
/// Returns an error if the coordinates do not match the image shape or a
/// variance is zero.
pub fn corr(f: &ArrayViewD<f64>, coords: Option<&[Array1<f64>]>) -> Result<DMatrix<f64>> {
    cov_to_corr(&cov(f, coords)?)
}

/// Ellipsoidal radius `sqrt(xᵀ Σ⁻¹ x)` at every grid point.
///
/// # Errors
///
/// Returns an error if `sigma` does not match the number of axes or is
/// singular.
pub fn grid_ellipsoid_radii(coords: &[Array1<f64>], sigma: &DMatrix<f64>) -> Result<ArrayD<f64>> {
    let n = ensure_square(sigma)?;
    if n != coords.len() {
        return Err(PhaseSpaceError::dimension_mismatch(coords.len(), n));
    }
    let sigma_inv = try_inverse(sigma, "grid covariance matrix")?;
    let shape: Vec<usize> = coords.iter().map(Array1::len).collect();
    let mut x = Array1::zeros(n);
    Ok(ArrayD::from_shape_fn(IxDyn(&shape), |index| {
        for (k, xk) in x.iter_mut().enumerate() {
            *xk = coords[k][index[k]];
        }
        mahalanobis(&x.view(), &sigma_inv)
    }))
}

/// Mean image value within radial shells `r <= R <= r + dr`, one per entry
/// of `radii`, where `R` is the precomputed radius of each bin.
///
/// `dr` defaults to `0.5 * max(R) / (n - 1)` with `n` the length of the
/// first axis. Shells containing no bin yield NaN.
///
/// # Errors
///
/// Returns an error if `r` and `f` differ in shape or the default shell
/// width cannot be computed.
pub fn radial_density(
    f: &ArrayViewD<f64>,
    r: &ArrayViewD<f64>,
    radii: &[f64],
    dr: Option<f64>,
) -> Result<Array1<f64>> {
    if f.shape() != r.shape() {
        return Err(PhaseSpaceError::invalid_argument(format!(
            "radius array shape {:?} does not match image shape {:?}",
            r.shape(),
            f.shape()
        )));
    }
    let dr = match dr {
        Some(dr) => dr,
        None => {
            let len = r.shape().first().copied().unwrap_or(0);
            if len < 2 {
                return Err(PhaseSpaceError::invalid_argument(
                    "default shell width needs at least two bins along the first axis",
                ));
            }
            let rmax = r.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
            0.5 * rmax / (len - 1) as f64
        }
    };
    if !(dr >= 0.0) {
        return Err(PhaseSpaceError::invalid_argument(format!(
            "shell width must be non-negative, got {dr}"
        )));
    }
    tracing::debug!(n_shells = radii.len(), dr, "radial density");

    Ok(radii
        .iter()
        .map(|&rmin| {
            let (sum, count) = f
                .iter()
                .zip(r.iter())
                .filter(|(_, &rr)| rr >= rmin && rr <= rmin + dr)
                .fold((0.0, 0usize), |(s, c), (&v, _)| (s + v, c + 1));
            if count == 0 {
                f64::NAN
            } else {
                sum / count as f64
            }
        })
        .collect())
}
