//! Coordinate transformations of point clouds.
//!
//! Every function returns a new array. [`decorrelate_x_y_z`] takes ownership
//! of its input and hands the permuted buffer back.

use super::analysis::covariance_matrix;
use super::check_axes;
use crate::config::DownsampleSize;
use crate::cov::{emittance, twiss_2d};
use crate::error::{ensure_even, PhaseSpaceError, Result};
use crate::math::linalg::{diagonal_block, to_array2};
use nalgebra::DMatrix;
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::seq::SliceRandom;
use rand::Rng;

/// Axis-aligned projection: the columns listed in `axis`, in that order.
///
/// # Errors
///
/// Returns an error if an axis is out of range.
pub fn project(points: &ArrayView2<f64>, axis: &[usize]) -> Result<Array2<f64>> {
    check_axes(axis, points.ncols())?;
    Ok(points.select(Axis(1), axis))
}

/// Apply a (nonlinear) map to every point.
///
/// # Errors
///
/// Returns an error if the map does not return the same number of
/// coordinates for every point.
pub fn transform<F>(points: &ArrayView2<f64>, mut f: F) -> Result<Array2<f64>>
where
    F: FnMut(ArrayView1<f64>) -> Array1<f64>,
{
    let n = points.nrows();
    let mut data = Vec::new();
    let mut width = None;
    for row in points.rows() {
        let mapped = f(row);
        match width {
            None => width = Some(mapped.len()),
            Some(w) if w != mapped.len() => {
                return Err(PhaseSpaceError::dimension_mismatch(w, mapped.len()))
            }
            Some(_) => {}
        }
        data.extend(mapped.iter().copied());
    }
    let width = width.unwrap_or_else(|| points.ncols());
    Array2::from_shape_vec((n, width), data)
        .map_err(|e| PhaseSpaceError::invalid_argument(e.to_string()))
}

/// Apply a linear map: `X Mᵀ`.
///
/// # Errors
///
/// Returns an error if `matrix` does not have one column per coordinate.
pub fn transform_linear(points: &ArrayView2<f64>, matrix: &DMatrix<f64>) -> Result<Array2<f64>> {
    if matrix.ncols() != points.ncols() {
        return Err(PhaseSpaceError::dimension_mismatch(
            points.ncols(),
            matrix.ncols(),
        ));
    }
    Ok(points.dot(&to_array2(matrix).t()))
}

/// Translate every point by `delta`.
///
/// # Errors
///
/// Returns an error if `delta` does not have one entry per coordinate.
pub fn shift(points: &ArrayView2<f64>, delta: &[f64]) -> Result<Array2<f64>> {
    if delta.len() != points.ncols() {
        return Err(PhaseSpaceError::dimension_mismatch(points.ncols(), delta.len()));
    }
    Ok(points + &ArrayView1::from(delta))
}

/// Scale each coordinate by the matching factor.
///
/// # Errors
///
/// Returns an error if `factors` does not have one entry per coordinate.
pub fn scale(points: &ArrayView2<f64>, factors: &[f64]) -> Result<Array2<f64>> {
    if factors.len() != points.ncols() {
        return Err(PhaseSpaceError::dimension_mismatch(points.ncols(), factors.len()));
    }
    Ok(points * &ArrayView1::from(factors))
}

/// Normalize each 2D phase-space projection by its own Twiss parameters.
///
/// In each plane `u_n = u / sqrt(β)` and `u'_n = sqrt(β) u' + α u / sqrt(β)`,
/// which removes the `u-u'` correlation and leaves the block covariance at
/// `diag(ε, ε)`. With `scale_emittance` both coordinates are further divided
/// by `sqrt(ε)`, giving unit covariance.
///
/// # Errors
///
/// Returns an error for an odd number of coordinates or a singular plane.
pub fn normalize_2d_projections(
    points: &ArrayView2<f64>,
    scale_emittance: bool,
) -> Result<Array2<f64>> {
    let ndim = points.ncols();
    ensure_even(ndim)?;
    let cov = covariance_matrix(points)?;
    let mut normalized = Array2::zeros(points.raw_dim());
    for i in (0..ndim).step_by(2) {
        let block = diagonal_block(&cov, i);
        let params = twiss_2d(&block);
        if !(params.beta.is_finite() && params.beta > 0.0) {
            return Err(PhaseSpaceError::singular(format!(
                "covariance block of plane {} is singular",
                i / 2
            )));
        }
        let sqrt_beta = params.beta.sqrt();
        let factor = if scale_emittance {
            emittance(&block).sqrt()
        } else {
            1.0
        };
        let u = points.column(i);
        let up = points.column(i + 1);
        normalized
            .column_mut(i)
            .assign(&(&u / (sqrt_beta * factor)));
        normalized
            .column_mut(i + 1)
            .assign(&((&up * sqrt_beta + &u * (params.alpha / sqrt_beta)) / factor));
    }
    Ok(normalized)
}

/// Remove cross-plane correlations by independently permuting the rows of
/// each `(u, u')` column pair.
///
/// The distribution within each plane is unchanged.
///
/// # Errors
///
/// Returns an error for an odd number of coordinates.
pub fn decorrelate_x_y_z<R>(mut points: Array2<f64>, rng: &mut R) -> Result<Array2<f64>>
where
    R: Rng + ?Sized,
{
    let (n, ndim) = points.dim();
    ensure_even(ndim)?;
    let mut order: Vec<usize> = (0..n).collect();
    for i in (0..ndim).step_by(2) {
        order.shuffle(rng);
        let permuted = points.slice(s![.., i..i + 2]).select(Axis(0), &order);
        points.slice_mut(s![.., i..i + 2]).assign(&permuted);
    }
    Ok(points)
}

/// [`decorrelate_x_y_z`] with the thread-local generator.
///
/// # Errors
///
/// Returns an error for an odd number of coordinates.
pub fn decorrelate_x_y_z_with_thread_rng(points: Array2<f64>) -> Result<Array2<f64>> {
    decorrelate_x_y_z(points, &mut rand::thread_rng())
}

/// Select a uniformly random subset of distinct points.
///
/// # Errors
///
/// Returns an error if a fraction lies outside `[0, 1]`.
pub fn downsample<R>(points: &ArrayView2<f64>, size: DownsampleSize, rng: &mut R) -> Result<Array2<f64>>
where
    R: Rng + ?Sized,
{
    let n = points.nrows();
    let k = size.resolve(n)?;
    let indices = rand::seq::index::sample(rng, n, k).into_vec();
    Ok(points.select(Axis(0), &indices))
}

/// [`downsample`] with the thread-local generator.
///
/// # Errors
///
/// Returns an error if a fraction lies outside `[0, 1]`.
pub fn downsample_with_thread_rng(
    points: &ArrayView2<f64>,
    size: DownsampleSize,
) -> Result<Array2<f64>> {
    downsample(points, size, &mut rand::thread_rng())
}
