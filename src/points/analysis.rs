//! Statistical analysis of point clouds.

use super::check_axes;
use super::transform::project;
use crate::config::{FitConfig, LimitsConfig};
use crate::cov::{normalization_matrix_from_twiss_2d, twiss_2d, Twiss};
use crate::error::{PhaseSpaceError, Result};
use crate::math::linalg::{cov_to_corr, mahalanobis, to_dmatrix, try_inverse};
use crate::math::optimize::{minimize, SimplexOptions};
use nalgebra::DMatrix;
use ndarray::{Array1, ArrayView2, Axis};

/// Mean of each coordinate.
///
/// # Errors
///
/// Returns an error if there are no points.
pub fn centroid(points: &ArrayView2<f64>) -> Result<Array1<f64>> {
    points
        .mean_axis(Axis(0))
        .ok_or_else(|| PhaseSpaceError::empty_input("centroid of an empty point cloud"))
}

/// Unbiased sample covariance matrix (normalized by `n - 1`).
///
/// # Errors
///
/// Returns an error if there are fewer than two points.
pub fn covariance_matrix(points: &ArrayView2<f64>) -> Result<DMatrix<f64>> {
    let n = points.nrows();
    if n < 2 {
        return Err(PhaseSpaceError::empty_input(
            "at least two points are needed for a covariance matrix",
        ));
    }
    let mean = centroid(points)?;
    let centered = points - &mean;
    let cov = centered.t().dot(&centered) / (n - 1) as f64;
    Ok(to_dmatrix(&cov.view()))
}

/// Correlation matrix of the point cloud.
///
/// # Errors
///
/// Returns an error if there are fewer than two points or a coordinate has
/// zero variance.
pub fn correlation_matrix(points: &ArrayView2<f64>) -> Result<DMatrix<f64>> {
    cov_to_corr(&covariance_matrix(points)?)
}

/// Euclidean norm of each point.
#[must_use]
pub fn get_radii(points: &ArrayView2<f64>) -> Array1<f64> {
    points.map_axis(Axis(1), |row| row.dot(&row).sqrt())
}

/// Radius `sqrt(xᵀ Σ⁻¹ x)` of each point, where `Σ` is the covariance
/// matrix of the cloud itself.
///
/// # Errors
///
/// Returns an error if the covariance matrix is singular.
pub fn get_ellipsoid_radii(points: &ArrayView2<f64>) -> Result<Array1<f64>> {
    let sigma = covariance_matrix(points)?;
    let sigma_inv = try_inverse(&sigma, "point cloud covariance matrix")?;
    Ok(points.map_axis(Axis(1), |row| mahalanobis(&row, &sigma_inv)))
}

/// Round half to even, so that `n * fraction` ties pick the lower even rank.
fn round_half_even(x: f64) -> f64 {
    let r = x.round();
    if (x - x.trunc()).abs() == 0.5 && r % 2.0 != 0.0 {
        r - x.signum()
    } else {
        r
    }
}

/// Nearest-rank quantile: the radius at rank `round(n * fraction)`, counted
/// from one, with ties rounded to even. Ranks below one are clamped to the
/// smallest radius.
fn nearest_rank(radii: Array1<f64>, fraction: f64) -> Result<f64> {
    if !(fraction > 0.0 && fraction <= 1.0) {
        return Err(PhaseSpaceError::invalid_argument(format!(
            "fraction must lie in (0, 1], got {fraction}"
        )));
    }
    let mut radii = radii.to_vec();
    if radii.is_empty() {
        return Err(PhaseSpaceError::empty_input("no points to enclose"));
    }
    radii.sort_by(f64::total_cmp);
    let n = radii.len();
    let rank = (round_half_even(n as f64 * fraction) as usize).clamp(1, n);
    Ok(radii[rank - 1])
}

/// Radius of the origin-centered sphere containing `fraction` of the points.
///
/// With `axis`, the sphere is defined in that projection. `fraction = 1`
/// returns the largest radius.
///
/// # Errors
///
/// Returns an error if `fraction` is outside `(0, 1]`, the cloud is empty, or
/// an axis is out of range.
pub fn enclosing_sphere_radius(
    points: &ArrayView2<f64>,
    axis: Option<&[usize]>,
    fraction: f64,
) -> Result<f64> {
    let radii = match axis {
        Some(axis) => get_radii(&project(points, axis)?.view()),
        None => get_radii(points),
    };
    nearest_rank(radii, fraction)
}

/// Scale of the rms ellipsoid containing `fraction` of the points.
///
/// # Errors
///
/// Returns an error if `fraction` is outside `(0, 1]`, the covariance matrix
/// is singular, or an axis is out of range.
pub fn enclosing_ellipsoid_radius(
    points: &ArrayView2<f64>,
    axis: Option<&[usize]>,
    fraction: f64,
) -> Result<f64> {
    let radii = match axis {
        Some(axis) => get_ellipsoid_radii(&project(points, axis)?.view())?,
        None => get_ellipsoid_radii(points)?,
    };
    nearest_rank(radii, fraction)
}

/// Minimum-area origin-centered ellipse enclosing a 2D point cloud.
#[derive(Debug, Clone)]
pub struct BoundingEllipse {
    /// Normalization matrix `V` of the ellipse: maps the circle of
    /// [`radius`](Self::radius) onto the ellipse.
    pub v: DMatrix<f64>,
    /// Shape of the ellipse. The emittance is `radius²`, so the ellipse is
    /// `xᵀ Σ⁻¹ x = 1` with `Σ = twiss.covariance()`.
    pub twiss: Twiss,
    /// Largest normalized radius over all points.
    pub radius: f64,
    /// Optimizer iterations used.
    pub iterations: usize,
}

/// Largest radius of the points after normalization by `(alpha, beta)`.
fn max_normalized_radius(points: &ArrayView2<f64>, alpha: f64, beta: f64) -> f64 {
    if !(beta > 0.0) {
        return f64::INFINITY;
    }
    let sqrt_beta = beta.sqrt();
    points
        .rows()
        .into_iter()
        .map(|row| {
            let u = row[0] / sqrt_beta;
            let up = (alpha * row[0] + beta * row[1]) / sqrt_beta;
            u.hypot(up)
        })
        .fold(0.0, f64::max)
}

/// Find the minimum-area origin-centered ellipse containing every point of a
/// 2D cloud.
///
/// The search runs over Twiss parameters `(alpha, beta)`, minimizing the
/// largest normalized radius, starting from the Twiss parameters of the
/// sample covariance. `beta` is bounded below by `config.min_beta`.
///
/// # Errors
///
/// Returns an error if the cloud is not two-dimensional, its covariance is
/// singular, or the optimizer does not converge.
pub fn find_min_volume_bounding_ellipse(
    points: &ArrayView2<f64>,
    config: &FitConfig,
) -> Result<BoundingEllipse> {
    config.validate()?;
    if points.ncols() != 2 {
        return Err(PhaseSpaceError::dimension_mismatch(2, points.ncols()));
    }
    let guess = twiss_2d(&covariance_matrix(points)?);
    if !(guess.beta.is_finite() && guess.alpha.is_finite() && guess.beta > 0.0) {
        return Err(PhaseSpaceError::singular(
            "covariance matrix of the point cloud is singular",
        ));
    }
    tracing::debug!(
        n_points = points.nrows(),
        alpha = guess.alpha,
        beta = guess.beta,
        "fitting bounding ellipse"
    );

    let options = SimplexOptions {
        max_iterations: config.max_iterations,
        x_tolerance: config.x_tolerance,
        f_tolerance: config.f_tolerance,
        initial_step: config.initial_step,
    };
    let bounds = [
        (f64::NEG_INFINITY, f64::INFINITY),
        (config.min_beta, f64::INFINITY),
    ];
    let min = minimize(
        |x| max_normalized_radius(points, x[0], x[1]),
        &[guess.alpha, guess.beta],
        &bounds,
        &options,
    )?;

    let (alpha, beta) = (min.x[0], min.x[1]);
    let v_inv = normalization_matrix_from_twiss_2d(alpha, beta)?;
    let v = try_inverse(&v_inv, "bounding ellipse normalization matrix")?;
    let radius = max_normalized_radius(points, alpha, beta);
    tracing::debug!(alpha, beta, radius, iterations = min.iterations, "bounding ellipse found");
    Ok(BoundingEllipse {
        v,
        twiss: Twiss::new(alpha, beta, radius * radius),
        radius,
        iterations: min.iterations,
    })
}

/// Compute per-axis `(min, max)` limits for binning or plotting.
///
/// Limits are the data range, or `mean ± rms * std` (population standard
/// deviation) when `config.rms` is set. Each range is then padded by
/// `pad * |max - min| / 2` on both sides, unioned within each `share` group,
/// and finally made symmetric about zero if `zero_center` is set.
///
/// # Errors
///
/// Returns an error if the cloud is empty, the configuration is invalid, or
/// a shared axis is out of range.
pub fn get_limits(points: &ArrayView2<f64>, config: &LimitsConfig) -> Result<Vec<(f64, f64)>> {
    config.validate()?;
    let ndim = points.ncols();
    if points.nrows() == 0 {
        return Err(PhaseSpaceError::empty_input("limits of an empty point cloud"));
    }

    let mut limits: Vec<(f64, f64)> = match config.rms {
        None => points
            .columns()
            .into_iter()
            .map(|col| {
                col.iter()
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                        (lo.min(v), hi.max(v))
                    })
            })
            .collect(),
        Some(rms) => {
            let means = centroid(points)?;
            let stds = points.std_axis(Axis(0), 0.0);
            means
                .iter()
                .zip(stds.iter())
                .map(|(&m, &s)| (m - rms * s, m + rms * s))
                .collect()
        }
    };

    for (lo, hi) in &mut limits {
        let padding = 0.5 * (*hi - *lo).abs() * config.pad;
        *lo -= padding;
        *hi += padding;
    }

    for group in &config.share {
        check_axes(group, ndim)?;
        let lo = group.iter().map(|&i| limits[i].0).fold(f64::INFINITY, f64::min);
        let hi = group
            .iter()
            .map(|&i| limits[i].1)
            .fold(f64::NEG_INFINITY, f64::max);
        for &i in group {
            limits[i] = (lo, hi);
        }
    }

    if config.zero_center {
        for (lo, hi) in &mut limits {
            let m = lo.abs().max(hi.abs());
            *lo = -m;
            *hi = m;
        }
    }
    Ok(limits)
}
