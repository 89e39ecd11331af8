//! Gaussian kernel density estimation.

use super::analysis::covariance_matrix;
use crate::error::{PhaseSpaceError, Result};
use crate::math::linalg::{mahalanobis, try_inverse};
use nalgebra::DMatrix;
use ndarray::{Array1, Array2, ArrayView2};
use std::f64::consts::PI;

/// Gaussian kernel density estimator.
///
/// The kernel covariance is the sample covariance scaled by `factor²`.
///
/// # Example
///
/// ```
/// use ndarray::array;
/// use psdist::points::GaussianKde;
///
/// let points = array![[-1.0], [0.0], [1.0]];
/// let kde = GaussianKde::new(&points.view()).unwrap();
/// let density = kde.evaluate(&array![[0.0], [5.0]].view()).unwrap();
/// assert!(density[0] > density[1]);
/// ```
#[derive(Debug, Clone)]
pub struct GaussianKde {
    dataset: Array2<f64>,
    kernel_inv: DMatrix<f64>,
    norm: f64,
    factor: f64,
}

impl GaussianKde {
    /// Scott's rule bandwidth factor `n^(-1 / (d + 4))`.
    #[must_use]
    pub fn scott_factor(n: usize, d: usize) -> f64 {
        (n as f64).powf(-1.0 / (d as f64 + 4.0))
    }

    /// Build an estimator with Scott's rule bandwidth.
    ///
    /// # Errors
    ///
    /// Returns an error if there are fewer than two points or the covariance
    /// matrix is singular.
    pub fn new(points: &ArrayView2<f64>) -> Result<Self> {
        let factor = Self::scott_factor(points.nrows(), points.ncols());
        Self::with_bandwidth(points, factor)
    }

    /// Build an estimator with an explicit bandwidth factor.
    ///
    /// # Errors
    ///
    /// Returns an error if `factor` is not positive, there are fewer than two
    /// points, or the covariance matrix is singular.
    pub fn with_bandwidth(points: &ArrayView2<f64>, factor: f64) -> Result<Self> {
        if !(factor > 0.0 && factor.is_finite()) {
            return Err(PhaseSpaceError::invalid_argument(format!(
                "bandwidth factor must be positive, got {factor}"
            )));
        }
        let (n, d) = points.dim();
        let kernel = covariance_matrix(points)? * (factor * factor);
        let kernel_inv = try_inverse(&kernel, "kernel covariance matrix")?;
        let det = kernel.determinant();
        let exp = i32::try_from(d).unwrap_or(i32::MAX);
        let norm = n as f64 * ((2.0 * PI).powi(exp) * det).sqrt();
        Ok(Self {
            dataset: points.to_owned(),
            kernel_inv,
            norm,
            factor,
        })
    }

    /// Bandwidth factor.
    #[must_use]
    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Number of coordinates.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.dataset.ncols()
    }

    /// Estimated density at each row of `points`.
    ///
    /// # Errors
    ///
    /// Returns an error if `points` does not have [`ndim`](Self::ndim)
    /// columns.
    pub fn evaluate(&self, points: &ArrayView2<f64>) -> Result<Array1<f64>> {
        if points.ncols() != self.ndim() {
            return Err(PhaseSpaceError::dimension_mismatch(
                self.ndim(),
                points.ncols(),
            ));
        }
        Ok(points.map_axis(ndarray::Axis(1), |x| {
            let total: f64 = self
                .dataset
                .rows()
                .into_iter()
                .map(|xi| {
                    let delta = &x - &xi;
                    let r = mahalanobis(&delta.view(), &self.kernel_inv);
                    (-0.5 * r * r).exp()
                })
                .sum();
            total / self.norm
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_scott_factor() {
        assert_relative_eq!(GaussianKde::scott_factor(32, 1), 0.5);
    }

    #[test]
    fn test_density_1d() {
        let points = array![[-1.0], [0.0], [1.0]];
        let kde = GaussianKde::new(&points.view()).unwrap();
        let h2 = kde.factor().powi(2);
        let gauss = |x: f64| (-0.5 * x * x / h2).exp() / (2.0 * PI * h2).sqrt();
        let expected = (gauss(-1.0) + gauss(0.0) + gauss(1.0)) / 3.0;
        let density = kde.evaluate(&array![[0.0]].view()).unwrap();
        assert_relative_eq!(density[0], expected, epsilon = 1e-12);
    }

    #[test]
    fn test_density_integrates_to_one() {
        let points = array![[0.0, 0.0], [1.0, 0.5], [-0.5, 1.0], [0.3, -0.8]];
        let kde = GaussianKde::with_bandwidth(&points.view(), 0.8).unwrap();
        let step = 0.05;
        let n = 200;
        let grid = Array2::from_shape_fn((n * n, 2), |(k, axis)| {
            let i = if axis == 0 { k / n } else { k % n };
            -5.0 + step * (i as f64 + 0.5)
        });
        let total = kde.evaluate(&grid.view()).unwrap().sum() * step * step;
        assert_relative_eq!(total, 1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_errors() {
        let points = array![[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]];
        assert!(GaussianKde::new(&points.view()).is_err());
        let points = array![[0.0], [1.0]];
        assert!(GaussianKde::with_bandwidth(&points.view(), 0.0).is_err());
        let kde = GaussianKde::new(&points.view()).unwrap();
        assert!(kde.evaluate(&array![[0.0, 1.0]].view()).is_err());
    }
}
