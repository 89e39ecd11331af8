//! Linear algebra utilities.
//!
//! Covariance matrices and transfer matrices are handled as nalgebra
//! [`DMatrix`]; point clouds and images are ndarray arrays. This module holds
//! the conversions between the two and the checked matrix operations the
//! analysis routines share.

use crate::error::{PhaseSpaceError, Result};
use nalgebra::{DMatrix, DVector, SymmetricEigen};
use ndarray::{Array2, ArrayView1, ArrayView2};

/// Relative threshold below which an eigenvalue counts as zero.
pub const SINGULAR_EPS: f64 = 1e-12;

/// Convert an ndarray matrix view to a nalgebra matrix.
#[must_use]
pub fn to_dmatrix(a: &ArrayView2<f64>) -> DMatrix<f64> {
    let (rows, cols) = a.dim();
    DMatrix::from_fn(rows, cols, |i, j| a[[i, j]])
}

/// Convert a nalgebra matrix to an owned ndarray matrix.
#[must_use]
pub fn to_array2(m: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}

/// Convert an ndarray vector view to a nalgebra vector.
#[must_use]
pub fn to_dvector(v: &ArrayView1<f64>) -> DVector<f64> {
    DVector::from_iterator(v.len(), v.iter().copied())
}

/// Require a square matrix, returning its size.
pub(crate) fn ensure_square(m: &DMatrix<f64>) -> Result<usize> {
    if m.nrows() == m.ncols() {
        Ok(m.nrows())
    } else {
        Err(PhaseSpaceError::dimension_mismatch(m.nrows(), m.ncols()))
    }
}

/// Invert a square matrix.
///
/// # Errors
///
/// Returns [`PhaseSpaceError::SingularMatrix`] if the matrix is singular or the
/// inverse is not finite.
pub fn try_inverse(m: &DMatrix<f64>, context: &str) -> Result<DMatrix<f64>> {
    ensure_square(m)?;
    let inverse = m
        .clone()
        .try_inverse()
        .ok_or_else(|| PhaseSpaceError::singular(context.to_string()))?;
    if inverse.iter().all(|v| v.is_finite()) {
        Ok(inverse)
    } else {
        Err(PhaseSpaceError::singular(context.to_string()))
    }
}

/// Principal square root of a symmetric positive-definite matrix.
///
/// # Errors
///
/// Returns an error if the matrix is not square or has a non-positive
/// eigenvalue.
pub fn sqrtm_spd(m: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let n = ensure_square(m)?;
    let eigen = SymmetricEigen::new(m.clone());
    let scale = eigen
        .eigenvalues
        .iter()
        .fold(0.0f64, |acc, v| acc.max(v.abs()));
    if eigen
        .eigenvalues
        .iter()
        .any(|&v| !(v > SINGULAR_EPS * scale.max(f64::MIN_POSITIVE)))
    {
        return Err(PhaseSpaceError::singular(
            "matrix is not positive definite",
        ));
    }
    let sqrt_vals = DMatrix::from_diagonal(&eigen.eigenvalues.map(f64::sqrt));
    let q = &eigen.eigenvectors;
    let root = q * sqrt_vals * q.transpose();
    debug_assert_eq!(root.nrows(), n);
    Ok(root)
}

/// Compute the correlation matrix from a covariance matrix: `D⁻¹ S D⁻¹`
/// with `D = sqrt(diag(S))`.
///
/// # Errors
///
/// Returns an error if any variance is zero.
pub fn cov_to_corr(cov: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let n = ensure_square(cov)?;
    let d: Vec<f64> = (0..n).map(|i| cov[(i, i)].sqrt()).collect();
    if d.iter().any(|&v| !(v > 0.0)) {
        return Err(PhaseSpaceError::singular(
            "covariance matrix has a zero variance",
        ));
    }
    Ok(DMatrix::from_fn(n, n, |i, j| cov[(i, j)] / (d[i] * d[j])))
}

/// Symmetrize an upper or lower triangular matrix: `A + Aᵀ - diag(A)`.
#[must_use]
pub fn symmetrize(m: &DMatrix<f64>) -> DMatrix<f64> {
    let diag = DMatrix::from_diagonal(&m.diagonal());
    m + m.transpose() - diag
}

/// Extract the 2x2 diagonal block starting at row/column `i`.
#[must_use]
pub fn diagonal_block(m: &DMatrix<f64>, i: usize) -> DMatrix<f64> {
    m.view((i, i), (2, 2)).into_owned()
}

/// Mahalanobis radius `sqrt(xᵀ Σ⁻¹ x)` of a single point.
#[must_use]
#[inline]
pub fn mahalanobis(point: &ArrayView1<f64>, sigma_inv: &DMatrix<f64>) -> f64 {
    let n = point.len();
    let mut total = 0.0;
    for i in 0..n {
        let mut row = 0.0;
        for j in 0..n {
            row += sigma_inv[(i, j)] * point[j];
        }
        total += point[i] * row;
    }
    total.max(0.0).sqrt()
}
