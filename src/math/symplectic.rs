//! Symplectic eigen-analysis of phase-space covariance matrices.
//!
//! For a `2n x 2n` covariance matrix `S` and the unit symplectic matrix `U`,
//! the eigenvalues of `S·U` come in conjugate pairs `∓iε_k`, one pair per
//! mode, where `ε_k` are the intrinsic emittances. Normalizing the
//! eigenvectors so that `Im(v† U v) = -2` (Lebedev–Bogacz convention) makes
//! the matrix `V = [Re v_1, -Im v_1, Re v_2, -Im v_2, ...]` real and
//! symplectic, and `V⁻¹ S V⁻ᵀ = diag(ε_1, ε_1, ε_2, ε_2, ...)`.
//!
//! `S·U` is not symmetric, so the decomposition goes through the real
//! skew-symmetric matrix `A = S^½ U S^½`, which is similar to `S·U`. Modes
//! are extracted from the symmetric eigen-decomposition of `AᵀA`, which
//! carries each `ε_k²` twice.

use crate::error::{ensure_even, PhaseSpaceError, Result};
use crate::math::linalg::{ensure_square, sqrtm_spd, try_inverse};
use nalgebra::{DMatrix, DVector, SymmetricEigen};
use num_complex::Complex64;

/// Tolerance used when deflating already-extracted modes.
const DEFLATION_EPS: f64 = 1e-8;

/// Build the `d x d` unit symplectic matrix: block-diagonal with 2x2 blocks
/// `[[0, 1], [-1, 0]]`.
///
/// # Errors
///
/// Returns [`PhaseSpaceError::OddDimension`] if `d` is odd.
///
/// # Example
///
/// ```
/// use psdist::math::unit_symplectic_matrix;
///
/// let u = unit_symplectic_matrix(4).unwrap();
/// assert_eq!(u[(0, 1)], 1.0);
/// assert_eq!(u[(1, 0)], -1.0);
/// assert_eq!(u[(2, 3)], 1.0);
/// ```
pub fn unit_symplectic_matrix(d: usize) -> Result<DMatrix<f64>> {
    ensure_even(d)?;
    let mut u = DMatrix::zeros(d, d);
    for i in (0..d).step_by(2) {
        u[(i, i + 1)] = 1.0;
        u[(i + 1, i)] = -1.0;
    }
    Ok(u)
}

/// Eigen-decomposition of `S·U`.
#[derive(Debug, Clone)]
pub struct SymplecticEigen {
    /// Eigenvalues, ordered `[-iε_1, +iε_1, -iε_2, +iε_2, ...]`.
    pub eigenvalues: Vec<Complex64>,

    /// Eigenvectors as columns, paired per plane: column `2k` is `v_k` and
    /// column `2k + 1` is its complex conjugate.
    pub eigenvectors: DMatrix<Complex64>,

    /// Intrinsic emittance of each mode, in plane order.
    pub emittances: Vec<f64>,
}

/// Compute the eigenvalues and eigenvectors of `S·U`.
///
/// Modes are assigned to planes by where their eigenvector carries most of
/// its weight, so an uncoupled matrix yields its modes in plane order.
///
/// # Errors
///
/// Returns an error if `S` is not square, has odd dimension, or is not
/// positive definite.
pub fn symplectic_eigen(s: &DMatrix<f64>) -> Result<SymplecticEigen> {
    let d = ensure_square(s)?;
    ensure_even(d)?;
    if d == 0 {
        return Err(PhaseSpaceError::empty_input("covariance matrix is empty"));
    }
    let n_modes = d / 2;

    let root = sqrtm_spd(s)?;
    let u = unit_symplectic_matrix(d)?;
    let a = &root * &u * &root;
    let ata = a.transpose() * &a;

    let eigen = SymmetricEigen::new(ata);
    let mut order: Vec<usize> = (0..d).collect();
    order.sort_by(|&i, &j| {
        eigen.eigenvalues[j]
            .partial_cmp(&eigen.eigenvalues[i])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Each mode spans {e, f} with A e = ε f and A f = -ε e.
    let mut basis: Vec<DVector<f64>> = Vec::with_capacity(d);
    let mut modes: Vec<(f64, DVector<f64>, DVector<f64>)> = Vec::with_capacity(n_modes);
    for &idx in &order {
        if modes.len() == n_modes {
            break;
        }
        let mut e: DVector<f64> = eigen.eigenvectors.column(idx).into_owned();
        for _ in 0..2 {
            for b in &basis {
                let proj = b.dot(&e);
                e -= b * proj;
            }
        }
        let norm = e.norm();
        if norm < DEFLATION_EPS {
            continue;
        }
        e /= norm;
        let ae = &a * &e;
        let eps = ae.norm();
        if !(eps > 0.0) || !eps.is_finite() {
            return Err(PhaseSpaceError::singular(
                "covariance matrix has a zero-emittance mode",
            ));
        }
        let f = ae / eps;
        basis.push(e.clone());
        basis.push(f.clone());
        modes.push((eps, e, f));
    }
    if modes.len() != n_modes {
        return Err(PhaseSpaceError::linalg(format!(
            "found {} of {} symplectic modes",
            modes.len(),
            n_modes
        )));
    }

    // Eigenvectors of S·U: v = S^½ (e + i f), eigenvalue -iε.
    let vectors: Vec<DVector<Complex64>> = modes
        .iter()
        .map(|(_, e, f)| {
            let re = &root * e;
            let im = &root * f;
            DVector::from_fn(d, |r, _| Complex64::new(re[r], im[r]))
        })
        .collect();

    let assignment = assign_planes(&vectors);

    let mut eigenvectors = DMatrix::from_element(d, d, Complex64::new(0.0, 0.0));
    let mut eigenvalues = vec![Complex64::new(0.0, 0.0); d];
    let mut emittances = vec![0.0; n_modes];
    for (mode, &plane) in assignment.iter().enumerate() {
        let eps = modes[mode].0;
        let v = &vectors[mode];
        for r in 0..d {
            eigenvectors[(r, 2 * plane)] = v[r];
            eigenvectors[(r, 2 * plane + 1)] = v[r].conj();
        }
        eigenvalues[2 * plane] = Complex64::new(0.0, -eps);
        eigenvalues[2 * plane + 1] = Complex64::new(0.0, eps);
        emittances[plane] = eps;
    }

    Ok(SymplecticEigen {
        eigenvalues,
        eigenvectors,
        emittances,
    })
}

/// Greedy mode-to-plane assignment by fraction of eigenvector weight in
/// each plane. Returns the plane index of each mode.
fn assign_planes(vectors: &[DVector<Complex64>]) -> Vec<usize> {
    let n_modes = vectors.len();
    let mut affinity: Vec<(f64, usize, usize)> = Vec::with_capacity(n_modes * n_modes);
    for (mode, v) in vectors.iter().enumerate() {
        let total: f64 = v.iter().map(|c| c.norm_sqr()).sum();
        for plane in 0..n_modes {
            let weight = v[2 * plane].norm_sqr() + v[2 * plane + 1].norm_sqr();
            affinity.push((weight / total, mode, plane));
        }
    }
    affinity.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut plane_of = vec![usize::MAX; n_modes];
    let mut taken = vec![false; n_modes];
    for (_, mode, plane) in affinity {
        if plane_of[mode] == usize::MAX && !taken[plane] {
            plane_of[mode] = plane;
            taken[plane] = true;
        }
    }
    plane_of
}

/// `Im(v† U v)` for column `col` of `eigvecs`.
fn symplectic_imag(eigvecs: &DMatrix<Complex64>, u: &DMatrix<f64>, col: usize) -> f64 {
    let d = eigvecs.nrows();
    let mut total = Complex64::new(0.0, 0.0);
    for i in 0..d {
        let mut uv = Complex64::new(0.0, 0.0);
        for j in 0..d {
            uv += eigvecs[(j, col)] * u[(i, j)];
        }
        total += eigvecs[(i, col)].conj() * uv;
    }
    total.im
}

/// Normalize paired eigenvectors of `S·U` to the Lebedev–Bogacz convention.
///
/// For each pair of columns `(2k, 2k + 1)`:
///
/// 1. If `Im(v† U v) > 0` for column `2k`, the two columns are swapped.
/// 2. Both columns are scaled by `sqrt(2 / |Im(v† U v)|)`.
/// 3. The pair is rotated in phase so that the plane's position component of
///    column `2k` is real and non-negative.
///
/// # Errors
///
/// Returns an error if the matrix is not square with even dimension, or if a
/// pair has vanishing symplectic norm.
pub fn normalize_eigvecs(eigvecs: &DMatrix<Complex64>) -> Result<DMatrix<Complex64>> {
    let d = eigvecs.nrows();
    if eigvecs.ncols() != d {
        return Err(PhaseSpaceError::dimension_mismatch(d, eigvecs.ncols()));
    }
    let u = unit_symplectic_matrix(d)?;
    let mut v = eigvecs.clone();

    for i in (0..d).step_by(2) {
        let mut val = symplectic_imag(&v, &u, i);
        if val > 0.0 {
            v.swap_columns(i, i + 1);
            val = symplectic_imag(&v, &u, i);
        }
        if !(val.abs() > f64::EPSILON) {
            return Err(PhaseSpaceError::singular(format!(
                "eigenvector pair {} has zero symplectic norm",
                i / 2
            )));
        }
        let factor = (2.0 / val.abs()).sqrt();

        let reference = if v[(i, i)].norm() > DEFLATION_EPS {
            v[(i, i)]
        } else {
            v[(i + 1, i)]
        };
        let phase = Complex64::from_polar(1.0, -reference.arg());

        for r in 0..d {
            v[(r, i)] *= phase * factor;
            v[(r, i + 1)] *= phase.conj() * factor;
        }
    }
    Ok(v)
}

/// Build `V⁻¹` from normalized eigenvectors.
///
/// Column `2k` of `V` is `Re(v_k)` and column `2k + 1` is `Re(i v_k)`.
///
/// # Errors
///
/// Returns an error if the resulting `V` is singular.
pub fn normalization_matrix_from_eigvecs(eigvecs: &DMatrix<Complex64>) -> Result<DMatrix<f64>> {
    let d = eigvecs.nrows();
    ensure_even(eigvecs.ncols())?;
    let mut v = DMatrix::zeros(d, eigvecs.ncols());
    for i in (0..eigvecs.ncols()).step_by(2) {
        for r in 0..d {
            let z = eigvecs[(r, i)];
            v[(r, i)] = z.re;
            v[(r, i + 1)] = (Complex64::i() * z).re;
        }
    }
    try_inverse(&v, "normalization matrix from eigenvectors")
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn coupled_cov() -> DMatrix<f64> {
        DMatrix::from_row_slice(
            4,
            4,
            &[
                10.0, -2.0, 1.5, 0.3, //
                -2.0, 1.0, 0.2, 0.1, //
                1.5, 0.2, 6.0, 1.0, //
                0.3, 0.1, 1.0, 0.8,
            ],
        )
    }

    #[test]
    fn test_unit_symplectic_matrix() {
        let u = unit_symplectic_matrix(4).unwrap();
        let expected = DMatrix::from_row_slice(
            4,
            4,
            &[
                0.0, 1.0, 0.0, 0.0, //
                -1.0, 0.0, 0.0, 0.0, //
                0.0, 0.0, 0.0, 1.0, //
                0.0, 0.0, -1.0, 0.0,
            ],
        );
        assert_eq!(u, expected);
        assert!(matches!(
            unit_symplectic_matrix(3),
            Err(PhaseSpaceError::OddDimension { dim: 3 })
        ));
    }

    #[test]
    fn test_eigenpairs_of_su() {
        let s = coupled_cov();
        let u = unit_symplectic_matrix(4).unwrap();
        let su = &s * &u;
        let eig = symplectic_eigen(&s).unwrap();
        let su_c = su.map(|x| Complex64::new(x, 0.0));
        for k in 0..4 {
            let v = eig.eigenvectors.column(k).into_owned();
            let lhs = &su_c * &v;
            let rhs = &v * eig.eigenvalues[k];
            for r in 0..4 {
                assert_relative_eq!(lhs[r].re, rhs[r].re, epsilon = 1e-9);
                assert_relative_eq!(lhs[r].im, rhs[r].im, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_uncoupled_modes_in_plane_order() {
        // eps_y > eps_x: modes must still come out as (x, y)
        let s = DMatrix::from_row_slice(
            4,
            4,
            &[
                2.0, 0.0, 0.0, 0.0, //
                0.0, 0.5, 0.0, 0.0, //
                0.0, 0.0, 9.0, 0.0, //
                0.0, 0.0, 0.0, 4.0,
            ],
        );
        let eig = symplectic_eigen(&s).unwrap();
        assert_relative_eq!(eig.emittances[0], 1.0, epsilon = 1e-10);
        assert_relative_eq!(eig.emittances[1], 6.0, epsilon = 1e-10);
    }

    #[test]
    fn test_normalization_diagonalizes() {
        let s = coupled_cov();
        let eig = symplectic_eigen(&s).unwrap();
        let normalized = normalize_eigvecs(&eig.eigenvectors).unwrap();
        let v_inv = normalization_matrix_from_eigvecs(&normalized).unwrap();
        let sn = &v_inv * &s * v_inv.transpose();
        for i in 0..4 {
            for j in 0..4 {
                let expected = if i == j { eig.emittances[i / 2] } else { 0.0 };
                assert_relative_eq!(sn[(i, j)], expected, epsilon = 1e-9);
            }
        }

        // V is symplectic: Vᵀ U V = U
        let v = try_inverse(&v_inv, "test").unwrap();
        let u = unit_symplectic_matrix(4).unwrap();
        let vuv = v.transpose() * &u * &v;
        for (a, b) in vuv.iter().zip(u.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_normalize_swaps_pair() {
        let s = DMatrix::from_row_slice(2, 2, &[4.0, 0.0, 0.0, 1.0]);
        let eig = symplectic_eigen(&s).unwrap();
        let mut swapped = eig.eigenvectors.clone();
        swapped.swap_columns(0, 1);
        let a = normalize_eigvecs(&eig.eigenvectors).unwrap();
        let b = normalize_eigvecs(&swapped).unwrap();
        for (x, y) in a.iter().zip(b.iter()) {
            assert_relative_eq!(x.re, y.re, epsilon = 1e-12);
            assert_relative_eq!(x.im, y.im, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_singular_covariance_fails() {
        let s = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        assert!(symplectic_eigen(&s).is_err());
    }
}
