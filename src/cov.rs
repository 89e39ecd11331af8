//! Covariance matrix analysis.
//!
//! Pure functions over `2n x 2n` phase-space covariance matrices ordered
//! `{x, x', y, y', z, z', ...}`: Twiss parameters, apparent and intrinsic
//! emittances, symplectic normalization matrices and rms ellipse geometry.
//!
//! # Example
//!
//! ```
//! use nalgebra::DMatrix;
//! use psdist::cov::{twiss, normalization_matrix};
//! use psdist::config::NormalizationOptions;
//!
//! let s = DMatrix::from_row_slice(2, 2, &[4.0, 0.0, 0.0, 1.0]);
//! let params = twiss(&s).unwrap();
//! assert_eq!(params[0].emittance, 2.0);
//! assert_eq!(params[0].beta, 2.0);
//!
//! let v_inv = normalization_matrix(&s, NormalizationOptions::new()).unwrap();
//! let sn = &v_inv * &s * v_inv.transpose();
//! assert!((sn[(0, 0)] - 2.0).abs() < 1e-12);
//! ```

use crate::config::NormalizationOptions;
use crate::error::{ensure_even, PhaseSpaceError, Result};
use crate::math::linalg::{diagonal_block, ensure_square, try_inverse};
use crate::math::symplectic::{
    normalization_matrix_from_eigvecs, normalize_eigvecs, symplectic_eigen, unit_symplectic_matrix,
};
use nalgebra::DMatrix;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub use crate::math::linalg::cov_to_corr;

/// Twiss parameters and rms emittance of one phase-space plane.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Twiss {
    /// Correlation parameter `-<uu'> / ε`.
    pub alpha: f64,
    /// Envelope parameter `<uu> / ε`.
    pub beta: f64,
    /// rms emittance `sqrt(det(Σ))`.
    pub emittance: f64,
}

impl Twiss {
    /// Create a new set of Twiss parameters.
    #[must_use]
    pub const fn new(alpha: f64, beta: f64, emittance: f64) -> Self {
        Self {
            alpha,
            beta,
            emittance,
        }
    }

    /// The dependent parameter `gamma = (1 + alpha²) / beta`.
    #[must_use]
    pub fn gamma(&self) -> f64 {
        (1.0 + self.alpha * self.alpha) / self.beta
    }

    /// The 2x2 covariance matrix `ε [[β, -α], [-α, γ]]` described by these
    /// parameters.
    #[must_use]
    pub fn covariance(&self) -> DMatrix<f64> {
        let eps = self.emittance;
        DMatrix::from_row_slice(
            2,
            2,
            &[
                eps * self.beta,
                -eps * self.alpha,
                -eps * self.alpha,
                eps * self.gamma(),
            ],
        )
    }
}

/// rms emittance of a 2x2 covariance block: `sqrt(det(Σ))`.
///
/// Uses the top-left 2x2 block of `s`.
#[must_use]
pub fn emittance(s: &DMatrix<f64>) -> f64 {
    (s[(0, 0)] * s[(1, 1)] - s[(0, 1)] * s[(1, 0)]).sqrt()
}

/// Twiss parameters of a 2x2 covariance matrix.
///
/// ```text
/// ε = sqrt(<uu><u'u'> - <uu'>²)
/// β = <uu> / ε
/// α = -<uu'> / ε
/// ```
///
/// A singular block produces non-finite values; no error is raised.
#[must_use]
pub fn twiss_2d(s: &DMatrix<f64>) -> Twiss {
    let eps = emittance(s);
    Twiss {
        alpha: -s[(0, 1)] / eps,
        beta: s[(0, 0)] / eps,
        emittance: eps,
    }
}

/// Twiss parameters of each 2x2 diagonal block, in plane order.
///
/// # Errors
///
/// Returns an error if `s` is not square with even dimension.
pub fn twiss(s: &DMatrix<f64>) -> Result<Vec<Twiss>> {
    let d = ensure_square(s)?;
    ensure_even(d)?;
    Ok((0..d)
        .step_by(2)
        .map(|i| twiss_2d(&diagonal_block(s, i)))
        .collect())
}

/// rms apparent (projected) emittance of each plane.
///
/// # Errors
///
/// Returns an error if `s` is not square with even dimension.
pub fn apparent_emittances(s: &DMatrix<f64>) -> Result<Vec<f64>> {
    let d = ensure_square(s)?;
    ensure_even(d)?;
    Ok((0..d)
        .step_by(2)
        .map(|i| emittance(&diagonal_block(s, i)))
        .collect())
}

/// Alias of [`apparent_emittances`].
///
/// # Errors
///
/// See [`apparent_emittances`].
pub fn projected_emittances(s: &DMatrix<f64>) -> Result<Vec<f64>> {
    apparent_emittances(s)
}

/// rms intrinsic (eigen) emittances.
///
/// For a 2x2 matrix this is the single emittance `sqrt(det(S))`. For 4x4 the
/// two eigen-emittances follow analytically from `tr((SU)²)` and `det(S)`:
///
/// ```text
/// ε_{1,2} = ½ sqrt(-tr((SU)²) ± sqrt(tr((SU)²)² - 16 det(S)))
/// ```
///
/// The analytic solution does not extend past four dimensions.
///
/// # Errors
///
/// Returns [`PhaseSpaceError::UnsupportedDimension`] for more than four
/// dimensions and [`PhaseSpaceError::OddDimension`] for odd ones.
pub fn intrinsic_emittances(s: &DMatrix<f64>) -> Result<Vec<f64>> {
    let d = ensure_square(s)?;
    ensure_even(d)?;
    match d {
        0 => Err(PhaseSpaceError::empty_input("covariance matrix is empty")),
        2 => Ok(vec![emittance(s)]),
        4 => {
            let u = unit_symplectic_matrix(4)?;
            let su = s * u;
            let tr_su2 = (&su * &su).trace();
            let det_s = s.determinant();
            let mut disc = tr_su2 * tr_su2 - 16.0 * det_s;
            if disc < 0.0 {
                tracing::warn!(disc, "negative discriminant in intrinsic emittances, clamping");
                disc = 0.0;
            }
            let root = disc.sqrt();
            let eps_1 = 0.5 * (-tr_su2 + root).max(0.0).sqrt();
            let eps_2 = 0.5 * (-tr_su2 - root).max(0.0).sqrt();
            Ok(vec![eps_1, eps_2])
        }
        _ => Err(PhaseSpaceError::unsupported_dimension(d, 4)),
    }
}

/// Alias of [`intrinsic_emittances`].
///
/// # Errors
///
/// See [`intrinsic_emittances`].
pub fn eigen_emittances(s: &DMatrix<f64>) -> Result<Vec<f64>> {
    intrinsic_emittances(s)
}

/// A normalization matrix together with its inverse.
#[derive(Debug, Clone)]
pub struct NormalizationMatrix {
    /// `V`: maps normalized coordinates back to physical ones.
    pub v: DMatrix<f64>,
    /// `V⁻¹`: maps physical coordinates to normalized ones.
    pub v_inv: DMatrix<f64>,
    /// Emittance of each normalized plane, in plane order.
    pub emittances: Vec<f64>,
}

impl NormalizationMatrix {
    /// Covariance matrix in normalized coordinates: `V⁻¹ S V⁻ᵀ`.
    #[must_use]
    pub fn normalize_cov(&self, s: &DMatrix<f64>) -> DMatrix<f64> {
        &self.v_inv * s * self.v_inv.transpose()
    }
}

fn coupled_normalization(s: &DMatrix<f64>, scale: bool) -> Result<NormalizationMatrix> {
    let eigen = symplectic_eigen(s)?;
    let eigvecs = normalize_eigvecs(&eigen.eigenvectors)?;
    let mut v_inv = normalization_matrix_from_eigvecs(&eigvecs)?;
    let mut v = try_inverse(&v_inv, "normalization matrix")?;
    if scale {
        for (plane, &eps) in eigen.emittances.iter().enumerate() {
            let factor = eps.sqrt();
            for col in [2 * plane, 2 * plane + 1] {
                v.column_mut(col).scale_mut(factor);
            }
        }
        v_inv = try_inverse(&v, "scaled normalization matrix")?;
    }
    Ok(NormalizationMatrix {
        v,
        v_inv,
        emittances: eigen.emittances,
    })
}

/// Compute the normalization matrix of `s` together with its inverse.
///
/// In coupled mode the eigenvectors of `S·U` diagonalize the full matrix,
/// removing cross-plane correlations. In block-diagonal mode each 2x2
/// diagonal block is normalized on its own and cross-plane blocks of the
/// result are zero. With `scale`, `V` is multiplied by
/// `sqrt(diag(ε_1, ε_1, ε_2, ε_2, ...))` so every normalized plane has unit
/// covariance.
///
/// # Errors
///
/// Returns an error if `s` has odd dimension or is not positive definite.
pub fn normalization(
    s: &DMatrix<f64>,
    options: NormalizationOptions,
) -> Result<NormalizationMatrix> {
    let d = ensure_square(s)?;
    ensure_even(d)?;
    tracing::debug!(
        dim = d,
        scale = options.scale,
        block_diag = options.block_diag,
        "computing normalization matrix"
    );

    if !options.block_diag {
        return coupled_normalization(s, options.scale);
    }

    let mut v = DMatrix::identity(d, d);
    let mut v_inv = DMatrix::identity(d, d);
    let mut emittances = Vec::with_capacity(d / 2);
    for i in (0..d).step_by(2) {
        let block = coupled_normalization(&diagonal_block(s, i), options.scale)?;
        v.view_mut((i, i), (2, 2)).copy_from(&block.v);
        v_inv.view_mut((i, i), (2, 2)).copy_from(&block.v_inv);
        emittances.extend(block.emittances);
    }
    Ok(NormalizationMatrix {
        v,
        v_inv,
        emittances,
    })
}

/// Compute the normalization matrix `V⁻¹` of `s`.
///
/// See [`normalization`] for the meaning of the options.
///
/// # Errors
///
/// Returns an error if `s` has odd dimension or is not positive definite.
pub fn normalization_matrix(
    s: &DMatrix<f64>,
    options: NormalizationOptions,
) -> Result<DMatrix<f64>> {
    normalization(s, options).map(|n| n.v_inv)
}

/// Geometry of a projected rms ellipse.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RmsEllipse {
    /// First semi-axis width.
    pub c1: f64,
    /// Second semi-axis width.
    pub c2: f64,
    /// Tilt angle below the first axis [radians].
    pub angle: f64,
}

/// Semi-axes and tilt of the rms ellipse of `s` projected onto two axes.
///
/// `axis` defaults to `(0, 1)`.
///
/// # Errors
///
/// Returns an error if an axis is out of range.
pub fn rms_ellipse_params(s: &DMatrix<f64>, axis: Option<(usize, usize)>) -> Result<RmsEllipse> {
    let d = ensure_square(s)?;
    let (i, j) = axis.unwrap_or((0, 1));
    for a in [i, j] {
        if a >= d {
            return Err(PhaseSpaceError::invalid_axis(a, d));
        }
    }
    let sii = s[(i, i)];
    let sjj = s[(j, j)];
    let sij = s[(i, j)];
    let angle = -0.5 * (2.0 * sij).atan2(sii - sjj);
    let (sin, cos) = angle.sin_cos();
    let (sin2, cos2) = (sin * sin, cos * cos);
    let c1 = (sii * cos2 + sjj * sin2 - 2.0 * sij * sin * cos).abs().sqrt();
    let c2 = (sii * sin2 + sjj * cos2 + 2.0 * sij * sin * cos).abs().sqrt();
    Ok(RmsEllipse { c1, c2, angle })
}

/// 2x2 normalization matrix `V⁻¹` from Twiss parameters, where
/// `V = [[β, 0], [-α, 1]] / sqrt(β)`.
///
/// # Errors
///
/// Returns an error if `beta` is not positive.
pub fn normalization_matrix_from_twiss_2d(alpha: f64, beta: f64) -> Result<DMatrix<f64>> {
    if !(beta > 0.0) {
        return Err(PhaseSpaceError::invalid_argument(format!(
            "beta must be positive, got {beta}"
        )));
    }
    let sqrt_beta = beta.sqrt();
    Ok(DMatrix::from_row_slice(
        2,
        2,
        &[1.0 / sqrt_beta, 0.0, alpha / sqrt_beta, sqrt_beta],
    ))
}

/// Block-diagonal normalization matrix `V⁻¹` from per-plane Twiss
/// parameters. Emittances are ignored.
///
/// # Errors
///
/// Returns an error if no parameters are given or any beta is not positive.
pub fn normalization_matrix_from_twiss(params: &[Twiss]) -> Result<DMatrix<f64>> {
    if params.is_empty() {
        return Err(PhaseSpaceError::empty_input("no Twiss parameters given"));
    }
    let d = 2 * params.len();
    let mut v_inv = DMatrix::zeros(d, d);
    for (plane, p) in params.iter().enumerate() {
        let block = normalization_matrix_from_twiss_2d(p.alpha, p.beta)?;
        v_inv
            .view_mut((2 * plane, 2 * plane), (2, 2))
            .copy_from(&block);
    }
    Ok(v_inv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cov_4d() -> DMatrix<f64> {
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

    fn assert_matrix_eq(a: &DMatrix<f64>, b: &DMatrix<f64>, eps: f64) {
        assert_eq!(a.shape(), b.shape());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_relative_eq!(*x, *y, epsilon = eps);
        }
    }

    #[test]
    fn test_twiss_2d_diagonal() {
        let s = DMatrix::from_row_slice(2, 2, &[4.0, 0.0, 0.0, 1.0]);
        let t = twiss_2d(&s);
        assert_relative_eq!(t.emittance, 2.0);
        assert_relative_eq!(t.beta, 2.0);
        assert_relative_eq!(t.alpha, 0.0);
    }

    #[test]
    fn test_twiss_covariance_round_trip() {
        let t = Twiss::new(-1.2, 3.5, 0.7);
        let back = twiss_2d(&t.covariance());
        assert_relative_eq!(back.alpha, t.alpha, epsilon = 1e-12);
        assert_relative_eq!(back.beta, t.beta, epsilon = 1e-12);
        assert_relative_eq!(back.emittance, t.emittance, epsilon = 1e-12);
    }

    #[test]
    fn test_twiss_singular_is_not_finite() {
        let s = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let t = twiss_2d(&s);
        assert!(!t.beta.is_finite());
    }

    #[test]
    fn test_twiss_per_plane() {
        let params = twiss(&cov_4d()).unwrap();
        assert_eq!(params.len(), 2);
        assert_relative_eq!(params[0].emittance, 6.0f64.sqrt());
        assert_relative_eq!(params[1].beta, 6.0 / 3.8f64.sqrt());
        assert!(twiss(&DMatrix::zeros(3, 3)).is_err());
    }

    #[test]
    fn test_apparent_emittances() {
        let eps = projected_emittances(&cov_4d()).unwrap();
        assert_relative_eq!(eps[0], 6.0f64.sqrt());
        assert_relative_eq!(eps[1], 3.8f64.sqrt());
    }

    #[test]
    fn test_intrinsic_emittances_match_eigenvalues() {
        let s = cov_4d();
        let eps = intrinsic_emittances(&s).unwrap();
        let mut expected = symplectic_eigen(&s).unwrap().emittances;
        expected.sort_by(|a, b| b.partial_cmp(a).unwrap());
        assert_relative_eq!(eps[0], expected[0], epsilon = 1e-9);
        assert_relative_eq!(eps[1], expected[1], epsilon = 1e-9);

        // product of intrinsic emittances is sqrt(det S)
        assert_relative_eq!(eps[0] * eps[1], s.determinant().sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn test_intrinsic_emittances_dimension_limits() {
        let s6 = DMatrix::<f64>::identity(6, 6);
        assert_eq!(
            intrinsic_emittances(&s6),
            Err(PhaseSpaceError::UnsupportedDimension { dim: 6, max: 4 })
        );
        let s2 = DMatrix::from_row_slice(2, 2, &[4.0, 0.0, 0.0, 1.0]);
        assert_eq!(intrinsic_emittances(&s2).unwrap(), vec![2.0]);
    }

    #[test]
    fn test_coupled_normalization_diagonalizes() {
        let s = cov_4d();
        let norm = normalization(&s, NormalizationOptions::new()).unwrap();
        let sn = norm.normalize_cov(&s);
        let eps = &norm.emittances;
        let expected = DMatrix::from_diagonal(&nalgebra::DVector::from_vec(vec![
            eps[0], eps[0], eps[1], eps[1],
        ]));
        assert_matrix_eq(&sn, &expected, 1e-9);
    }

    #[test]
    fn test_scaled_normalization_gives_identity() {
        let s = cov_4d();
        let v_inv = normalization_matrix(&s, NormalizationOptions::new().with_scale(true)).unwrap();
        let sn = &v_inv * &s * v_inv.transpose();
        assert_matrix_eq(&sn, &DMatrix::identity(4, 4), 1e-9);
    }

    #[test]
    fn test_block_diag_matches_twiss() {
        let s = cov_4d();
        let block = normalization_matrix(&s, NormalizationOptions::new().with_block_diag(true))
            .unwrap();
        let from_twiss = normalization_matrix_from_twiss(&twiss(&s).unwrap()).unwrap();
        assert_matrix_eq(&block, &from_twiss, 1e-9);
        assert_relative_eq!(block[(0, 2)], 0.0);
        assert_relative_eq!(block[(3, 1)], 0.0);
    }

    #[test]
    fn test_block_diag_scaled_blocks_are_identity() {
        let s = cov_4d();
        let v_inv = normalization_matrix(
            &s,
            NormalizationOptions::new()
                .with_block_diag(true)
                .with_scale(true),
        )
        .unwrap();
        let sn = &v_inv * &s * v_inv.transpose();
        for i in [0, 2] {
            assert_matrix_eq(&diagonal_block(&sn, i), &DMatrix::identity(2, 2), 1e-9);
        }
    }

    #[test]
    fn test_normalization_errors() {
        let odd = DMatrix::<f64>::identity(3, 3);
        assert!(matches!(
            normalization_matrix(&odd, NormalizationOptions::new()),
            Err(PhaseSpaceError::OddDimension { dim: 3 })
        ));
        let singular = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        assert!(normalization_matrix(&singular, NormalizationOptions::new()).is_err());
    }

    #[test]
    fn test_rms_ellipse_upright() {
        let s = DMatrix::from_row_slice(2, 2, &[4.0, 0.0, 0.0, 1.0]);
        let e = rms_ellipse_params(&s, None).unwrap();
        assert_relative_eq!(e.c1, 2.0);
        assert_relative_eq!(e.c2, 1.0);
        assert_relative_eq!(e.angle, 0.0);
    }

    #[test]
    fn test_rms_ellipse_tilted() {
        // 45 degree correlation: principal variances 3 and 1
        let s = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 2.0]);
        let e = rms_ellipse_params(&s, Some((0, 1))).unwrap();
        assert_relative_eq!(e.angle, -std::f64::consts::FRAC_PI_4, epsilon = 1e-12);
        assert_relative_eq!(e.c1, 3.0f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(e.c2, 1.0, epsilon = 1e-12);
        assert!(rms_ellipse_params(&s, Some((0, 2))).is_err());
    }

    #[test]
    fn test_norm_matrix_from_twiss_2d() {
        let v_inv = normalization_matrix_from_twiss_2d(1.5, 4.0).unwrap();
        let t = Twiss::new(1.5, 4.0, 2.0);
        let sn = &v_inv * t.covariance() * v_inv.transpose();
        assert_matrix_eq(&sn, &(DMatrix::identity(2, 2) * 2.0), 1e-12);
        assert!(normalization_matrix_from_twiss_2d(0.0, 0.0).is_err());
    }
}
