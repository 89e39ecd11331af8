//! Covariance analysis tests.
//!
//! These tests check Twiss extraction, emittances and normalization matrices
//! against closed-form results and against each other.

use approx::assert_relative_eq;
use nalgebra::DMatrix;
use psdist::cov::{
    self, normalization_matrix, normalization_matrix_from_twiss, twiss, twiss_2d, Twiss,
};
use psdist::math::unit_symplectic_matrix;
use psdist::points::{covariance_matrix, transform_linear};
use psdist::transfer::phase_advance_matrix;
use psdist::NormalizationOptions;
use ndarray::Array2;
use std::f64::consts::PI;

// =============================================================================
// GENERATORS
// =============================================================================

/// Build a `2k x 2k` covariance matrix from Twiss parameters with a coupling
/// term of strength `coupling` between neighbouring planes.
fn coupled_cov(params: &[Twiss], coupling: f64) -> DMatrix<f64> {
    let d = 2 * params.len();
    let mut s = DMatrix::zeros(d, d);
    for (plane, p) in params.iter().enumerate() {
        s.view_mut((2 * plane, 2 * plane), (2, 2))
            .copy_from(&p.covariance());
    }
    for plane in 1..params.len() {
        let (i, j) = (2 * plane - 2, 2 * plane);
        s[(i, j)] = coupling;
        s[(j, i)] = coupling;
    }
    s
}

/// Deterministic point cloud with the given plane ellipses, sampled on a
/// quasi-random phase/amplitude sequence.
fn generate_cloud(n: usize, params: &[Twiss]) -> Array2<f64> {
    let golden = 0.618_033_988_749_895;
    Array2::from_shape_fn((n, 2 * params.len()), |(i, j)| {
        let plane = j / 2;
        let p = &params[plane];
        let u = (i as f64 * golden * (plane as f64 + 1.0)).fract();
        let amp = (2.0 * p.emittance * (0.1 + 0.9 * (i as f64 * 0.754_877_666).fract())).sqrt();
        let phase = 2.0 * PI * u;
        let x = amp * p.beta.sqrt() * phase.cos();
        if j % 2 == 0 {
            x
        } else {
            -amp * (phase.sin() + p.alpha * phase.cos()) / p.beta.sqrt()
        }
    })
}

fn assert_matrix_eq(a: &DMatrix<f64>, b: &DMatrix<f64>, eps: f64) {
    assert_eq!(a.shape(), b.shape());
    for i in 0..a.nrows() {
        for j in 0..a.ncols() {
            assert_relative_eq!(a[(i, j)], b[(i, j)], epsilon = eps);
        }
    }
}

// =============================================================================
// SCENARIOS
// =============================================================================

#[test]
fn test_twiss_of_upright_ellipse() {
    let s = DMatrix::from_row_slice(2, 2, &[4.0, 0.0, 0.0, 1.0]);
    let p = twiss_2d(&s);
    assert_relative_eq!(p.emittance, 2.0);
    assert_relative_eq!(p.beta, 2.0);
    assert_relative_eq!(p.alpha, 0.0);
}

#[test]
fn test_unit_symplectic_4d() {
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
}

// =============================================================================
// PROPERTIES
// =============================================================================

#[test]
fn test_from_twiss_matches_block_diag() {
    let cases = [
        vec![Twiss::new(0.0, 1.0, 1.0)],
        vec![Twiss::new(-1.2, 4.5, 0.3), Twiss::new(0.7, 0.8, 2.0)],
        vec![
            Twiss::new(0.3, 2.0, 1.0),
            Twiss::new(-0.5, 9.0, 0.1),
            Twiss::new(2.0, 0.5, 5.0),
        ],
    ];
    let options = NormalizationOptions::new().with_block_diag(true);
    for params in &cases {
        for coupling in [0.0, 0.05] {
            let s = coupled_cov(params, coupling);
            let from_twiss = normalization_matrix_from_twiss(&twiss(&s).unwrap()).unwrap();
            let block_diag = normalization_matrix(&s, options).unwrap();
            assert_matrix_eq(&from_twiss, &block_diag, 1e-9);
        }
    }
}

#[test]
fn test_scaled_normalization_gives_unit_covariance() {
    let params = [Twiss::new(-0.8, 3.0, 1.5), Twiss::new(1.1, 0.6, 0.4)];
    let cloud = generate_cloud(4000, &params);
    let s = covariance_matrix(&cloud.view()).unwrap();

    for block_diag in [false, true] {
        let options = NormalizationOptions::new()
            .with_scale(true)
            .with_block_diag(block_diag);
        let v_inv = normalization_matrix(&s, options).unwrap();
        let normalized = transform_linear(&cloud.view(), &v_inv).unwrap();
        let sn = covariance_matrix(&normalized.view()).unwrap();
        for plane in 0..2 {
            let i = 2 * plane;
            assert_relative_eq!(sn[(i, i)], 1.0, epsilon = 1e-8);
            assert_relative_eq!(sn[(i + 1, i + 1)], 1.0, epsilon = 1e-8);
            assert_relative_eq!(sn[(i, i + 1)], 0.0, epsilon = 1e-8);
        }
    }
}

#[test]
fn test_coupled_normalization_removes_coupling() {
    let params = [Twiss::new(0.4, 2.0, 1.0), Twiss::new(-0.3, 1.5, 0.5)];
    let s = coupled_cov(&params, 0.2);
    let n = cov::normalization(&s, NormalizationOptions::new()).unwrap();
    let sn = n.normalize_cov(&s);
    let expected = DMatrix::from_diagonal(&nalgebra::DVector::from_vec(vec![
        n.emittances[0],
        n.emittances[0],
        n.emittances[1],
        n.emittances[1],
    ]));
    assert_matrix_eq(&sn, &expected, 1e-9);
}

#[test]
fn test_emittances_invariant_under_phase_advance() {
    let params = [Twiss::new(0.4, 2.0, 1.0), Twiss::new(-0.3, 1.5, 0.5)];
    let s = coupled_cov(&params, 0.2);
    let r = phase_advance_matrix(&[0.3, 1.1]);
    let v_inv =
        normalization_matrix(&s, NormalizationOptions::new().with_block_diag(true)).unwrap();
    let v = v_inv.clone().try_inverse().unwrap();
    // rotate each plane in its own normalized coordinates
    let m = &v * r * &v_inv;
    let s2 = &m * &s * m.transpose();

    let before = cov::apparent_emittances(&s).unwrap();
    let after = cov::apparent_emittances(&s2).unwrap();
    let intrinsic_before = cov::intrinsic_emittances(&s).unwrap();
    let intrinsic_after = cov::intrinsic_emittances(&s2).unwrap();
    for k in 0..2 {
        assert_relative_eq!(intrinsic_before[k], intrinsic_after[k], max_relative = 1e-8);
    }
    // uncoupled transport preserves the per-plane emittances too
    for k in 0..2 {
        assert_relative_eq!(before[k], after[k], max_relative = 1e-8);
    }
}

#[test]
fn test_projected_matches_apparent() {
    let params = [Twiss::new(0.1, 1.0, 2.0), Twiss::new(0.0, 3.0, 0.5)];
    let s = coupled_cov(&params, 0.1);
    let apparent = cov::apparent_emittances(&s).unwrap();
    let projected = cov::projected_emittances(&s).unwrap();
    for (a, p) in apparent.iter().zip(&projected) {
        assert_relative_eq!(*a, *p);
    }
    assert_relative_eq!(apparent[0], 2.0, epsilon = 1e-12);
}
