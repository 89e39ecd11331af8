//! Linear transfer matrices for phase-space coordinates.
//!
//! Rotations act clockwise in each `(u, u')` plane. In normalized
//! coordinates a betatron phase advance is exactly such a rotation, so
//! [`phase_advance_matrix`] composes with [`crate::cov::normalization`] to
//! transport a beam between two points of an uncoupled lattice.

use nalgebra::DMatrix;

/// 2x2 clockwise rotation matrix.
#[must_use]
pub fn rotation_matrix(angle: f64) -> DMatrix<f64> {
    let (s, c) = angle.sin_cos();
    DMatrix::from_row_slice(2, 2, &[c, s, -s, c])
}

/// 4x4 matrix rotating `[x, x', y, y']` clockwise in the x-y plane.
#[must_use]
pub fn rotation_matrix_4x4(angle: f64) -> DMatrix<f64> {
    let (s, c) = angle.sin_cos();
    #[rustfmt::skip]
    let m = DMatrix::from_row_slice(4, 4, &[
          c, 0.0,   s, 0.0,
        0.0,   c, 0.0,   s,
         -s, 0.0,   c, 0.0,
        0.0,  -s, 0.0,   c,
    ]);
    m
}

/// Block-diagonal matrix of one [`rotation_matrix`] per plane.
#[must_use]
pub fn phase_advance_matrix(phase_advances: &[f64]) -> DMatrix<f64> {
    let d = 2 * phase_advances.len();
    let mut r = DMatrix::zeros(d, d);
    for (plane, &phase) in phase_advances.iter().enumerate() {
        r.view_mut((2 * plane, 2 * plane), (2, 2))
            .copy_from(&rotation_matrix(phase));
    }
    r
}
