//! Numerical building blocks.
//!
//! This module provides:
//! - [`linalg`]: ndarray/nalgebra conversion and checked matrix operations
//! - [`symplectic`]: unit symplectic matrix and symplectic eigen-analysis
//! - [`grid`]: bin edges, bin lookup and grid interpolation
//! - [`optimize`]: bounded Nelder–Mead minimization

pub mod grid;
pub mod linalg;
pub mod optimize;
pub mod symplectic;

pub use grid::{
    bin_index, centers_from_edges, digitize, edges_from_centers, histogram_bin_edges,
    sphere_shell_volume, GridInterpolator,
};
pub use linalg::{cov_to_corr, symmetrize, to_array2, to_dmatrix, try_inverse};
pub use symplectic::{
    normalization_matrix_from_eigvecs, normalize_eigvecs, symplectic_eigen,
    unit_symplectic_matrix, SymplecticEigen,
};
