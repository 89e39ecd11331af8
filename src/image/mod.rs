//! Image (binned density) engine.
//!
//! An image is a dense n-dimensional array of bin values, paired with one
//! coordinate array (bin centers) per axis.
//!
//! This module provides:
//! - [`projection`]: marginal projections, contour-sliced projections,
//!   masks and planar slices
//! - [`moments`]: covariance/correlation of weighted grids and radial density
//! - [`sampling`]: drawing continuous samples from a binned density

pub mod moments;
pub mod projection;
pub mod sampling;

pub use moments::{corr, cov, grid_ellipsoid_radii, radial_density};
pub use projection::{
    broadcast_into_new_dim, contour_mask, copy_into_new_dim, project, project1d_contour,
    project2d_contour, project_contour, slice_planar, NewDimPosition,
};
pub use sampling::{sample_grid, sample_grid_with_thread_rng};

use crate::error::{PhaseSpaceError, Result};
use crate::math::grid::unravel_index;
use ndarray::{Array1, Array2, ArrayViewD, Dimension};

/// Check that the axes are distinct and below `ndim`.
pub(crate) fn check_image_axes(axis: &[usize], ndim: usize) -> Result<()> {
    if axis.is_empty() {
        return Err(PhaseSpaceError::invalid_argument("axis list is empty"));
    }
    for (k, &a) in axis.iter().enumerate() {
        if a >= ndim {
            return Err(PhaseSpaceError::invalid_axis(a, ndim));
        }
        if axis[..k].contains(&a) {
            return Err(PhaseSpaceError::invalid_argument(format!(
                "axis {a} listed twice"
            )));
        }
    }
    Ok(())
}

/// Check that there is one coordinate array per axis, each matching the
/// image shape.
pub(crate) fn check_coords(coords: &[Array1<f64>], shape: &[usize]) -> Result<()> {
    if coords.len() != shape.len() {
        return Err(PhaseSpaceError::dimension_mismatch(shape.len(), coords.len()));
    }
    for (c, &n) in coords.iter().zip(shape) {
        if c.len() != n {
            return Err(PhaseSpaceError::dimension_mismatch(n, c.len()));
        }
    }
    Ok(())
}

/// Coordinates of every grid point, shape `(K, d)` with `K` the product of
/// the coordinate lengths, in row-major order (last axis fastest).
#[must_use]
pub fn get_grid_coords(coords: &[Array1<f64>]) -> Array2<f64> {
    let shape: Vec<usize> = coords.iter().map(Array1::len).collect();
    let total: usize = shape.iter().product();
    let mut points = Array2::zeros((total, coords.len()));
    for (k, mut row) in points.rows_mut().into_iter().enumerate() {
        for (axis, i) in unravel_index(k, &shape).into_iter().enumerate() {
            row[axis] = coords[axis][i];
        }
    }
    points
}

/// Multi-index of the largest element (the first one on ties).
///
/// # Errors
///
/// Returns an error if the image is empty.
pub fn max_indices(f: &ArrayViewD<f64>) -> Result<Vec<usize>> {
    let mut best: Option<(Vec<usize>, f64)> = None;
    for (index, &v) in f.indexed_iter() {
        if best.as_ref().map_or(true, |(_, b)| v > *b) {
            best = Some((index.slice().to_vec(), v));
        }
    }
    best.map(|(index, _)| index)
        .ok_or_else(|| PhaseSpaceError::empty_input("image is empty"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_grid_coords_row_major() {
        let coords = vec![array![1.0, 2.0], array![10.0, 20.0, 30.0]];
        let grid = get_grid_coords(&coords);
        assert_eq!(grid.dim(), (6, 2));
        assert_eq!(grid.row(0).to_vec(), vec![1.0, 10.0]);
        assert_eq!(grid.row(1).to_vec(), vec![1.0, 20.0]);
        assert_eq!(grid.row(3).to_vec(), vec![2.0, 10.0]);
    }

    #[test]
    fn test_max_indices() {
        let f = array![[0.0, 3.0, 1.0], [3.0, 2.0, 0.0]].into_dyn();
        assert_eq!(max_indices(&f.view()).unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_axis_checks() {
        assert!(check_image_axes(&[0, 2], 3).is_ok());
        assert!(check_image_axes(&[0, 0], 3).is_err());
        assert!(check_image_axes(&[3], 3).is_err());
        assert!(check_image_axes(&[], 3).is_err());
    }
}
