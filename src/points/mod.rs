//! Point-cloud engine.
//!
//! A point cloud is an `(n, d)` array: one row per particle, one column per
//! phase-space coordinate.
//!
//! This module provides:
//! - [`analysis`]: moments, radii, enclosing radii, bounding-ellipse fit, limits
//! - [`transform`]: projections, linear/nonlinear maps, normalization,
//!   decorrelation and downsampling
//! - [`slice`]: planar, spherical, ellipsoidal and density-contour slices
//! - [`histogram`]: dense, sparse and radial histograms
//! - [`kde`]: Gaussian kernel density estimation

pub mod analysis;
pub mod histogram;
pub mod kde;
pub mod slice;
pub mod transform;

pub use analysis::{
    centroid, correlation_matrix, covariance_matrix, enclosing_ellipsoid_radius,
    enclosing_sphere_radius, find_min_volume_bounding_ellipse, get_ellipsoid_radii, get_limits,
    get_radii, BoundingEllipse,
};
pub use histogram::{
    histogram, histogram_1d, histogram_bin_edges, radial_histogram, sparse_histogram, Histogram,
    SparseHistogram,
};
pub use kde::GaussianKde;
pub use slice::{slice_contour, slice_ellipsoid, slice_planar, slice_sphere, Selection};
pub use transform::{
    decorrelate_x_y_z, decorrelate_x_y_z_with_thread_rng, downsample, downsample_with_thread_rng,
    normalize_2d_projections, project, scale, shift, transform, transform_linear,
};

use crate::error::{PhaseSpaceError, Result};

/// Check that every axis index is below `ndim`.
pub(crate) fn check_axes(axis: &[usize], ndim: usize) -> Result<()> {
    if axis.is_empty() {
        return Err(PhaseSpaceError::invalid_argument("axis list is empty"));
    }
    if axis.len() > ndim {
        return Err(PhaseSpaceError::dimension_mismatch(ndim, axis.len()));
    }
    match axis.iter().find(|&&a| a >= ndim) {
        Some(&a) => Err(PhaseSpaceError::invalid_axis(a, ndim)),
        None => Ok(()),
    }
}

/// Resolve an optional axis list, defaulting to every axis in order.
pub(crate) fn resolve_axes(axis: Option<&[usize]>, ndim: usize) -> Result<Vec<usize>> {
    match axis {
        Some(axis) => {
            check_axes(axis, ndim)?;
            Ok(axis.to_vec())
        }
        None => Ok((0..ndim).collect()),
    }
}
