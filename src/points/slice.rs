//! Geometric and density-contour slices of point clouds.
//!
//! A slice keeps the points satisfying a predicate evaluated in a projection
//! of the cloud. Every slice returns a [`Selection`] carrying both the kept
//! points and the boolean mask over the input rows.

use super::analysis::{get_ellipsoid_radii, get_radii};
use super::histogram::histogram;
use super::transform::project;
use super::{check_axes, resolve_axes};
use crate::config::{ContourMode, ContourSliceConfig, SliceBounds};
use crate::error::{PhaseSpaceError, Result};
use crate::math::grid::{digitize, GridInterpolator};
use ndarray::{Array1, Array2, ArrayView2, Axis, Dimension};
use std::collections::HashSet;

/// Points selected by a slice.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// The selected points, in input order.
    pub points: Array2<f64>,
    /// `true` for each input row that was selected.
    pub mask: Vec<bool>,
}

impl Selection {
    fn from_mask(points: &ArrayView2<f64>, mask: Vec<bool>) -> Self {
        let indices: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, &keep)| keep.then_some(i))
            .collect();
        Self {
            points: points.select(Axis(0), &indices),
            mask,
        }
    }

    /// Number of selected points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.nrows()
    }

    /// Whether no point was selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.nrows() == 0
    }

    /// Row indices of the selected points.
    #[must_use]
    pub fn indices(&self) -> Vec<usize> {
        self.mask
            .iter()
            .enumerate()
            .filter_map(|(i, &keep)| keep.then_some(i))
            .collect()
    }
}

/// Keep points strictly inside an axis-aligned box.
///
/// `bounds` gives one `(min, max)` pair (or center/width) per entry of
/// `axis`; a point is kept if `min < x < max` along every sliced axis.
///
/// # Errors
///
/// Returns an error if an axis is out of range or the bounds do not match
/// the number of sliced axes.
pub fn slice_planar(
    points: &ArrayView2<f64>,
    axis: &[usize],
    bounds: &SliceBounds,
) -> Result<Selection> {
    check_axes(axis, points.ncols())?;
    let limits = bounds.resolve(axis.len())?;
    let mask = points
        .rows()
        .into_iter()
        .map(|row| {
            axis.iter()
                .zip(&limits)
                .all(|(&j, &(lo, hi))| row[j] > lo && row[j] < hi)
        })
        .collect();
    Ok(Selection::from_mask(points, mask))
}

fn shell_mask(radii: &Array1<f64>, rmin: f64, rmax: Option<f64>) -> Result<Vec<bool>> {
    let rmax = rmax.unwrap_or(f64::INFINITY);
    if !(rmin <= rmax) {
        return Err(PhaseSpaceError::invalid_argument(format!(
            "shell radii must satisfy rmin <= rmax, got ({rmin}, {rmax})"
        )));
    }
    Ok(radii.iter().map(|&r| r > rmin && r < rmax).collect())
}

/// Keep points in the spherical shell `rmin < r < rmax`, with `r` measured
/// in the projection onto `axis` (all axes by default). `rmax = None` leaves
/// the shell unbounded above.
///
/// # Errors
///
/// Returns an error if an axis is out of range or `rmin > rmax`.
pub fn slice_sphere(
    points: &ArrayView2<f64>,
    axis: Option<&[usize]>,
    rmin: f64,
    rmax: Option<f64>,
) -> Result<Selection> {
    let axis = resolve_axes(axis, points.ncols())?;
    let radii = get_radii(&project(points, &axis)?.view());
    Ok(Selection::from_mask(points, shell_mask(&radii, rmin, rmax)?))
}

/// Keep points in the ellipsoidal shell `rmin < sqrt(xᵀ Σ⁻¹ x) < rmax`,
/// where `Σ` is the covariance matrix of the projection onto `axis`.
///
/// # Errors
///
/// Returns an error if an axis is out of range, `rmin > rmax`, or the
/// projected covariance matrix is singular.
pub fn slice_ellipsoid(
    points: &ArrayView2<f64>,
    axis: Option<&[usize]>,
    rmin: f64,
    rmax: Option<f64>,
) -> Result<Selection> {
    let axis = resolve_axes(axis, points.ncols())?;
    let radii = get_ellipsoid_radii(&project(points, &axis)?.view())?;
    Ok(Selection::from_mask(points, shell_mask(&radii, rmin, rmax)?))
}

/// Keep points whose local density lies within the contour levels.
///
/// The density is a histogram of the projection onto `axis`, normalized by
/// its peak. A point is kept if `lmin <= f / max(f) <= lmax` where `f` is
/// either interpolated at the point ([`ContourMode::Interpolated`], zero
/// outside the bin centers) or the value of the bin the point falls in
/// ([`ContourMode::ExactBin`], points on or beyond the outer edges count as
/// outside).
///
/// # Errors
///
/// Returns an error if the configuration is invalid or an axis is out of
/// range.
pub fn slice_contour(
    points: &ArrayView2<f64>,
    axis: Option<&[usize]>,
    config: &ContourSliceConfig,
) -> Result<Selection> {
    config.validate()?;
    let axis = resolve_axes(axis, points.ncols())?;
    let projected = project(points, &axis)?;
    tracing::debug!(
        n_points = points.nrows(),
        axis = ?axis,
        mode = ?config.mode,
        "slicing by density contour"
    );

    let mut hist = histogram(&projected.view(), &config.histogram)?;
    let peak = hist.values.fold(0.0f64, |acc, &v| acc.max(v));
    if peak > 0.0 {
        hist.values.mapv_inplace(|v| v / peak);
    }
    let in_levels = |v: f64| config.lmin <= v && v <= config.lmax;

    let mask = match config.mode {
        ContourMode::Interpolated => {
            let interpolator = GridInterpolator::new(hist.centers(), hist.values, 0.0)?;
            let mut buffer = vec![0.0; axis.len()];
            projected
                .rows()
                .into_iter()
                .map(|row| {
                    for (b, &x) in buffer.iter_mut().zip(row.iter()) {
                        *b = x;
                    }
                    in_levels(interpolator.evaluate(&buffer))
                })
                .collect()
        }
        ContourMode::ExactBin => {
            let accepted: HashSet<Vec<usize>> = hist
                .values
                .indexed_iter()
                .filter(|(_, &v)| in_levels(v))
                .map(|(index, _)| index.slice().to_vec())
                .collect();
            let edges: Vec<Vec<f64>> = hist.edges.iter().map(Array1::to_vec).collect();
            projected
                .rows()
                .into_iter()
                .map(|row| {
                    let mut index = Vec::with_capacity(edges.len());
                    for (x, e) in row.iter().zip(&edges) {
                        let i = digitize(*x, e);
                        if i == 0 || i >= e.len() {
                            return false;
                        }
                        index.push(i - 1);
                    }
                    accepted.contains(&index)
                })
                .collect()
        }
    };
    Ok(Selection::from_mask(points, mask))
}
