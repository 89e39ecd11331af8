//! Projections and slices of n-dimensional images.

use super::check_image_axes;
use crate::error::{PhaseSpaceError, Result};
use ndarray::{Array1, Array2, ArrayD, ArrayViewD, Axis, Ix1, Ix2, IxDyn, Slice, Zip};

/// Where [`copy_into_new_dim`] places the new axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NewDimPosition {
    /// Before the first axis.
    Leading,
    /// After the last axis.
    #[default]
    Trailing,
}

/// Project an image onto `axis` by summing over every other axis.
///
/// The output axes follow the order of `axis`, so `project(f, &[2, 0])` has
/// shape `(n_2, n_0)`.
///
/// # Errors
///
/// Returns an error if an axis is out of range or repeated.
pub fn project(f: &ArrayViewD<f64>, axis: &[usize]) -> Result<ArrayD<f64>> {
    check_image_axes(axis, f.ndim())?;
    let mut proj = f.to_owned();
    for a in (0..f.ndim()).rev() {
        if !axis.contains(&a) {
            proj = proj.sum_axis(Axis(a));
        }
    }
    let mut sorted = axis.to_vec();
    sorted.sort_unstable();
    let perm: Vec<usize> = axis
        .iter()
        .map(|a| sorted.binary_search(a).unwrap_or_else(|i| i))
        .collect();
    Ok(proj
        .permuted_axes(IxDyn(&perm))
        .as_standard_layout()
        .into_owned())
}

/// Broadcast an image into additional dimensions of the given `shape`
/// without copying.
///
/// The returned view repeats the input along the new axes with zero stride.
/// Call `.to_owned()` on it, or use [`copy_into_new_dim`], when a writable
/// array is needed.
///
/// # Errors
///
/// Returns an error if the broadcast fails.
pub fn broadcast_into_new_dim<'b, T>(
    f: &'b ArrayViewD<'_, T>,
    shape: &[usize],
    position: NewDimPosition,
) -> Result<ArrayViewD<'b, T>> {
    let leading_shape: Vec<usize> = shape.iter().chain(f.shape()).copied().collect();
    let view = f.broadcast(IxDyn(&leading_shape)).ok_or_else(|| {
        PhaseSpaceError::invalid_argument(format!(
            "cannot broadcast shape {:?} to {leading_shape:?}",
            f.shape()
        ))
    })?;
    Ok(match position {
        NewDimPosition::Leading => view,
        NewDimPosition::Trailing => {
            let k = shape.len();
            let perm: Vec<usize> = (k..k + f.ndim()).chain(0..k).collect();
            view.permuted_axes(IxDyn(&perm))
        }
    })
}

/// Copy an image into additional dimensions of the given `shape`.
///
/// The result is materialized: every element along the new axes is a copy of
/// the input image.
///
/// # Errors
///
/// Returns an error if the broadcast fails.
pub fn copy_into_new_dim<T: Clone>(
    f: &ArrayViewD<T>,
    shape: &[usize],
    position: NewDimPosition,
) -> Result<ArrayD<T>> {
    Ok(broadcast_into_new_dim(f, shape, position)?
        .as_standard_layout()
        .into_owned())
}

fn check_levels(lmin: f64, lmax: f64) -> Result<()> {
    if lmin.is_finite() && lmax.is_finite() && lmin <= lmax {
        Ok(())
    } else {
        Err(PhaseSpaceError::invalid_argument(format!(
            "contour levels must satisfy lmin <= lmax, got ({lmin}, {lmax})"
        )))
    }
}

/// Boolean mask over the full image selecting the bins whose projection onto
/// the complementary axes (all axes not in `axis`), normalized by its peak,
/// lies within `[lmin, lmax]`.
///
/// The mask is constant along the axes in `axis`. `fpr` may supply the
/// complementary projection, `project(f, complement)` with the complementary
/// axes in increasing order, so that repeated calls with different levels do
/// not re-project the full image.
///
/// # Errors
///
/// Returns an error if an axis is invalid, the levels are not ordered, or
/// `fpr` does not have the shape of the complementary projection.
pub fn contour_mask(
    f: &ArrayViewD<f64>,
    axis: &[usize],
    lmin: f64,
    lmax: f64,
    fpr: Option<&ArrayViewD<f64>>,
) -> Result<ArrayD<bool>> {
    let ndim = f.ndim();
    check_image_axes(axis, ndim)?;
    check_levels(lmin, lmax)?;
    let complement: Vec<usize> = (0..ndim).filter(|a| !axis.contains(a)).collect();
    if complement.is_empty() {
        return Ok(ArrayD::from_elem(f.raw_dim(), true));
    }

    let computed;
    let fpr = match fpr {
        Some(fpr) => {
            let expected: Vec<usize> = complement.iter().map(|&a| f.shape()[a]).collect();
            if fpr.shape() != expected.as_slice() {
                return Err(PhaseSpaceError::invalid_argument(format!(
                    "complementary projection has shape {:?}, expected {expected:?}",
                    fpr.shape()
                )));
            }
            fpr.view()
        }
        None => {
            computed = project(f, &complement)?;
            computed.view()
        }
    };
    let peak = fpr.fold(0.0f64, |acc, &v| acc.max(v));
    let selected = fpr.mapv(|v| {
        let level = if peak > 0.0 { v / peak } else { v };
        lmin <= level && level <= lmax
    });

    // Axes of the broadcast mask are `complement ++ axis`.
    let target_shape: Vec<usize> = axis.iter().map(|&a| f.shape()[a]).collect();
    let selected_view = selected.view();
    let mask = broadcast_into_new_dim(&selected_view, &target_shape, NewDimPosition::Trailing)?;
    let mut perm = vec![0; ndim];
    for (p, &a) in complement.iter().chain(axis).enumerate() {
        perm[a] = p;
    }
    Ok(mask
        .permuted_axes(IxDyn(&perm))
        .as_standard_layout()
        .into_owned())
}

/// Apply a contour slice in the complementary subspace, then project onto
/// `axis`.
///
/// Bins are kept where the projection onto all other axes, normalized to a
/// peak of one, lies within `[lmin, lmax]`; the kept sub-volume is summed
/// onto `axis` (in the order given). `fpr` is an optional precomputed
/// complementary projection, as in [`contour_mask`].
///
/// # Errors
///
/// Returns an error if an axis is invalid, the levels are not ordered, or
/// `fpr` has the wrong shape.
pub fn project_contour(
    f: &ArrayViewD<f64>,
    axis: &[usize],
    lmin: f64,
    lmax: f64,
    fpr: Option<&ArrayViewD<f64>>,
) -> Result<ArrayD<f64>> {
    tracing::debug!(
        shape = ?f.shape(),
        axis = ?axis,
        lmin,
        lmax,
        precomputed = fpr.is_some(),
        "contour projection"
    );
    let mask = contour_mask(f, axis, lmin, lmax, fpr)?;
    let masked = Zip::from(f)
        .and(&mask)
        .map_collect(|&v, &keep| if keep { v } else { 0.0 });
    project(&masked.view(), axis)
}

/// [`project_contour`] onto a single axis.
///
/// # Errors
///
/// Returns an error if the axis is invalid or the levels are not ordered.
pub fn project1d_contour(
    f: &ArrayViewD<f64>,
    axis: usize,
    lmin: f64,
    lmax: f64,
    fpr: Option<&ArrayViewD<f64>>,
) -> Result<Array1<f64>> {
    project_contour(f, &[axis], lmin, lmax, fpr)?
        .into_dimensionality::<Ix1>()
        .map_err(|e| PhaseSpaceError::invalid_argument(e.to_string()))
}

/// [`project_contour`] onto two axes, in the given order.
///
/// # Errors
///
/// Returns an error if an axis is invalid or the levels are not ordered.
pub fn project2d_contour(
    f: &ArrayViewD<f64>,
    axis: (usize, usize),
    lmin: f64,
    lmax: f64,
    fpr: Option<&ArrayViewD<f64>>,
) -> Result<Array2<f64>> {
    project_contour(f, &[axis.0, axis.1], lmin, lmax, fpr)?
        .into_dimensionality::<Ix2>()
        .map_err(|e| PhaseSpaceError::invalid_argument(e.to_string()))
}

/// Planar slice by index range: keep indices `lo..hi` along each listed axis
/// and everything along the others.
///
/// # Errors
///
/// Returns an error if an axis is invalid or a range is out of bounds.
pub fn slice_planar(
    f: &ArrayViewD<f64>,
    axis: &[usize],
    ranges: &[(usize, usize)],
) -> Result<ArrayD<f64>> {
    check_image_axes(axis, f.ndim())?;
    if ranges.len() != axis.len() {
        return Err(PhaseSpaceError::dimension_mismatch(axis.len(), ranges.len()));
    }
    for (&a, &(lo, hi)) in axis.iter().zip(ranges) {
        if lo > hi || hi > f.shape()[a] {
            return Err(PhaseSpaceError::invalid_argument(format!(
                "index range {lo}..{hi} out of bounds for axis {a} of length {}",
                f.shape()[a]
            )));
        }
    }
    Ok(f.slice_each_axis(|ad| {
        match axis.iter().position(|&a| a == ad.axis.index()) {
            Some(k) => Slice::from(ranges[k].0..ranges[k].1),
            None => Slice::from(..),
        }
    })
    .to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array};

    fn cube() -> ArrayD<f64> {
        // f[i, j, k] = 4i + 2j + k
        Array::from_shape_fn((2, 2, 2), |(i, j, k)| (4 * i + 2 * j + k) as f64).into_dyn()
    }

    #[test]
    fn test_project_respects_axis_order() {
        let f = Array::from_shape_fn((2, 3, 4), |(i, j, k)| (100 * i + 10 * j + k) as f64)
            .into_dyn();
        let p = project(&f.view(), &[2, 0]).unwrap();
        assert_eq!(p.shape(), &[4, 2]);
        for k in 0..4 {
            for i in 0..2 {
                let expected: f64 = (0..3).map(|j| f[[i, j, k]]).sum();
                assert_eq!(p[[k, i]], expected);
            }
        }

        let t = project(&f.view(), &[2, 1, 0]).unwrap();
        assert_eq!(t.shape(), &[4, 3, 2]);
        assert_eq!(t[[3, 1, 0]], f[[0, 1, 3]]);

        assert!(project(&f.view(), &[3]).is_err());
        assert!(project(&f.view(), &[1, 1]).is_err());
    }

    #[test]
    fn test_copy_into_new_dim() {
        let f = array![1.0, 2.0].into_dyn();
        let trailing = copy_into_new_dim(&f.view(), &[3], NewDimPosition::Trailing).unwrap();
        assert_eq!(trailing.shape(), &[2, 3]);
        assert_eq!(trailing[[1, 2]], 2.0);

        let leading = copy_into_new_dim(&f.view(), &[3, 2], NewDimPosition::Leading).unwrap();
        assert_eq!(leading.shape(), &[3, 2, 2]);
        assert_eq!(leading[[2, 1, 0]], 1.0);
    }

    #[test]
    fn test_broadcast_into_new_dim_is_a_view() {
        let f = array![[1.0, 2.0], [3.0, 4.0]].into_dyn();
        let view = f.view();
        let trailing = broadcast_into_new_dim(&view, &[3], NewDimPosition::Trailing).unwrap();
        assert_eq!(trailing.shape(), &[2, 2, 3]);
        assert_eq!(trailing.strides()[2], 0);
        assert_eq!(trailing[[1, 0, 2]], 3.0);

        let leading = broadcast_into_new_dim(&view, &[4], NewDimPosition::Leading).unwrap();
        assert_eq!(leading.shape(), &[4, 2, 2]);
        assert_eq!(leading.strides()[0], 0);
        assert_eq!(leading[[3, 0, 1]], 2.0);

        let copied = copy_into_new_dim(&view, &[3], NewDimPosition::Trailing).unwrap();
        assert_eq!(copied, trailing.to_owned());
    }

    #[test]
    fn test_contour_reuses_complementary_projection() {
        let f = cube();
        // complement of (2, 0) is [1]
        let fpr = project(&f.view(), &[1]).unwrap();
        let fpr = fpr.view();
        for (lmin, lmax) in [(0.6, 1.0), (0.0, 1.0), (0.0, 0.5)] {
            let reused = project2d_contour(&f.view(), (2, 0), lmin, lmax, Some(&fpr)).unwrap();
            let fresh = project2d_contour(&f.view(), (2, 0), lmin, lmax, None).unwrap();
            assert_eq!(reused, fresh);
        }

        let wrong = project(&f.view(), &[0, 1]).unwrap();
        assert!(project2d_contour(&f.view(), (2, 0), 0.0, 1.0, Some(&wrong.view())).is_err());
    }

    #[test]
    fn test_project1d_contour() {
        let f = array![[1.0, 0.0, 0.0], [2.0, 5.0, 0.0], [1.0, 0.0, 1.0]].into_dyn();
        // column sums [4, 5, 1] -> levels [0.8, 1.0, 0.2]
        let p = project1d_contour(&f.view(), 0, 0.5, 1.0, None).unwrap();
        assert_eq!(p, array![1.0, 7.0, 1.0]);

        let full = project1d_contour(&f.view(), 0, 0.0, 1.0, None).unwrap();
        assert_eq!(full, array![1.0, 7.0, 2.0]);
    }

    #[test]
    fn test_project2d_contour_order() {
        let f = cube();
        // levels along j: [10/18, 1]
        let p = project2d_contour(&f.view(), (2, 0), 0.6, 1.0, None).unwrap();
        assert_eq!(p, array![[2.0, 6.0], [3.0, 7.0]]);

        let all = project2d_contour(&f.view(), (2, 0), 0.0, 1.0, None).unwrap();
        assert_eq!(all, array![[2.0, 10.0], [4.0, 12.0]]);
        assert!(project2d_contour(&f.view(), (0, 1), 0.9, 0.1, None).is_err());
    }

    #[test]
    fn test_contour_mask_shape() {
        let f = cube();
        let mask = contour_mask(&f.view(), &[2, 0], 0.6, 1.0, None).unwrap();
        assert_eq!(mask.shape(), f.shape());
        for ((_, j, _), &m) in mask
            .view()
            .into_dimensionality::<ndarray::Ix3>()
            .unwrap()
            .indexed_iter()
        {
            assert_eq!(m, j == 1);
        }
    }

    #[test]
    fn test_slice_planar_image() {
        let f = cube();
        let s = slice_planar(&f.view(), &[1], &[(1, 2)]).unwrap();
        assert_eq!(s.shape(), &[2, 1, 2]);
        assert_eq!(s[[1, 0, 1]], 7.0);
        assert!(slice_planar(&f.view(), &[0], &[(0, 3)]).is_err());
        assert!(slice_planar(&f.view(), &[0, 1], &[(0, 1)]).is_err());
    }
}
