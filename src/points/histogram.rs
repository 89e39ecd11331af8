//! Histograms of point clouds.
//!
//! Dense histograms follow the usual convention: bins are half-open
//! `[e_i, e_{i+1})` except the last, which also contains its upper edge, and
//! points outside the edges are dropped.

use super::analysis::get_radii;
use crate::config::{BinSpec, HistogramConfig};
use crate::error::{PhaseSpaceError, Result};
use crate::math::grid::{
    self, bin_index, centers_from_edges, digitize, ravel_multi_index, sphere_shell_volume,
    unravel_index,
};
use ndarray::{Array1, Array2, ArrayD, ArrayView1, ArrayView2, IxDyn};
use std::collections::HashMap;

/// Nudge added to the largest edge of a sparse histogram so the maximum
/// point is counted.
pub const SPARSE_EDGE_EPS: f64 = 1e-12;

/// Dense n-dimensional histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// Bin counts (or densities), one axis per coordinate.
    pub values: ArrayD<f64>,
    /// Bin edges along each axis; axis `i` has `values.shape()[i] + 1` edges.
    pub edges: Vec<Array1<f64>>,
}

impl Histogram {
    /// Number of axes.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.values.ndim()
    }

    /// Bin centers along each axis.
    #[must_use]
    pub fn centers(&self) -> Vec<Array1<f64>> {
        self.edges
            .iter()
            .map(|e| centers_from_edges(&e.view()))
            .collect()
    }

    /// Sum of all bins.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.values.sum()
    }
}

/// Sparse n-dimensional histogram: only occupied bins are stored.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseHistogram {
    /// Multi-index of each occupied bin, shape `(k, d)`, in the order the
    /// bins were first hit.
    pub indices: Array2<usize>,
    /// Count of each occupied bin.
    pub counts: Array1<usize>,
    /// Bin edges along each axis, with the largest edge nudged by
    /// [`SPARSE_EDGE_EPS`].
    pub edges: Vec<Array1<f64>>,
}

impl SparseHistogram {
    /// Expand into a dense histogram.
    #[must_use]
    pub fn to_dense(&self) -> Histogram {
        let shape: Vec<usize> = self.edges.iter().map(|e| e.len() - 1).collect();
        let mut values = ArrayD::zeros(IxDyn(&shape));
        for (index, &count) in self.indices.rows().into_iter().zip(self.counts.iter()) {
            let index: Vec<usize> = index.to_vec();
            values[IxDyn(&index)] += count as f64;
        }
        Histogram {
            values,
            edges: self.edges.clone(),
        }
    }
}

/// Bin edges along each coordinate of the point cloud.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or its per-axis lists do
/// not match the number of coordinates.
pub fn histogram_bin_edges(
    points: &ArrayView2<f64>,
    config: &HistogramConfig,
) -> Result<Vec<Array1<f64>>> {
    config.validate()?;
    let ndim = points.ncols();
    if ndim == 0 {
        return Err(PhaseSpaceError::empty_input("points have no coordinates"));
    }
    let bins = config.bins.resolve(ndim)?;
    let limits: Vec<Option<(f64, f64)>> = match &config.limits {
        None => vec![None; ndim],
        Some(limits) => limits.resolve(ndim)?.into_iter().map(Some).collect(),
    };
    bins.iter()
        .zip(limits)
        .enumerate()
        .map(|(axis, (spec, lim))| grid::histogram_bin_edges(&points.column(axis), spec, lim))
        .collect()
}

/// Dense n-dimensional histogram of the point cloud.
///
/// # Errors
///
/// Returns an error if the bin edges cannot be computed.
pub fn histogram(points: &ArrayView2<f64>, config: &HistogramConfig) -> Result<Histogram> {
    let edges = histogram_bin_edges(points, config)?;
    let edge_lists: Vec<Vec<f64>> = edges.iter().map(Array1::to_vec).collect();
    let shape: Vec<usize> = edges.iter().map(|e| e.len() - 1).collect();
    let mut values = ArrayD::zeros(IxDyn(&shape));
    let mut index = vec![0; shape.len()];

    'points: for row in points.rows() {
        for (axis, &x) in row.iter().enumerate() {
            match bin_index(x, &edge_lists[axis]) {
                Some(i) => index[axis] = i,
                None => continue 'points,
            }
        }
        values[IxDyn(&index)] += 1.0;
    }
    tracing::trace!(n_points = points.nrows(), shape = ?shape, "histogram");
    Ok(Histogram { values, edges })
}

/// One-dimensional histogram of a list of values.
///
/// # Errors
///
/// Returns an error if the bin edges cannot be computed.
pub fn histogram_1d(
    values: &ArrayView1<f64>,
    bins: &BinSpec,
    limits: Option<(f64, f64)>,
) -> Result<Histogram> {
    let edges = grid::histogram_bin_edges(values, bins, limits)?;
    let edge_list = edges.to_vec();
    let mut counts = ArrayD::zeros(IxDyn(&[edges.len() - 1]));
    for i in values.iter().filter_map(|&x| bin_index(x, &edge_list)) {
        counts[IxDyn(&[i])] += 1.0;
    }
    Ok(Histogram {
        values: counts,
        edges: vec![edges],
    })
}

/// Sparse n-dimensional histogram of the point cloud.
///
/// Suited to high-dimensional binning with few occupied bins. Bins are
/// half-open throughout; the largest edge along each axis is nudged by
/// [`SPARSE_EDGE_EPS`] so the maximum point is still counted.
///
/// # Errors
///
/// Returns an error if the bin edges cannot be computed.
pub fn sparse_histogram(
    points: &ArrayView2<f64>,
    config: &HistogramConfig,
) -> Result<SparseHistogram> {
    let mut edges = histogram_bin_edges(points, config)?;
    for e in &mut edges {
        let last = e.len() - 1;
        e[last] += SPARSE_EDGE_EPS;
    }
    let edge_lists: Vec<Vec<f64>> = edges.iter().map(Array1::to_vec).collect();
    let shape: Vec<usize> = edges.iter().map(|e| e.len() - 1).collect();
    let ndim = shape.len();

    let mut counts: HashMap<usize, usize> = HashMap::new();
    let mut order: Vec<usize> = Vec::new();
    let mut index = vec![0; ndim];
    'points: for row in points.rows() {
        for (axis, &x) in row.iter().enumerate() {
            let i = digitize(x, &edge_lists[axis]);
            if i == 0 || i >= edge_lists[axis].len() {
                continue 'points;
            }
            index[axis] = i - 1;
        }
        let flat = ravel_multi_index(&index, &shape);
        let count = counts.entry(flat).or_insert_with(|| {
            order.push(flat);
            0
        });
        *count += 1;
    }

    let mut indices = Array2::zeros((order.len(), ndim));
    let mut bin_counts = Array1::zeros(order.len());
    for (k, &flat) in order.iter().enumerate() {
        for (axis, i) in unravel_index(flat, &shape).into_iter().enumerate() {
            indices[[k, axis]] = i;
        }
        bin_counts[k] = counts.get(&flat).copied().unwrap_or(0);
    }
    tracing::trace!(occupied = order.len(), "sparse histogram");
    Ok(SparseHistogram {
        indices,
        counts: bin_counts,
        edges,
    })
}

/// Histogram of point radii with each bin divided by the volume of its
/// spherical shell, giving a radial density profile.
///
/// # Errors
///
/// Returns an error if the bin edges cannot be computed.
pub fn radial_histogram(
    points: &ArrayView2<f64>,
    bins: &BinSpec,
    limits: Option<(f64, f64)>,
) -> Result<Histogram> {
    let ndim = points.ncols();
    let radii = get_radii(points);
    let mut hist = histogram_1d(&radii.view(), bins, limits)?;
    let edges = hist.edges[0].clone();
    for (i, value) in hist.values.iter_mut().enumerate() {
        *value /= sphere_shell_volume(edges[i], edges[i + 1], ndim);
    }
    Ok(hist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PerAxis;
    use approx::assert_relative_eq;
    use ndarray::array;
    use std::f64::consts::PI;

    fn grid_points() -> Array2<f64> {
        Array2::from_shape_fn((100, 3), |(i, j)| ((i * (j + 3)) % 17) as f64 * 0.25 - 1.0)
    }

    #[test]
    fn test_histogram_counts_every_point() {
        let points = grid_points();
        for bins in [1, 3, 10, 25] {
            let config = HistogramConfig::new().with_bins(bins);
            let hist = histogram(&points.view(), &config).unwrap();
            assert_eq!(hist.values.shape(), &[bins, bins, bins]);
            assert_relative_eq!(hist.total(), 100.0);
        }
    }

    #[test]
    fn test_histogram_edge_conventions() {
        let points = array![[0.0], [0.5], [1.0], [2.0], [-0.1]];
        let config = HistogramConfig::new()
            .with_bins(2)
            .with_limits(0.0, 1.0);
        let hist = histogram(&points.view(), &config).unwrap();
        // 1.0 lands in the closed last bin; 2.0 and -0.1 are dropped
        assert_eq!(hist.values.as_slice().unwrap(), &[1.0, 2.0]);
        assert_eq!(hist.centers()[0], array![0.25, 0.75]);
    }

    #[test]
    fn test_histogram_explicit_edges() {
        let points = array![[0.1, 5.0], [0.9, 6.0], [0.5, 9.0]];
        let config = HistogramConfig::new().with_bin_specs(PerAxis::each(vec![
            BinSpec::Edges(vec![0.0, 0.5, 1.0]),
            BinSpec::Count(1),
        ]));
        let hist = histogram(&points.view(), &config).unwrap();
        assert_eq!(hist.values.shape(), &[2, 1]);
        assert_eq!(hist.values[IxDyn(&[0, 0])], 1.0);
        assert_eq!(hist.values[IxDyn(&[1, 0])], 2.0);
        assert_eq!(hist.edges[1], array![5.0, 9.0]);
    }

    #[test]
    fn test_histogram_1d() {
        let values = array![1.0, 2.0, 2.0, 3.0];
        let hist = histogram_1d(&values.view(), &BinSpec::Count(2), None).unwrap();
        assert_eq!(hist.values.as_slice().unwrap(), &[1.0, 3.0]);
        assert_eq!(hist.edges[0], array![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_sparse_matches_dense() {
        let points = grid_points();
        let config = HistogramConfig::new().with_bins(6);
        let dense = histogram(&points.view(), &config).unwrap();
        let sparse = sparse_histogram(&points.view(), &config).unwrap();

        assert_eq!(sparse.counts.sum(), 100);
        assert!(sparse.counts.iter().all(|&c| c > 0));
        assert_eq!(sparse.to_dense().values, dense.values);

        let last = dense.edges[0].len() - 1;
        assert_relative_eq!(
            sparse.edges[0][last],
            dense.edges[0][last] + SPARSE_EDGE_EPS
        );
    }

    #[test]
    fn test_sparse_first_seen_order() {
        let points = array![[0.9], [0.1], [0.95]];
        let config = HistogramConfig::new().with_bins(2).with_limits(0.0, 1.0);
        let sparse = sparse_histogram(&points.view(), &config).unwrap();
        assert_eq!(sparse.indices, array![[1], [0]]);
        assert_eq!(sparse.counts, array![2, 1]);
    }

    #[test]
    fn test_radial_histogram_density() {
        let points = array![[0.5, 0.0], [0.0, -1.5]];
        let hist =
            radial_histogram(&points.view(), &BinSpec::Count(2), Some((0.0, 2.0))).unwrap();
        let values = hist.values.as_slice().unwrap();
        assert_relative_eq!(values[0], 1.0 / PI);
        assert_relative_eq!(values[1], 1.0 / (3.0 * PI));
    }
}
