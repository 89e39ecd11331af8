//! Configuration for binning, slicing, limits and fitting.
//!
//! Parameters that may be given either once for every axis or separately per
//! axis are expressed as [`PerAxis`], which is resolved to a canonical
//! per-axis list exactly once when an operation starts.
//!
//! # Example
//!
//! ```
//! use psdist::config::{BinSpec, HistogramConfig, PerAxis};
//!
//! // 32 bins on every axis
//! let config = HistogramConfig::default().with_bins(32);
//! assert_eq!(config.bins.resolve(2).unwrap().len(), 2);
//!
//! // explicit per-axis bin counts
//! let config = HistogramConfig::default()
//!     .with_bin_specs(PerAxis::each(vec![BinSpec::Count(10), BinSpec::Count(20)]));
//! assert!(config.bins.resolve(3).is_err());
//! ```

use crate::error::{PhaseSpaceError, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A parameter given once for all axes or once per axis.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PerAxis<T> {
    /// Same value on every axis.
    Uniform(T),
    /// One value per axis, in axis order.
    Each(Vec<T>),
}

impl<T: Clone> PerAxis<T> {
    /// Same value on every axis.
    #[must_use]
    pub const fn uniform(value: T) -> Self {
        Self::Uniform(value)
    }

    /// One value per axis.
    #[must_use]
    pub const fn each(values: Vec<T>) -> Self {
        Self::Each(values)
    }

    /// Expand into exactly `ndim` values.
    ///
    /// # Errors
    ///
    /// Returns an error if a per-axis list does not have `ndim` entries.
    pub fn resolve(&self, ndim: usize) -> Result<Vec<T>> {
        match self {
            Self::Uniform(value) => Ok(vec![value.clone(); ndim]),
            Self::Each(values) if values.len() == ndim => Ok(values.clone()),
            Self::Each(values) => Err(PhaseSpaceError::dimension_mismatch(ndim, values.len())),
        }
    }
}

/// Binning along one axis.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BinSpec {
    /// Number of equal-width bins spanning the axis limits.
    Count(usize),
    /// Explicit, monotonically increasing bin edges.
    Edges(Vec<f64>),
}

impl Default for BinSpec {
    fn default() -> Self {
        Self::Count(10)
    }
}

impl BinSpec {
    /// Number of bins produced.
    #[must_use]
    pub fn n_bins(&self) -> usize {
        match self {
            Self::Count(n) => *n,
            Self::Edges(edges) => edges.len().saturating_sub(1),
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Self::Count(0) => Err(PhaseSpaceError::invalid_argument(
                "bin count must be at least 1",
            )),
            Self::Count(_) => Ok(()),
            Self::Edges(edges) => {
                if edges.len() < 2 {
                    return Err(PhaseSpaceError::invalid_argument(
                        "at least two bin edges are required",
                    ));
                }
                if edges.windows(2).any(|w| !(w[1] > w[0])) {
                    return Err(PhaseSpaceError::invalid_argument(
                        "bin edges must be strictly increasing",
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Configuration for n-dimensional histograms.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HistogramConfig {
    /// Bin count or explicit edges along each axis.
    pub bins: PerAxis<BinSpec>,

    /// `(min, max)` range along each axis. `None` uses the data range.
    /// Ignored on axes whose bins are given as explicit edges.
    pub limits: Option<PerAxis<(f64, f64)>>,
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            bins: PerAxis::Uniform(BinSpec::default()),
            limits: None,
        }
    }
}

impl HistogramConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `n` equal-width bins on every axis.
    #[must_use]
    pub fn with_bins(mut self, n: usize) -> Self {
        self.bins = PerAxis::Uniform(BinSpec::Count(n));
        self
    }

    /// Set the bin specification.
    #[must_use]
    pub fn with_bin_specs(mut self, bins: PerAxis<BinSpec>) -> Self {
        self.bins = bins;
        self
    }

    /// Set the same limits on every axis.
    #[must_use]
    pub fn with_limits(mut self, min: f64, max: f64) -> Self {
        self.limits = Some(PerAxis::Uniform((min, max)));
        self
    }

    /// Set per-axis limits.
    #[must_use]
    pub fn with_axis_limits(mut self, limits: Vec<(f64, f64)>) -> Self {
        self.limits = Some(PerAxis::Each(limits));
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error on empty bin counts, non-increasing edges or inverted
    /// limits.
    pub fn validate(&self) -> Result<()> {
        match &self.bins {
            PerAxis::Uniform(spec) => spec.validate()?,
            PerAxis::Each(specs) => {
                for spec in specs {
                    spec.validate()?;
                }
            }
        }
        let check = |(lo, hi): &(f64, f64)| {
            if lo.is_finite() && hi.is_finite() && lo <= hi {
                Ok(())
            } else {
                Err(PhaseSpaceError::invalid_argument(format!(
                    "invalid histogram limits ({lo}, {hi})"
                )))
            }
        };
        match &self.limits {
            None => Ok(()),
            Some(PerAxis::Uniform(limits)) => check(limits),
            Some(PerAxis::Each(limits)) => limits.iter().try_for_each(check),
        }
    }
}

/// Configuration for computing plotting/binning limits of a point cloud.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LimitsConfig {
    /// If set, limits are `mean ± rms * std` instead of the data min/max.
    pub rms: Option<f64>,

    /// Fractional padding applied to the half-width of each range.
    pub pad: f64,

    /// Force limits symmetric about zero.
    pub zero_center: bool,

    /// Groups of axes that share a common range (e.g. `[[0, 2], [1, 3]]`).
    pub share: Vec<Vec<usize>>,
}

impl LimitsConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `mean ± rms * std` limits.
    #[must_use]
    pub fn with_rms(mut self, rms: f64) -> Self {
        self.rms = Some(rms);
        self
    }

    /// Set fractional padding.
    #[must_use]
    pub fn with_pad(mut self, pad: f64) -> Self {
        self.pad = pad;
        self
    }

    /// Center limits on zero.
    #[must_use]
    pub fn with_zero_center(mut self, zero_center: bool) -> Self {
        self.zero_center = zero_center;
        self
    }

    /// Add a group of axes that share limits.
    #[must_use]
    pub fn with_shared(mut self, axes: Vec<usize>) -> Self {
        self.share.push(axes);
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `rms` is not positive or `pad` is negative.
    pub fn validate(&self) -> Result<()> {
        if let Some(rms) = self.rms {
            if !(rms > 0.0) {
                return Err(PhaseSpaceError::invalid_argument("rms must be positive"));
            }
        }
        if !(self.pad >= 0.0) {
            return Err(PhaseSpaceError::invalid_argument(
                "pad must be non-negative",
            ));
        }
        Ok(())
    }
}

/// How point densities are looked up in a contour slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ContourMode {
    /// Multilinear interpolation of the normalized histogram at each point.
    #[default]
    Interpolated,
    /// Exact bin membership: a point is kept if the bin it falls in has an
    /// accepted level. Considerably slower.
    ExactBin,
}

/// Configuration for density-contour slices.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContourSliceConfig {
    /// Lower contour level (fraction of peak density).
    pub lmin: f64,

    /// Upper contour level (fraction of peak density).
    pub lmax: f64,

    /// Density lookup strategy.
    pub mode: ContourMode,

    /// Histogram used to estimate the density.
    pub histogram: HistogramConfig,
}

impl Default for ContourSliceConfig {
    fn default() -> Self {
        Self {
            lmin: 0.0,
            lmax: 1.0,
            mode: ContourMode::Interpolated,
            histogram: HistogramConfig::default(),
        }
    }
}

impl ContourSliceConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set contour levels.
    #[must_use]
    pub fn with_levels(mut self, lmin: f64, lmax: f64) -> Self {
        self.lmin = lmin;
        self.lmax = lmax;
        self
    }

    /// Set the density lookup strategy.
    #[must_use]
    pub fn with_mode(mut self, mode: ContourMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the histogram configuration.
    #[must_use]
    pub fn with_histogram(mut self, histogram: HistogramConfig) -> Self {
        self.histogram = histogram;
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the levels are not finite and ordered.
    pub fn validate(&self) -> Result<()> {
        if !(self.lmin.is_finite() && self.lmax.is_finite() && self.lmin <= self.lmax) {
            return Err(PhaseSpaceError::invalid_argument(format!(
                "contour levels must satisfy lmin <= lmax, got ({}, {})",
                self.lmin, self.lmax
            )));
        }
        self.histogram.validate()
    }
}

/// Box bounds of a planar slice over the sliced axes.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SliceBounds {
    /// Box of the given width around a center.
    CenterWidth {
        /// Box center along each sliced axis.
        center: PerAxis<f64>,
        /// Full box width along each sliced axis.
        width: PerAxis<f64>,
    },
    /// Explicit `(min, max)` along each sliced axis.
    Limits(PerAxis<(f64, f64)>),
}

impl SliceBounds {
    /// Box around `center` with the same `width` on every axis.
    #[must_use]
    pub const fn centered(center: f64, width: f64) -> Self {
        Self::CenterWidth {
            center: PerAxis::Uniform(center),
            width: PerAxis::Uniform(width),
        }
    }

    /// Explicit `(min, max)` along each sliced axis.
    #[must_use]
    pub const fn limits(limits: Vec<(f64, f64)>) -> Self {
        Self::Limits(PerAxis::Each(limits))
    }

    /// Resolve to `(min, max)` for each of `ndim` sliced axes.
    ///
    /// # Errors
    ///
    /// Returns an error if a per-axis list has the wrong length or a width is
    /// negative.
    pub fn resolve(&self, ndim: usize) -> Result<Vec<(f64, f64)>> {
        match self {
            Self::Limits(limits) => limits.resolve(ndim),
            Self::CenterWidth { center, width } => {
                let center = center.resolve(ndim)?;
                let width = width.resolve(ndim)?;
                center
                    .into_iter()
                    .zip(width)
                    .map(|(c, w)| {
                        if w >= 0.0 {
                            Ok((c - 0.5 * w, c + 0.5 * w))
                        } else {
                            Err(PhaseSpaceError::invalid_argument(format!(
                                "slice width must be non-negative, got {w}"
                            )))
                        }
                    })
                    .collect()
            }
        }
    }
}

/// Number of points kept by a random downsample.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DownsampleSize {
    /// Keep this many points (capped at the number available).
    Count(usize),
    /// Keep `floor(fraction * n)` points.
    Fraction(f64),
}

impl DownsampleSize {
    /// Number of points to keep out of `n`.
    ///
    /// # Errors
    ///
    /// Returns an error if a fraction lies outside `[0, 1]`.
    pub fn resolve(&self, n: usize) -> Result<usize> {
        match *self {
            Self::Count(k) => Ok(k.min(n)),
            Self::Fraction(frac) if (0.0..=1.0).contains(&frac) => {
                Ok(((frac * n as f64).floor() as usize).min(n))
            }
            Self::Fraction(frac) => Err(PhaseSpaceError::invalid_argument(format!(
                "downsample fraction must lie in [0, 1], got {frac}"
            ))),
        }
    }
}

/// Options for [`crate::cov::normalization_matrix`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NormalizationOptions {
    /// Divide out the emittance so each normalized plane has unit covariance.
    pub scale: bool,

    /// Normalize each 2x2 diagonal block independently, ignoring cross-plane
    /// correlations.
    pub block_diag: bool,
}

impl NormalizationOptions {
    /// Create options with default values (coupled, unscaled).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            scale: false,
            block_diag: false,
        }
    }

    /// Enable or disable emittance scaling.
    #[must_use]
    pub const fn with_scale(mut self, scale: bool) -> Self {
        self.scale = scale;
        self
    }

    /// Enable or disable block-diagonal normalization.
    #[must_use]
    pub const fn with_block_diag(mut self, block_diag: bool) -> Self {
        self.block_diag = block_diag;
        self
    }
}

/// Configuration for the bounding-ellipse optimizer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FitConfig {
    /// Maximum number of simplex iterations.
    pub max_iterations: usize,

    /// Convergence threshold on the simplex diameter.
    pub x_tolerance: f64,

    /// Convergence threshold on the spread of objective values.
    pub f_tolerance: f64,

    /// Lower bound on beta.
    pub min_beta: f64,

    /// Relative size of the initial simplex.
    pub initial_step: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5000,
            x_tolerance: 1e-9,
            f_tolerance: 1e-12,
            min_beta: 1e-8,
            initial_step: 0.1,
        }
    }
}

impl FitConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the iteration limit.
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set both convergence tolerances.
    #[must_use]
    pub const fn with_tolerance(mut self, x_tolerance: f64, f_tolerance: f64) -> Self {
        self.x_tolerance = x_tolerance;
        self.f_tolerance = f_tolerance;
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(PhaseSpaceError::invalid_argument(
                "max_iterations must be at least 1",
            ));
        }
        if !(self.x_tolerance > 0.0 && self.f_tolerance > 0.0) {
            return Err(PhaseSpaceError::invalid_argument(
                "tolerances must be positive",
            ));
        }
        if !(self.min_beta > 0.0) {
            return Err(PhaseSpaceError::invalid_argument(
                "min_beta must be positive",
            ));
        }
        if !(self.initial_step > 0.0) {
            return Err(PhaseSpaceError::invalid_argument(
                "initial_step must be positive",
            ));
        }
        Ok(())
    }
}
