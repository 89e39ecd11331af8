//! Phase-Space Distribution Library
//!
//! Analysis of particle-beam distributions in phase space.
//!
//! A distribution is represented either as a point cloud (an `(n, d)` array
//! of particle coordinates) or as an image (a dense `d`-dimensional histogram
//! with bin coordinates). Covariance analysis turns either representation
//! into Twiss parameters, emittances and normalization matrices.
//!
//! # Features
//!
//! - **Covariance analysis**: Twiss parameters, apparent and intrinsic
//!   emittances, coupled or per-plane symplectic normalization
//! - **Point clouds**: moments, radii, slices, histograms, bounding ellipses,
//!   downsampling and kernel density estimates
//! - **Images**: ordered projections, contour-sliced projections, weighted
//!   moments, radial profiles and sampling
//! - **Transfer matrices**: rotations and phase advances
//!
//! # Quick Start
//!
//! ```
//! use ndarray::array;
//! use psdist::{cov, points, NormalizationOptions};
//!
//! let particles = array![
//!     [1.0, 0.5],
//!     [-1.0, -0.3],
//!     [0.5, 0.4],
//!     [-0.4, -0.6],
//!     [0.2, 0.1],
//! ];
//!
//! let sigma = points::covariance_matrix(&particles.view())?;
//! let params = cov::twiss(&sigma)?;
//! assert_eq!(params.len(), 1);
//!
//! // Transform to normalized coordinates with unit covariance
//! let options = NormalizationOptions::new().with_scale(true);
//! let v_inv = cov::normalization_matrix(&sigma, options)?;
//! let normalized = points::transform_linear(&particles.view(), &v_inv)?;
//! let s = points::covariance_matrix(&normalized.view())?;
//! assert!((s[(0, 0)] - 1.0).abs() < 1e-8);
//! # Ok::<(), psdist::PhaseSpaceError>(())
//! ```
//!
//! # Conventions
//!
//! | Quantity | Convention |
//! |----------|------------|
//! | Covariance | Unbiased sample estimate (`n - 1`) for point clouds |
//! | Coordinates | Planes ordered `(x, x', y, y', z, z')` |
//! | Normalization | `V⁻¹` maps physical to normalized coordinates |
//! | Histogram bins | Half-open, the last bin closed |

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod config;
pub mod cov;
pub mod error;
pub mod image;
pub mod math;
pub mod points;
pub mod transfer;

// Re-exports for convenient access
pub use config::{
    BinSpec, ContourMode, ContourSliceConfig, DownsampleSize, FitConfig, HistogramConfig,
    LimitsConfig, NormalizationOptions, PerAxis, SliceBounds,
};
pub use cov::{NormalizationMatrix, RmsEllipse, Twiss};
pub use error::{PhaseSpaceError, Result};
pub use points::{BoundingEllipse, GaussianKde, Histogram, Selection, SparseHistogram};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
