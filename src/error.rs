//! Error types for phase-space analysis.
//!
//! Every fallible operation in the crate returns [`Result`]. Errors are raised
//! immediately; nothing in the library retries or falls back to a partial
//! result.

use thiserror::Error;

/// Main error type for phase-space operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhaseSpaceError {
    /// An even number of phase-space coordinates was required.
    #[error("Expected an even number of dimensions, got {dim}")]
    OddDimension { dim: usize },

    /// Array shapes or list lengths disagree.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Axis index outside the array's dimensions.
    #[error("Invalid axis {axis} for {ndim}-dimensional data")]
    InvalidAxis { axis: usize, ndim: usize },

    /// Matrix could not be inverted.
    #[error("Singular matrix: {0}")]
    SingularMatrix(String),

    /// Other linear algebra failure (eigen-decomposition, square root).
    #[error("Linear algebra error: {0}")]
    Linalg(String),

    /// Operation is only defined up to a maximum dimension.
    #[error("Unsupported dimension {dim}: at most {max} dimensions are supported")]
    UnsupportedDimension { dim: usize, max: usize },

    /// Iterative solver stopped before meeting its tolerance.
    #[error("Optimizer did not converge after {iterations} iterations: {context}")]
    NonConvergence { iterations: usize, context: String },

    /// Argument outside its valid range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Not enough data to compute the requested quantity.
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// Numerical computation produced NaN or Inf.
    #[error("Numerical instability: {context}")]
    NumericalInstability { context: String },
}

/// Result type alias for phase-space operations.
pub type Result<T> = std::result::Result<T, PhaseSpaceError>;

impl PhaseSpaceError {
    /// Create an odd-dimension error.
    #[must_use]
    pub const fn odd_dimension(dim: usize) -> Self {
        Self::OddDimension { dim }
    }

    /// Create a dimension mismatch error.
    #[must_use]
    pub const fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }

    /// Create an invalid axis error.
    #[must_use]
    pub const fn invalid_axis(axis: usize, ndim: usize) -> Self {
        Self::InvalidAxis { axis, ndim }
    }

    /// Create a singular matrix error.
    #[must_use]
    pub fn singular(msg: impl Into<String>) -> Self {
        Self::SingularMatrix(msg.into())
    }

    /// Create a linear algebra error.
    #[must_use]
    pub fn linalg(msg: impl Into<String>) -> Self {
        Self::Linalg(msg.into())
    }

    /// Create an unsupported dimension error.
    #[must_use]
    pub const fn unsupported_dimension(dim: usize, max: usize) -> Self {
        Self::UnsupportedDimension { dim, max }
    }

    /// Create a non-convergence error.
    #[must_use]
    pub fn non_convergence(iterations: usize, context: impl Into<String>) -> Self {
        Self::NonConvergence {
            iterations,
            context: context.into(),
        }
    }

    /// Create an invalid argument error.
    #[must_use]
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create an empty input error.
    #[must_use]
    pub fn empty_input(msg: impl Into<String>) -> Self {
        Self::EmptyInput(msg.into())
    }

    /// Create a numerical instability error.
    #[must_use]
    pub fn numerical_instability(context: impl Into<String>) -> Self {
        Self::NumericalInstability {
            context: context.into(),
        }
    }
}

/// Require an even phase-space dimension.
pub(crate) fn ensure_even(dim: usize) -> Result<()> {
    if dim % 2 == 0 {
        Ok(())
    } else {
        Err(PhaseSpaceError::odd_dimension(dim))
    }
}
