//! Crate-wide error type.
//!
//! Every fallible operation returns [`Result`]. Errors are raised before any
//! model state is committed, so a failed call never leaves a half-updated
//! spline behind.

/// Broad category of a [`SplineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid build options or arguments.
    Configuration,
    /// A point or interval outside the spline's support.
    Domain,
    /// A broken internal invariant (shape mismatches between basis,
    /// coefficients and knot averages).
    Consistency,
    /// A numerical failure while fitting.
    Numeric,
    /// Failure while saving or loading a model.
    Persistence,
}

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum SplineError {
    #[error("penalty weight must be finite and non-negative, got {0}")]
    NegativeLambda(f64),
    #[error("expected {expected} per-dimension {what}, got {got}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("basis degree must be between 1 and 4, got {0}")]
    InvalidDegree(usize),
    #[error("dimension index {dim} out of range for a {num_variables}-variate spline")]
    DimensionOutOfRange { dim: usize, num_variables: usize },
    #[error("knot {tau} would get multiplicity {multiplicity}, the maximum is {max}")]
    KnotMultiplicityTooHigh {
        tau: f64,
        multiplicity: usize,
        max: usize,
    },
    #[error("data table has no samples")]
    EmptyDataTable,
    #[error("sample ({x:?}, {y}) has a non-finite coordinate")]
    NonFiniteSample { x: Vec<f64>, y: f64 },

    #[error("point {0:?} is outside the spline domain")]
    OutsideDomain(Vec<f64>),
    #[error("cannot reduce domain in dimension {dim} to the empty set [{lb}, {ub}]")]
    EmptyDomain { dim: usize, lb: f64, ub: f64 },
    #[error("cannot expand domain in dimension {dim}: [{lb}, {ub}] is not inside [{lower}, {upper}]")]
    ExpandedDomain {
        dim: usize,
        lb: f64,
        ub: f64,
        lower: f64,
        upper: f64,
    },
    #[error("knot {tau} is outside the support [{lower}, {upper}]")]
    KnotOutsideSupport { tau: f64, lower: f64, upper: f64 },

    #[error("inconsistent control points: {0}")]
    InconsistentControlPoints(String),
    #[error("refinement matrix is {rows}x{cols}, expected {expected_rows}x{expected_cols}")]
    RefinementShape {
        rows: usize,
        cols: usize,
        expected_rows: usize,
        expected_cols: usize,
    },
    #[error("invalid knot vector: {0}")]
    InvalidKnotVector(String),

    #[error("singular normal equations: {0}")]
    SingularSystem(String),
    #[error("insufficient samples: {0}")]
    InsufficientSamples(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SplineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SplineError::NegativeLambda(_)
            | SplineError::DimensionMismatch { .. }
            | SplineError::InvalidDegree(_)
            | SplineError::DimensionOutOfRange { .. }
            | SplineError::KnotMultiplicityTooHigh { .. }
            | SplineError::EmptyDataTable
            | SplineError::NonFiniteSample { .. } => ErrorKind::Configuration,
            SplineError::OutsideDomain(_)
            | SplineError::EmptyDomain { .. }
            | SplineError::ExpandedDomain { .. }
            | SplineError::KnotOutsideSupport { .. } => ErrorKind::Domain,
            SplineError::InconsistentControlPoints(_)
            | SplineError::RefinementShape { .. }
            | SplineError::InvalidKnotVector(_) => ErrorKind::Consistency,
            SplineError::SingularSystem(_) | SplineError::InsufficientSamples(_) => {
                ErrorKind::Numeric
            }
            SplineError::Io(_) | SplineError::Json(_) => ErrorKind::Persistence,
        }
    }
}

pub type Result<T, E = SplineError> = std::result::Result<T, E>;
