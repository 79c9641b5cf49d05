//! `splinter` library crate.
//!
//! Fits tensor-product B-splines to scattered samples and edits the fitted
//! piecewise polynomials without changing them (knot insertion, refinement,
//! Bezier decomposition, domain reduction).
//!
//! - `data`: sorted sample table and synthetic sample generation
//! - `domain`: build options
//! - `math`: univariate and tensor-product bases, sparse helpers, solver
//! - `fit`: knot vectors, coefficient fitting and the builder
//! - `models`: the fitted [`BSpline`]
//! - `io`: save/load

pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;

pub use data::{DataTable, Sample};
pub use domain::{BuildOptions, Degree, KnotSpacing, Smoothing};
pub use error::{ErrorKind, Result, SplineError};
pub use fit::BSplineBuilder;
pub use models::BSpline;
