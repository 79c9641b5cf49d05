//! Fitted spline models.
//!
//! The model owns its basis and control points and keeps them consistent
//! through every structural edit.

pub mod bspline;

pub use bspline::*;
