//! Spline fitting.
//!
//! Responsibilities:
//!
//! - generate one knot vector per input variable (`knot_vector`)
//! - assemble and solve the least-squares system for the coefficients
//!   (`solver`)
//! - drive both from user options (`builder`)

pub mod builder;
pub mod knot_vector;
pub mod solver;

pub use builder::*;
pub use knot_vector::*;
pub use solver::*;
