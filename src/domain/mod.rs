//! Domain types used throughout the pipeline.
//!
//! This module defines the build configuration enums (`Degree`,
//! `KnotSpacing`, `Smoothing`) and the `BuildOptions` struct consumed by the
//! builder.

pub mod types;

pub use types::*;
