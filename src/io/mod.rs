//! Input/output helpers.
//!
//! - opaque save/load of fitted splines (`model_file`)

pub mod model_file;

pub use model_file::*;
