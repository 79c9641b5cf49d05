//! Mathematical core: B-spline bases, sparse helpers and the normal-equation
//! solver.

pub mod basis;
pub mod ols;
pub mod sparse;
pub mod tensor;

pub use basis::*;
pub use ols::*;
pub use sparse::*;
pub use tensor::*;
