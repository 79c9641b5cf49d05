//! Sample data: the sorted sample table and a seeded synthetic generator.

pub mod sample;
pub mod synthetic;

pub use sample::*;
pub use synthetic::*;
