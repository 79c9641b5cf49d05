//! Seeded synthetic sample generation.
//!
//! Handy for exercising the fitting pipeline on a known function: inputs are
//! drawn uniformly inside a box and Gaussian noise is added to the outputs.
//! The same seed always produces the same table.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::data::sample::DataTable;
use crate::error::{Result, SplineError};

/// Settings for [`generate_samples`].
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// Lower corner of the sampling box.
    pub lower: Vec<f64>,
    /// Upper corner of the sampling box.
    pub upper: Vec<f64>,
    pub sample_count: usize,
    /// Standard deviation of the additive output noise. Zero, negative or
    /// non-finite values disable noise.
    pub noise_std: f64,
    pub seed: u64,
}

/// Sample `f` at `sample_count` random points of the configured box.
pub fn generate_samples<F>(config: &SyntheticConfig, f: F) -> Result<DataTable>
where
    F: Fn(&[f64]) -> f64,
{
    if config.sample_count == 0 {
        return Err(SplineError::InsufficientSamples(
            "sample count must be > 0".to_string(),
        ));
    }
    if config.lower.len() != config.upper.len() {
        return Err(SplineError::DimensionMismatch {
            what: "upper bounds",
            expected: config.lower.len(),
            got: config.upper.len(),
        });
    }
    for (dim, (&lo, &hi)) in config.lower.iter().zip(&config.upper).enumerate() {
        if !(lo.is_finite() && hi.is_finite() && hi > lo) {
            return Err(SplineError::EmptyDomain { dim, lb: lo, ub: hi });
        }
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let noise = if config.noise_std > 0.0 {
        Normal::new(0.0, config.noise_std).ok()
    } else {
        None
    };

    let mut table = DataTable::new();
    for _ in 0..config.sample_count {
        let x: Vec<f64> = config
            .lower
            .iter()
            .zip(&config.upper)
            .map(|(&lo, &hi)| rng.gen_range(lo..=hi))
            .collect();
        let eps = noise.map_or(0.0, |n| n.sample(&mut rng));
        let y = f(&x) + eps;
        table.add_sample(x, y)?;
    }
    Ok(table)
}

/// Sample `f` on the full tensor grid spanned by `axes`.
///
/// The resulting table has `∏ axes[d].len()` samples.
pub fn grid_samples<F>(axes: &[Vec<f64>], f: F) -> Result<DataTable>
where
    F: Fn(&[f64]) -> f64,
{
    let mut table = DataTable::new();
    if axes.is_empty() || axes.iter().any(|a| a.is_empty()) {
        return Ok(table);
    }

    let mut idx = vec![0usize; axes.len()];
    loop {
        let x: Vec<f64> = idx.iter().enumerate().map(|(d, &i)| axes[d][i]).collect();
        let y = f(&x);
        table.add_sample(x, y)?;

        // Odometer increment, last dimension fastest.
        let mut d = axes.len();
        loop {
            if d == 0 {
                return Ok(table);
            }
            d -= 1;
            idx[d] += 1;
            if idx[d] < axes[d].len() {
                break;
            }
            idx[d] = 0;
        }
    }
}

/// `count` evenly spaced values on `[lo, hi]` (inclusive).
pub fn linspace(lo: f64, hi: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![lo],
        _ => {
            let step = (hi - lo) / (count as f64 - 1.0);
            (0..count).map(|i| lo + step * i as f64).collect()
        }
    }
}
