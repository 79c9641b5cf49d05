//! Knot vector generation.
//!
//! One open knot vector is generated per input dimension from that
//! dimension's sorted unique sample coordinates. The boundary knots are the
//! smallest and largest coordinate, each repeated `degree + 1` times; the
//! strategies differ only in where the interior knots go.
//!
//! With `N` unique values and degree `p` the default interior count is
//! `N - p - 1`, which gives exactly `N` basis functions. An explicit target
//! interior count can lower that (all strategies) or raise it (equidistant
//! only).

use tracing::{debug, warn};

use crate::domain::KnotSpacing;
use crate::error::{Result, SplineError};

/// Default cap on the number of segments for [`KnotSpacing::Experimental`].
const MAX_EXPERIMENTAL_SEGMENTS: usize = 10;

/// Build an open knot vector for strictly increasing `values`.
pub fn compute_knot_vector(
    values: &[f64],
    degree: usize,
    spacing: KnotSpacing,
    target: Option<usize>,
) -> Result<Vec<f64>> {
    if degree == 0 {
        return Err(SplineError::InvalidDegree(degree));
    }
    if values.iter().any(|v| !v.is_finite()) || values.windows(2).any(|w| w[0] >= w[1]) {
        return Err(SplineError::InvalidKnotVector(
            "sample coordinates must be finite and strictly increasing".to_string(),
        ));
    }
    if degree >= values.len() {
        return Err(SplineError::InsufficientSamples(format!(
            "{} unique values cannot support a degree {degree} basis",
            values.len()
        )));
    }

    let interior = match spacing {
        KnotSpacing::Sample => moving_average_knots(values, degree, target),
        KnotSpacing::Equidistant => equidistant_knots(values, degree, target),
        KnotSpacing::Experimental => bucketed_knots(values, degree, target),
    };
    debug!(
        ?spacing,
        degree,
        unique_values = values.len(),
        interior = interior.len(),
        "computed knot vector"
    );

    let (lo, hi) = (values[0], values[values.len() - 1]);
    let mut knots = Vec::with_capacity(interior.len() + 2 * (degree + 1));
    knots.extend(std::iter::repeat(lo).take(degree + 1));
    knots.extend(interior);
    knots.extend(std::iter::repeat(hi).take(degree + 1));
    Ok(knots)
}

fn default_interior(values: &[f64], degree: usize) -> usize {
    values.len() - degree - 1
}

/// Interior knots as sliding-window averages of `degree` coordinates.
fn moving_average_knots(values: &[f64], degree: usize, target: Option<usize>) -> Vec<f64> {
    let max = default_interior(values, degree);
    let count = match target {
        Some(t) if t > max => {
            warn!(
                requested = t,
                max, "too many knots requested for sample spacing, clamping"
            );
            max
        }
        Some(t) => t,
        None => max,
    };

    let thinned;
    let values = if count < max {
        thinned = thin(values, count + degree + 1);
        &thinned[..]
    } else {
        values
    };

    (1..=count)
        .map(|j| values[j..j + degree].iter().sum::<f64>() / degree as f64)
        .collect()
}

/// Keep `keep` values at evenly spaced indices, including both ends.
fn thin(values: &[f64], keep: usize) -> Vec<f64> {
    let last = (values.len() - 1) as f64;
    let steps = (keep - 1) as f64;
    (0..keep)
        .map(|i| values[(i as f64 * last / steps).round() as usize])
        .collect()
}

/// Interior knots evenly spaced strictly inside `[min, max]`.
fn equidistant_knots(values: &[f64], degree: usize, target: Option<usize>) -> Vec<f64> {
    let count = target.unwrap_or_else(|| default_interior(values, degree));
    let (lo, hi) = (values[0], values[values.len() - 1]);
    (1..=count)
        .map(|i| lo + (hi - lo) * i as f64 / (count + 1) as f64)
        .collect()
}

/// Interior knots between equally populated buckets of coordinates.
fn bucketed_knots(values: &[f64], degree: usize, target: Option<usize>) -> Vec<f64> {
    let max_segments = target.map_or(MAX_EXPERIMENTAL_SEGMENTS, |t| t + 1);
    let segments = max_segments.min(default_interior(values, degree) + 1);

    let base = values.len() / segments;
    let larger = values.len() % segments;
    let mut knots = Vec::with_capacity(segments - 1);
    let mut end = 0;
    for bucket in 0..segments - 1 {
        end += base + usize::from(bucket < larger);
        knots.push((values[end - 1] + values[end]) / 2.0);
    }
    knots
}
