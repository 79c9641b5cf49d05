//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so a build
//! configuration can be stored next to the data it was used on and replayed
//! later.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SplineError};

/// Polynomial degree of the basis functions in one variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Degree {
    Linear,
    Quadratic,
    #[default]
    Cubic,
    Quartic,
}

impl Degree {
    pub fn as_usize(self) -> usize {
        match self {
            Degree::Linear => 1,
            Degree::Quadratic => 2,
            Degree::Cubic => 3,
            Degree::Quartic => 4,
        }
    }
}

impl TryFrom<usize> for Degree {
    type Error = SplineError;

    fn try_from(value: usize) -> Result<Self> {
        match value {
            1 => Ok(Degree::Linear),
            2 => Ok(Degree::Quadratic),
            3 => Ok(Degree::Cubic),
            4 => Ok(Degree::Quartic),
            other => Err(SplineError::InvalidDegree(other)),
        }
    }
}

/// How interior knots are placed relative to the sample coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KnotSpacing {
    /// Moving average of consecutive sample coordinates, so knots follow the
    /// sample density.
    #[default]
    Sample,
    /// Evenly spaced between the smallest and largest coordinate.
    Equidistant,
    /// Equal-population buckets with one knot per bucket boundary.
    Experimental,
}

/// Penalty added to the least-squares objective when fitting coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Smoothing {
    /// Plain least squares.
    #[default]
    None,
    /// `λ‖c‖²`, shrinks the control values.
    Regularization,
    /// `λ‖Dc‖²` with `D` the second-order difference operator, penalizes
    /// control-point curvature.
    PSpline,
}

/// Options consumed by [`crate::fit::BSplineBuilder`].
///
/// Per-dimension vectors must either be empty (use the defaults) or have one
/// entry per input variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// One degree per input variable. Empty means cubic in every variable.
    pub degrees: Vec<Degree>,
    /// Target interior knot count per input variable. Empty lets the knot
    /// spacing strategy decide from the data.
    pub num_knots: Vec<usize>,
    pub knot_spacing: KnotSpacing,
    pub smoothing: Smoothing,
    /// Penalty weight; must be non-negative. Ignored by `Smoothing::None`.
    pub lambda: f64,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            degrees: Vec::new(),
            num_knots: Vec::new(),
            knot_spacing: KnotSpacing::default(),
            smoothing: Smoothing::default(),
            lambda: 0.03,
        }
    }
}

impl BuildOptions {
    /// Check the options against the dimensionality of the data.
    pub fn validate(&self, num_variables: usize) -> Result<()> {
        if !(self.lambda.is_finite() && self.lambda >= 0.0) {
            return Err(SplineError::NegativeLambda(self.lambda));
        }
        if !self.degrees.is_empty() && self.degrees.len() != num_variables {
            return Err(SplineError::DimensionMismatch {
                what: "degrees",
                expected: num_variables,
                got: self.degrees.len(),
            });
        }
        if !self.num_knots.is_empty() && self.num_knots.len() != num_variables {
            return Err(SplineError::DimensionMismatch {
                what: "knot counts",
                expected: num_variables,
                got: self.num_knots.len(),
            });
        }
        Ok(())
    }

    /// Degrees resolved against the number of variables.
    pub fn resolved_degrees(&self, num_variables: usize) -> Vec<usize> {
        if self.degrees.is_empty() {
            vec![Degree::default().as_usize(); num_variables]
        } else {
            self.degrees.iter().map(|d| d.as_usize()).collect()
        }
    }

    /// Interior knot target for one dimension, if any.
    pub fn knot_target(&self, dim: usize) -> Option<usize> {
        self.num_knots.get(dim).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degree_round_trips_through_usize() {
        for d in 1..=4 {
            assert_eq!(Degree::try_from(d).unwrap().as_usize(), d);
        }
        assert!(matches!(Degree::try_from(5), Err(SplineError::InvalidDegree(5))));
        assert!(matches!(Degree::try_from(0), Err(SplineError::InvalidDegree(0))));
    }

    #[test]
    fn validate_rejects_negative_lambda() {
        let opts = BuildOptions {
            lambda: -0.5,
            ..Default::default()
        };
        assert!(matches!(opts.validate(1), Err(SplineError::NegativeLambda(_))));
    }

    #[test]
    fn validate_rejects_mismatched_lengths() {
        let opts = BuildOptions {
            degrees: vec![Degree::Linear, Degree::Cubic],
            ..Default::default()
        };
        assert!(opts.validate(2).is_ok());
        assert!(matches!(
            opts.validate(3),
            Err(SplineError::DimensionMismatch { expected: 3, got: 2, .. })
        ));

        let opts = BuildOptions {
            num_knots: vec![4],
            ..Default::default()
        };
        assert!(opts.validate(2).is_err());
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let opts: BuildOptions =
            serde_json::from_str(r#"{"knot_spacing":"equidistant","smoothing":"pspline"}"#).unwrap();
        assert_eq!(opts.knot_spacing, KnotSpacing::Equidistant);
        assert_eq!(opts.smoothing, Smoothing::PSpline);
        assert!(opts.degrees.is_empty());
        assert_eq!(opts.resolved_degrees(2), vec![3, 3]);
    }
}
