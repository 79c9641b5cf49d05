//! Spline construction from sample data.
//!
//! [`BSplineBuilder`] collects the build options, then [`BSplineBuilder::build`]
//! runs the pipeline:
//! - one knot vector per dimension from the unique sample coordinates;
//! - the tensor-product basis over those knot vectors;
//! - coefficients from the (optionally penalized) least-squares fit.
//!
//! The options are consumed by the build and not kept by the model.

use nalgebra::DMatrix;
use tracing::{debug, info};

use crate::data::DataTable;
use crate::domain::{BuildOptions, Degree, KnotSpacing, Smoothing};
use crate::error::{Result, SplineError};
use crate::fit::knot_vector::compute_knot_vector;
use crate::fit::solver::solve_coefficients;
use crate::math::TensorProductBasis;
use crate::models::BSpline;

#[derive(Debug, Clone)]
pub struct BSplineBuilder<'a> {
    data: &'a DataTable,
    options: BuildOptions,
}

impl<'a> BSplineBuilder<'a> {
    pub fn new(data: &'a DataTable) -> Self {
        Self {
            data,
            options: BuildOptions::default(),
        }
    }

    /// Same degree in every variable.
    pub fn degree(mut self, degree: Degree) -> Self {
        self.options.degrees = vec![degree; self.data.num_variables()];
        self
    }

    pub fn degrees(mut self, degrees: Vec<Degree>) -> Self {
        self.options.degrees = degrees;
        self
    }

    /// Same interior knot target in every variable.
    pub fn num_knots(mut self, num_knots: usize) -> Self {
        self.options.num_knots = vec![num_knots; self.data.num_variables()];
        self
    }

    pub fn num_knots_per_dim(mut self, num_knots: Vec<usize>) -> Self {
        self.options.num_knots = num_knots;
        self
    }

    pub fn knot_spacing(mut self, knot_spacing: KnotSpacing) -> Self {
        self.options.knot_spacing = knot_spacing;
        self
    }

    pub fn smoothing(mut self, smoothing: Smoothing) -> Self {
        self.options.smoothing = smoothing;
        self
    }

    pub fn lambda(mut self, lambda: f64) -> Self {
        self.options.lambda = lambda;
        self
    }

    /// Replace all options at once.
    pub fn options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    #[tracing::instrument(
        skip(self),
        fields(
            samples = self.data.num_samples(),
            variables = self.data.num_variables(),
        )
    )]
    pub fn build(&self) -> Result<BSpline> {
        if self.data.is_empty() {
            return Err(SplineError::EmptyDataTable);
        }
        let num_variables = self.data.num_variables();
        self.options.validate(num_variables)?;

        let degrees = self.options.resolved_degrees(num_variables);
        let knot_vectors = degrees
            .iter()
            .enumerate()
            .map(|(dim, &degree)| {
                compute_knot_vector(
                    &self.data.unique_sorted(dim),
                    degree,
                    self.options.knot_spacing,
                    self.options.knot_target(dim),
                )
            })
            .collect::<Result<Vec<_>>>()?;

        let basis = TensorProductBasis::new(knot_vectors, &degrees)?;
        debug!(
            basis_functions = basis.num_basis_functions(),
            per_dim = ?basis.num_basis_functions_per_dim(),
            "built basis"
        );

        let coefficients = solve_coefficients(
            self.data,
            &basis,
            self.options.smoothing,
            self.options.lambda,
        )?;
        let n = coefficients.len();
        let spline = BSpline::from_basis(basis, DMatrix::from_row_slice(1, n, coefficients.as_slice()))?;
        info!(
            spline = %spline,
            basis_functions = n,
            smoothing = ?self.options.smoothing,
            "fitted spline"
        );
        Ok(spline)
    }
}
