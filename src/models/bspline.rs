//! Tensor-product B-spline model.
//!
//! A [`BSpline`] owns its basis and its control points:
//! - `coefficients`: `1 × N`, one value per basis function;
//! - `knot_averages`: `num_variables × N`, the Greville abscissae of each
//!   basis function.
//!
//! Together they form the `(num_variables + 1) × N` control point matrix.
//! Structural edits go through the basis, which hands back a refinement
//! matrix `A`; both halves of the control points are updated with
//! `new = old · Aᵀ`. Every mutator works on a copy and only replaces `self`
//! once the copy has passed the shape checks.

use std::fmt;

use nalgebra::DMatrix;
use nalgebra_sparse::CsrMatrix;
use rayon::prelude::*;
use tracing::debug;

use crate::error::{Result, SplineError};
use crate::math::{TensorProductBasis, apply_refinement};

#[derive(Debug, Clone, PartialEq)]
pub struct BSpline {
    basis: TensorProductBasis,
    coefficients: DMatrix<f64>,
    knot_averages: DMatrix<f64>,
}

impl BSpline {
    /// Spline with all coefficients set to one.
    pub fn new(knot_vectors: Vec<Vec<f64>>, degrees: &[usize]) -> Result<Self> {
        let basis = TensorProductBasis::new(knot_vectors, degrees)?;
        let n = basis.num_basis_functions();
        Self::from_basis(basis, DMatrix::from_element(1, n, 1.0))
    }

    pub fn with_coefficients(
        coefficients: &[f64],
        knot_vectors: Vec<Vec<f64>>,
        degrees: &[usize],
    ) -> Result<Self> {
        let basis = TensorProductBasis::new(knot_vectors, degrees)?;
        Self::from_basis(basis, DMatrix::from_row_slice(1, coefficients.len(), coefficients))
    }

    /// Wrap a basis and a `1 × N` coefficient row; knot averages are derived
    /// from the basis.
    pub(crate) fn from_basis(basis: TensorProductBasis, coefficients: DMatrix<f64>) -> Result<Self> {
        let knot_averages = basis.knot_averages();
        let spline = Self {
            basis,
            coefficients,
            knot_averages,
        };
        spline.check_control_points()?;
        Ok(spline)
    }

    fn check_control_points(&self) -> Result<()> {
        let n = self.basis.num_basis_functions();
        if self.coefficients.nrows() != 1 {
            return Err(SplineError::InconsistentControlPoints(format!(
                "coefficients must be a single row, got {} rows",
                self.coefficients.nrows()
            )));
        }
        if self.coefficients.ncols() != n {
            return Err(SplineError::InconsistentControlPoints(format!(
                "{} coefficients for {n} basis functions",
                self.coefficients.ncols()
            )));
        }
        if self.knot_averages.ncols() != n {
            return Err(SplineError::InconsistentControlPoints(format!(
                "{} knot averages for {n} basis functions",
                self.knot_averages.ncols()
            )));
        }
        if self.knot_averages.nrows() != self.basis.num_variables() {
            return Err(SplineError::InconsistentControlPoints(format!(
                "knot averages have {} rows for {} variables",
                self.knot_averages.nrows(),
                self.basis.num_variables()
            )));
        }
        Ok(())
    }

    pub fn num_variables(&self) -> usize {
        self.basis.num_variables()
    }

    pub fn num_basis_functions(&self) -> usize {
        self.basis.num_basis_functions()
    }

    pub fn num_basis_functions_per_dim(&self) -> Vec<usize> {
        self.basis.num_basis_functions_per_dim()
    }

    pub fn basis(&self) -> &TensorProductBasis {
        &self.basis
    }

    pub fn coefficients(&self) -> &DMatrix<f64> {
        &self.coefficients
    }

    pub fn knot_averages(&self) -> &DMatrix<f64> {
        &self.knot_averages
    }

    /// Knot averages stacked over the coefficient row.
    pub fn control_points(&self) -> DMatrix<f64> {
        let d = self.num_variables();
        let mut out = DMatrix::zeros(d + 1, self.num_basis_functions());
        out.rows_mut(0, d).copy_from(&self.knot_averages);
        out.row_mut(d).copy_from(&self.coefficients);
        out
    }

    pub fn knot_vectors(&self) -> Vec<Vec<f64>> {
        self.basis.knot_vectors()
    }

    pub fn basis_degrees(&self) -> Vec<usize> {
        self.basis.degrees()
    }

    pub fn domain_lower_bound(&self) -> Vec<f64> {
        self.basis.support_lower_bound()
    }

    pub fn domain_upper_bound(&self) -> Vec<f64> {
        self.basis.support_upper_bound()
    }

    pub fn inside_domain(&self, x: &[f64]) -> bool {
        self.basis.inside_support(x)
    }

    pub fn set_coefficients(&mut self, coefficients: &[f64]) -> Result<()> {
        let mut next = self.clone();
        next.coefficients = DMatrix::from_row_slice(1, coefficients.len(), coefficients);
        next.check_control_points()?;
        *self = next;
        Ok(())
    }

    /// Replace the control points; the last row becomes the coefficients.
    pub fn set_control_points(&mut self, control_points: &DMatrix<f64>) -> Result<()> {
        let d = self.num_variables();
        if control_points.nrows() != d + 1 {
            return Err(SplineError::InconsistentControlPoints(format!(
                "control points need {} rows, got {}",
                d + 1,
                control_points.nrows()
            )));
        }
        let mut next = self.clone();
        next.knot_averages = control_points.rows(0, d).into_owned();
        next.coefficients = control_points.rows(d, 1).into_owned();
        next.check_control_points()?;
        *self = next;
        Ok(())
    }

    pub fn eval(&self, x: &[f64]) -> Result<f64> {
        let values = self.basis.eval(x)?;
        Ok(values.iter().map(|(j, v)| v * self.coefficients[(0, j)]).sum())
    }

    /// Evaluate many points in parallel.
    pub fn eval_batch(&self, points: &[Vec<f64>]) -> Result<Vec<f64>> {
        points.par_iter().map(|x| self.eval(x)).collect()
    }

    /// Gradient as a `1 × num_variables` row.
    pub fn eval_jacobian(&self, x: &[f64]) -> Result<DMatrix<f64>> {
        let columns = self.basis.eval_jacobian(x)?;
        let coefficients = self.coefficients.as_slice();
        Ok(DMatrix::from_iterator(
            1,
            columns.len(),
            columns.iter().map(|c| c.dot(coefficients)),
        ))
    }

    /// Symmetric `num_variables × num_variables` matrix of second partial
    /// derivatives.
    pub fn eval_hessian(&self, x: &[f64]) -> Result<DMatrix<f64>> {
        let lower = self.basis.eval_hessian(x)?;
        let coefficients = self.coefficients.as_slice();
        let d = self.num_variables();
        let mut out = DMatrix::zeros(d, d);
        for (i, row) in lower.iter().enumerate() {
            for (j, column) in row.iter().enumerate() {
                let value = column.dot(coefficients);
                out[(i, j)] = value;
                out[(j, i)] = value;
            }
        }
        Ok(out)
    }

    /// Replace the basis and map the control points through `a`.
    fn refined(&self, basis: TensorProductBasis, a: &CsrMatrix<f64>) -> Result<Self> {
        let n_old = self.num_basis_functions();
        let n_new = basis.num_basis_functions();
        if a.ncols() != n_old || a.nrows() != n_new {
            return Err(SplineError::RefinementShape {
                rows: a.nrows(),
                cols: a.ncols(),
                expected_rows: n_new,
                expected_cols: n_old,
            });
        }
        let next = Self {
            coefficients: apply_refinement(&self.coefficients, a)?,
            knot_averages: apply_refinement(&self.knot_averages, a)?,
            basis,
        };
        next.check_control_points()?;
        debug!(from = n_old, to = n_new, "refined control points");
        Ok(next)
    }

    pub fn global_knot_refinement(&mut self) -> Result<()> {
        let (basis, a) = self.basis.refine_knots()?;
        *self = self.refined(basis, &a)?;
        Ok(())
    }

    /// Insert one knot per dimension in the knot span containing `x`.
    pub fn local_knot_refinement(&mut self, x: &[f64]) -> Result<()> {
        let (basis, a) = self.basis.refine_knots_locally(x)?;
        *self = self.refined(basis, &a)?;
        Ok(())
    }

    pub fn decompose_to_bezier_form(&mut self) -> Result<()> {
        let (basis, a) = self.basis.decompose_to_bezier_form()?;
        *self = self.refined(basis, &a)?;
        Ok(())
    }

    pub fn insert_knots(&mut self, tau: f64, dim: usize, multiplicity: usize) -> Result<()> {
        let (basis, a) = self.basis.insert_knots(tau, dim, multiplicity)?;
        *self = self.refined(basis, &a)?;
        Ok(())
    }

    /// Restrict the spline to the box `[lb, ub]`.
    ///
    /// Basis functions that vanish on the box are dropped. With `regularize`
    /// the bounds are first inserted as knots of full multiplicity, so the
    /// reduced domain is exactly `[lb, ub]` and the knot vectors are open
    /// again.
    pub fn reduce_domain(&mut self, lb: &[f64], ub: &[f64], regularize: bool) -> Result<()> {
        let d = self.num_variables();
        for (what, bound) in [("lower bounds", lb), ("upper bounds", ub)] {
            if bound.len() != d {
                return Err(SplineError::DimensionMismatch {
                    what,
                    expected: d,
                    got: bound.len(),
                });
            }
        }

        let lower = self.domain_lower_bound();
        let upper = self.domain_upper_bound();
        for dim in 0..d {
            let (l, u, sl, su) = (lb[dim], ub[dim], lower[dim], upper[dim]);
            if !(l < u) || l >= su || u <= sl {
                return Err(SplineError::EmptyDomain { dim, lb: l, ub: u });
            }
            if su < u || sl > l {
                return Err(SplineError::ExpandedDomain {
                    dim,
                    lb: l,
                    ub: u,
                    lower: sl,
                    upper: su,
                });
            }
        }

        let mut basis = self.basis.clone();
        let mut a = CsrMatrix::identity(self.num_basis_functions());
        if regularize {
            for (dim, degree) in self.basis_degrees().into_iter().enumerate() {
                for bound in [lb[dim], ub[dim]] {
                    let missing = (degree + 1).saturating_sub(basis.knot_multiplicity(dim, bound)?);
                    if missing > 0 {
                        let (next, step) = basis.insert_knots(bound, dim, missing)?;
                        a = &step * &a;
                        basis = next;
                    }
                }
            }
        }
        let (basis, step) = basis.reduce_support(lb, ub)?;
        let a = &step * &a;

        *self = self.refined(basis, &a)?;
        debug!(?lb, ?ub, regularize, "reduced domain");
        Ok(())
    }
}

impl fmt::Display for BSpline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let degrees = self.basis_degrees();
        if degrees.windows(2).all(|w| w[0] == w[1]) {
            write!(f, "BSpline of degree {}", degrees[0])
        } else {
            let list: Vec<String> = degrees.iter().map(|p| p.to_string()).collect();
            write!(f, "BSpline of degrees ({})", list.join(", "))
        }
    }
}
