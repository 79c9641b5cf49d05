//! Control coefficient fitting.
//!
//! The coefficients `c` of a spline with basis `B` are fitted to samples
//! `(x_i, y_i)` by least squares on the design matrix `B_ij = B_j(x_i)`:
//!
//! - [`Smoothing::None`]: `(BᵀB) c = Bᵀy`
//! - [`Smoothing::Regularization`]: `(BᵀB + λI) c = Bᵀy`
//! - [`Smoothing::PSpline`]: `(BᵀB + λDᵀD) c = Bᵀy`, `D` the second-order
//!   difference operator applied along every dimension
//!
//! All three share the same assembly; only the penalty term differs.

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CscMatrix, CsrMatrix};
use tracing::debug;

use crate::data::DataTable;
use crate::domain::Smoothing;
use crate::error::{Result, SplineError};
use crate::math::{TensorProductBasis, embed, solve_normal_equations};

/// Design matrix: one row per sample, one column per basis function.
pub fn basis_function_matrix(
    data: &DataTable,
    basis: &TensorProductBasis,
) -> Result<CsrMatrix<f64>> {
    let mut coo = CooMatrix::new(data.num_samples(), basis.num_basis_functions());
    for (row, sample) in data.iter().enumerate() {
        for (col, value) in basis.eval(sample.x())?.iter() {
            if value != 0.0 {
                coo.push(row, col, value);
            }
        }
    }
    Ok(CsrMatrix::from(&coo))
}

/// Sample outputs in table order.
pub fn control_point_rhs(data: &DataTable) -> DVector<f64> {
    DVector::from_vec(data.y_values())
}

/// Stacked second-order difference operators, one block per dimension.
///
/// Block `k` is `I ⊗ … ⊗ D₂(n_k) ⊗ … ⊗ I`. Dimensions with fewer than three
/// basis functions have no second differences and contribute no rows.
pub fn second_difference_matrix(basis: &TensorProductBasis) -> CsrMatrix<f64> {
    let counts = basis.num_basis_functions_per_dim();
    let total = basis.num_basis_functions();

    let blocks: Vec<CsrMatrix<f64>> = counts
        .iter()
        .enumerate()
        .filter(|&(_, &n)| n >= 3)
        .map(|(k, &n)| {
            let before: usize = counts[..k].iter().product();
            let after: usize = counts[k + 1..].iter().product();
            embed(&difference_operator(n), before, after)
        })
        .collect();

    let rows = blocks.iter().map(|b| b.nrows()).sum();
    let mut coo = CooMatrix::new(rows, total);
    let mut offset = 0;
    for block in &blocks {
        for (i, j, &v) in block.triplet_iter() {
            coo.push(offset + i, j, v);
        }
        offset += block.nrows();
    }
    CsrMatrix::from(&coo)
}

/// `(n-2) × n` matrix with rows `[1, -2, 1]`.
fn difference_operator(n: usize) -> CsrMatrix<f64> {
    let mut coo = CooMatrix::new(n - 2, n);
    for i in 0..n - 2 {
        coo.push(i, i, 1.0);
        coo.push(i, i + 1, -2.0);
        coo.push(i, i + 2, 1.0);
    }
    CsrMatrix::from(&coo)
}

/// Fit the coefficient vector of `basis` to `data`.
pub fn solve_coefficients(
    data: &DataTable,
    basis: &TensorProductBasis,
    smoothing: Smoothing,
    lambda: f64,
) -> Result<DVector<f64>> {
    if data.is_empty() {
        return Err(SplineError::EmptyDataTable);
    }
    if !(lambda.is_finite() && lambda >= 0.0) {
        return Err(SplineError::NegativeLambda(lambda));
    }
    let num_coefficients = basis.num_basis_functions();
    if smoothing == Smoothing::None && data.num_samples() < num_coefficients {
        return Err(SplineError::InsufficientSamples(format!(
            "{} samples for {num_coefficients} coefficients",
            data.num_samples()
        )));
    }

    let b = basis_function_matrix(data, basis)?;
    let y = control_point_rhs(data);
    debug!(
        samples = b.nrows(),
        coefficients = num_coefficients,
        nnz = b.nnz(),
        ?smoothing,
        lambda,
        "assembled design matrix"
    );

    let bt = b.transpose();
    let mut lhs = &bt * &b;
    match smoothing {
        Smoothing::None => {}
        Smoothing::Regularization => {
            lhs = &lhs + &(CsrMatrix::identity(num_coefficients) * lambda);
        }
        Smoothing::PSpline => {
            let d = second_difference_matrix(basis);
            lhs = &lhs + &((&d.transpose() * &d) * lambda);
        }
    }
    let rhs = &bt * &DMatrix::from_column_slice(y.len(), 1, y.as_slice());
    debug!(nnz = lhs.nnz(), "assembled normal equations");

    solve_normal_equations(
        &CscMatrix::from(&lhs),
        &DVector::from_column_slice(rhs.as_slice()),
    )
}
