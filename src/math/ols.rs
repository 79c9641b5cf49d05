//! Least squares via the normal equations.
//!
//! The fitting problems here are of the form
//!
//! ```text
//! minimize ‖B c - y‖² + λ ‖P c‖²
//! ```
//!
//! with a sparse design matrix `B` and an optional penalty `P`. They are
//! solved through `(BᵀB + λPᵀP) c = Bᵀy`, whose matrix is symmetric positive
//! (semi-)definite:
//! - sparse Cholesky factorisation `A = L Lᵀ` of the normal matrix;
//! - a pivot `L_jj²` that is tiny relative to `A_jj` marks a column that is
//!   (numerically) a combination of earlier ones;
//! - a failed factorisation, a rank-deficient pivot, a non-finite solution or
//!   a large residual is reported as a singular system, never patched up.

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CscMatrix;
use nalgebra_sparse::factorization::CscCholesky;

use crate::error::{Result, SplineError};

/// Relative residual tolerance for accepting a solution.
const RESIDUAL_TOL: f64 = 1e-8;

/// Smallest accepted ratio `L_jj² / A_jj`.
const RANK_TOL: f64 = 1e-10;

/// Solve the symmetric positive definite system `a · x = b`.
pub fn solve_normal_equations(a: &CscMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>> {
    let n = a.nrows();
    if a.ncols() != n || n != b.len() {
        return Err(SplineError::SingularSystem(format!(
            "system is {}x{} with a right-hand side of length {}",
            n,
            a.ncols(),
            b.len()
        )));
    }

    let mut diagonal = vec![0.0; n];
    for (i, j, &v) in a.triplet_iter() {
        if i == j {
            diagonal[i] += v;
        }
    }
    if let Some(j) = diagonal.iter().position(|&d| !(d.is_finite() && d > 0.0)) {
        return Err(SplineError::SingularSystem(format!(
            "normal matrix has diagonal entry {} at column {j}",
            diagonal[j]
        )));
    }

    let chol = CscCholesky::factor(a).map_err(|e| {
        SplineError::SingularSystem(format!("normal matrix is not positive definite: {e:?}"))
    })?;
    for (i, j, &l) in chol.l().triplet_iter() {
        if i == j && !(l * l >= RANK_TOL * diagonal[j]) {
            return Err(SplineError::SingularSystem(format!(
                "normal matrix is rank deficient at column {j}"
            )));
        }
    }

    let rhs = DMatrix::from_column_slice(n, 1, b.as_slice());
    let x = chol.solve(&rhs);
    if !x.iter().all(|v| v.is_finite()) {
        return Err(SplineError::SingularSystem(
            "solution has non-finite entries".to_string(),
        ));
    }

    let residual = (a * &x - &rhs).norm();
    let a_norm = a.values().iter().map(|v| v * v).sum::<f64>().sqrt();
    let scale = a_norm * x.norm() + b.norm();
    if residual > RESIDUAL_TOL * scale.max(1.0) {
        return Err(SplineError::SingularSystem(format!(
            "residual {residual:.3e} exceeds tolerance"
        )));
    }
    Ok(DVector::from_column_slice(x.as_slice()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csc(rows: usize, values: &[f64]) -> CscMatrix<f64> {
        CscMatrix::from(&DMatrix::from_row_slice(rows, values.len() / rows, values))
    }

    #[test]
    fn solves_line_fit_normal_equations() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);
        let a = CscMatrix::from(&(x.transpose() * &x));
        let beta = solve_normal_equations(&a, &(x.transpose() * y)).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn rank_deficient_system_is_rejected() {
        let b = DVector::from_row_slice(&[1.0, 1.0]);
        let exact = csc(2, &[1.0, 1.0, 1.0, 1.0]);
        assert!(matches!(
            solve_normal_equations(&exact, &b),
            Err(SplineError::SingularSystem(_))
        ));

        // Rounding leaves a tiny positive pivot; it must not be accepted.
        let nearly = csc(2, &[1.0, 1.0, 1.0, 1.0 + 1e-14]);
        assert!(matches!(
            solve_normal_equations(&nearly, &b),
            Err(SplineError::SingularSystem(_))
        ));

        let zero_column = csc(2, &[1.0, 0.0, 0.0, 0.0]);
        assert!(matches!(
            solve_normal_equations(&zero_column, &b),
            Err(SplineError::SingularSystem(_))
        ));
    }

    #[test]
    fn well_conditioned_sparse_system_solves() {
        // Tridiagonal [2 -1 0; -1 2 -1; 0 -1 2] with solution [1, 2, 3].
        let a = csc(3, &[2.0, -1.0, 0.0, -1.0, 2.0, -1.0, 0.0, -1.0, 2.0]);
        let b = DVector::from_row_slice(&[0.0, 0.0, 4.0]);
        let x = solve_normal_equations(&a, &b).unwrap();
        assert!((x - DVector::from_row_slice(&[1.0, 2.0, 3.0])).norm() < 1e-12);
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let a = CscMatrix::identity(2);
        let b = DVector::from_row_slice(&[1.0, 1.0, 1.0]);
        assert!(solve_normal_equations(&a, &b).is_err());
    }
}
