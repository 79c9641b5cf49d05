//! Tensor-product B-spline basis.
//!
//! The multivariate basis is the Kronecker product of one
//! [`UnivariateBasis`] per input dimension. Flat basis indices follow the
//! Kronecker order: the last dimension varies fastest.
//!
//! Structural edits return the `(N_new × N_old)` refinement matrix. For an
//! edit of dimension `d` the matrix is `I_before ⊗ A_d ⊗ I_after`; edits of
//! several dimensions are applied one after another and their matrices
//! composed.

use nalgebra::DMatrix;
use nalgebra_sparse::CsrMatrix;
use tracing::trace;

use crate::error::{Result, SplineError};
use crate::math::basis::UnivariateBasis;
use crate::math::sparse::{SparseVector, embed};

#[derive(Debug, Clone, PartialEq)]
pub struct TensorProductBasis {
    bases: Vec<UnivariateBasis>,
}

impl TensorProductBasis {
    pub fn new(knot_vectors: Vec<Vec<f64>>, degrees: &[usize]) -> Result<Self> {
        if knot_vectors.is_empty() {
            return Err(SplineError::InvalidKnotVector(
                "a basis needs at least one dimension".to_string(),
            ));
        }
        if knot_vectors.len() != degrees.len() {
            return Err(SplineError::DimensionMismatch {
                what: "basis degrees",
                expected: knot_vectors.len(),
                got: degrees.len(),
            });
        }
        let bases = knot_vectors
            .into_iter()
            .zip(degrees)
            .map(|(knots, &p)| UnivariateBasis::new(knots, p))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { bases })
    }

    pub fn num_variables(&self) -> usize {
        self.bases.len()
    }

    pub fn num_basis_functions(&self) -> usize {
        self.bases.iter().map(|b| b.num_basis_functions()).product()
    }

    pub fn num_basis_functions_per_dim(&self) -> Vec<usize> {
        self.bases.iter().map(|b| b.num_basis_functions()).collect()
    }

    pub fn bases(&self) -> &[UnivariateBasis] {
        &self.bases
    }

    pub fn knot_vectors(&self) -> Vec<Vec<f64>> {
        self.bases.iter().map(|b| b.knots().to_vec()).collect()
    }

    pub fn degrees(&self) -> Vec<usize> {
        self.bases.iter().map(|b| b.degree()).collect()
    }

    pub fn support_lower_bound(&self) -> Vec<f64> {
        self.bases.iter().map(|b| b.support_lower()).collect()
    }

    pub fn support_upper_bound(&self) -> Vec<f64> {
        self.bases.iter().map(|b| b.support_upper()).collect()
    }

    pub fn inside_support(&self, x: &[f64]) -> bool {
        x.len() == self.bases.len()
            && self.bases.iter().zip(x).all(|(b, &xi)| b.inside_support(xi))
    }

    pub fn knot_multiplicity(&self, dim: usize, value: f64) -> Result<usize> {
        Ok(self.basis(dim)?.knot_multiplicity(value))
    }

    fn basis(&self, dim: usize) -> Result<&UnivariateBasis> {
        self.bases.get(dim).ok_or(SplineError::DimensionOutOfRange {
            dim,
            num_variables: self.bases.len(),
        })
    }

    fn check_point(&self, x: &[f64]) -> Result<()> {
        if x.len() != self.bases.len() {
            return Err(SplineError::DimensionMismatch {
                what: "point coordinates",
                expected: self.bases.len(),
                got: x.len(),
            });
        }
        if !self.inside_support(x) {
            return Err(SplineError::OutsideDomain(x.to_vec()));
        }
        Ok(())
    }

    /// Per-dimension derivative tables: `out[d][k]` holds the `k`-th
    /// derivatives of dimension `d`'s basis at `x[d]`.
    fn univariate_derivatives(&self, x: &[f64], order: usize) -> Result<Vec<Vec<SparseVector>>> {
        self.check_point(x)?;
        self.bases
            .iter()
            .zip(x)
            .map(|(b, &xi)| b.eval_derivatives(xi, order))
            .collect()
    }

    /// Values of all basis functions at `x`; at most `∏ (p_d + 1)` entries
    /// are non-zero.
    pub fn eval(&self, x: &[f64]) -> Result<SparseVector> {
        self.check_point(x)?;
        let parts = self
            .bases
            .iter()
            .zip(x)
            .map(|(b, &xi)| b.eval(xi))
            .collect::<Result<Vec<_>>>()?;
        Ok(kron_all(parts.iter()))
    }

    /// First partial derivatives of all basis functions, one sparse column
    /// per dimension.
    pub fn eval_jacobian(&self, x: &[f64]) -> Result<Vec<SparseVector>> {
        let ders = self.univariate_derivatives(x, 1)?;
        Ok((0..self.bases.len())
            .map(|k| {
                kron_all(
                    ders.iter()
                        .enumerate()
                        .map(|(d, table)| &table[usize::from(d == k)]),
                )
            })
            .collect())
    }

    /// Second partial derivatives of all basis functions.
    ///
    /// Only the lower triangle is returned: row `i` holds the columns
    /// `j = 0..=i`.
    pub fn eval_hessian(&self, x: &[f64]) -> Result<Vec<Vec<SparseVector>>> {
        let ders = self.univariate_derivatives(x, 2)?;
        Ok((0..self.bases.len())
            .map(|i| {
                (0..=i)
                    .map(|j| {
                        kron_all(ders.iter().enumerate().map(|(d, table)| {
                            let order = usize::from(d == i) + usize::from(d == j);
                            &table[order]
                        }))
                    })
                    .collect()
            })
            .collect())
    }

    /// Knot averages laid out as a `(num_variables × N)` matrix: column `j`
    /// holds the averages of basis function `j`'s multi-index.
    pub fn knot_averages(&self) -> DMatrix<f64> {
        let per_dim: Vec<Vec<f64>> = self.bases.iter().map(|b| b.knot_averages()).collect();
        let counts = self.num_basis_functions_per_dim();
        let total = self.num_basis_functions();

        let mut out = DMatrix::zeros(self.bases.len(), total);
        let mut stride = total;
        for (d, averages) in per_dim.iter().enumerate() {
            stride /= counts[d];
            for j in 0..total {
                out[(d, j)] = averages[(j / stride) % counts[d]];
            }
        }
        out
    }

    /// Apply a univariate edit to the listed dimensions, in order.
    fn edit_dims<F>(&self, dims: &[usize], mut edit: F) -> Result<(Self, CsrMatrix<f64>)>
    where
        F: FnMut(usize, &UnivariateBasis) -> Result<(UnivariateBasis, CsrMatrix<f64>)>,
    {
        let old_count = self.num_basis_functions();
        let mut bases = self.bases.clone();
        let mut total = CsrMatrix::identity(old_count);

        for &dim in dims {
            let (edited, a) = edit(dim, &bases[dim])?;
            // Earlier dimensions are already edited, later ones not yet.
            let before: usize = bases[..dim].iter().map(|b| b.num_basis_functions()).product();
            let after: usize = bases[dim + 1..]
                .iter()
                .map(|b| b.num_basis_functions())
                .product();
            trace!(
                dim,
                rows = a.nrows(),
                cols = a.ncols(),
                before,
                after,
                "embedding univariate refinement"
            );
            total = &embed(&a, before, after) * &total;
            bases[dim] = edited;
        }

        let edited = Self { bases };
        let new_count = edited.num_basis_functions();
        if total.nrows() != new_count || total.ncols() != old_count {
            return Err(SplineError::RefinementShape {
                rows: total.nrows(),
                cols: total.ncols(),
                expected_rows: new_count,
                expected_cols: old_count,
            });
        }
        Ok((edited, total))
    }

    fn all_dims(&self) -> Vec<usize> {
        (0..self.bases.len()).collect()
    }

    pub fn insert_knots(
        &self,
        tau: f64,
        dim: usize,
        multiplicity: usize,
    ) -> Result<(Self, CsrMatrix<f64>)> {
        self.basis(dim)?;
        self.edit_dims(&[dim], |_, b| b.insert_knots(tau, multiplicity))
    }

    pub fn refine_knots(&self) -> Result<(Self, CsrMatrix<f64>)> {
        self.edit_dims(&self.all_dims(), |_, b| b.refine_knots())
    }

    pub fn refine_knots_locally(&self, x: &[f64]) -> Result<(Self, CsrMatrix<f64>)> {
        self.check_point(x)?;
        self.edit_dims(&self.all_dims(), |d, b| b.refine_knots_locally(x[d]))
    }

    pub fn decompose_to_bezier_form(&self) -> Result<(Self, CsrMatrix<f64>)> {
        self.edit_dims(&self.all_dims(), |_, b| b.decompose_to_bezier_form())
    }

    /// Drop basis functions that vanish on the box `[lb, ub]`.
    pub fn reduce_support(&self, lb: &[f64], ub: &[f64]) -> Result<(Self, CsrMatrix<f64>)> {
        let n = self.bases.len();
        for (what, bound) in [("lower bounds", lb), ("upper bounds", ub)] {
            if bound.len() != n {
                return Err(SplineError::DimensionMismatch {
                    what,
                    expected: n,
                    got: bound.len(),
                });
            }
        }
        for (dim, b) in self.bases.iter().enumerate() {
            let (lo, hi) = (b.support_lower(), b.support_upper());
            if !(lb[dim] < ub[dim]) {
                return Err(SplineError::EmptyDomain {
                    dim,
                    lb: lb[dim],
                    ub: ub[dim],
                });
            }
            if lb[dim] < lo || ub[dim] > hi {
                return Err(SplineError::ExpandedDomain {
                    dim,
                    lb: lb[dim],
                    ub: ub[dim],
                    lower: lo,
                    upper: hi,
                });
            }
        }
        self.edit_dims(&self.all_dims(), |d, b| b.reduce_support(lb[d], ub[d]))
    }
}

/// Kronecker product of a sequence of sparse vectors, first one slowest.
fn kron_all<'a>(mut parts: impl Iterator<Item = &'a SparseVector>) -> SparseVector {
    let first = parts
        .next()
        .cloned()
        .unwrap_or_else(|| SparseVector::from_block(1, 0, vec![1.0]));
    parts.fold(first, |acc, v| acc.kron(v))
}

#[cfg(test)]
mod tests {
    use nalgebra::DVector;

    use super::*;

    fn open(lo: f64, hi: f64, interior: &[f64], p: usize) -> Vec<f64> {
        let mut knots = vec![lo; p + 1];
        knots.extend_from_slice(interior);
        knots.extend(std::iter::repeat(hi).take(p + 1));
        knots
    }

    fn bivariate() -> TensorProductBasis {
        TensorProductBasis::new(
            vec![open(0.0, 1.0, &[0.5], 2), open(-1.0, 1.0, &[-0.5, 0.0, 0.5], 1)],
            &[2, 1],
        )
        .unwrap()
    }

    fn coefficients(n: usize) -> DVector<f64> {
        DVector::from_iterator(n, (0..n).map(|i| ((i * 7 + 3) % 11) as f64 - 4.0))
    }

    fn grid() -> Vec<[f64; 2]> {
        let mut pts = Vec::new();
        for i in 0..=8 {
            for j in 0..=8 {
                pts.push([i as f64 / 8.0, -1.0 + j as f64 / 4.0]);
            }
        }
        pts
    }

    #[test]
    fn counts_and_bounds() {
        let b = bivariate();
        assert_eq!(b.num_variables(), 2);
        assert_eq!(b.num_basis_functions_per_dim(), vec![4, 5]);
        assert_eq!(b.num_basis_functions(), 20);
        assert_eq!(b.support_lower_bound(), vec![0.0, -1.0]);
        assert_eq!(b.support_upper_bound(), vec![1.0, 1.0]);
        assert_eq!(b.degrees(), vec![2, 1]);
        assert_eq!(b.knot_multiplicity(1, 1.0).unwrap(), 2);
        assert!(b.knot_multiplicity(2, 1.0).is_err());
    }

    #[test]
    fn rejects_mismatched_degrees() {
        let err = TensorProductBasis::new(vec![open(0.0, 1.0, &[], 1)], &[1, 1]).unwrap_err();
        assert!(matches!(err, SplineError::DimensionMismatch { .. }));
    }

    #[test]
    fn eval_is_partition_of_unity() {
        let b = bivariate();
        for x in grid() {
            let v = b.eval(&x).unwrap();
            assert!(v.nnz() <= 3 * 2);
            assert!((v.sum() - 1.0).abs() < 1e-12);
        }
        assert!(matches!(
            b.eval(&[1.5, 0.0]),
            Err(SplineError::OutsideDomain(_))
        ));
        assert!(b.eval(&[0.5]).is_err());
    }

    #[test]
    fn eval_uses_kronecker_order() {
        let b = bivariate();
        let x = [0.3, 0.2];
        let v = b.eval(&x).unwrap();
        let u0 = b.bases()[0].eval(x[0]).unwrap();
        let u1 = b.bases()[1].eval(x[1]).unwrap();
        for i in 0..4 {
            for j in 0..5 {
                assert!((v.get(i * 5 + j) - u0.get(i) * u1.get(j)).abs() < 1e-15);
            }
        }
    }

    #[test]
    fn knot_averages_follow_flat_index() {
        let b = bivariate();
        let avg = b.knot_averages();
        assert_eq!(avg.shape(), (2, 20));
        let a0 = b.bases()[0].knot_averages();
        let a1 = b.bases()[1].knot_averages();
        assert_eq!(avg[(0, 7)], a0[1]);
        assert_eq!(avg[(1, 7)], a1[2]);
        assert_eq!(avg[(0, 19)], a0[3]);
        assert_eq!(avg[(1, 19)], a1[4]);
    }

    #[test]
    fn hessian_of_degree_one_dimension_vanishes() {
        let b = bivariate();
        let h = b.eval_hessian(&[0.3, 0.2]).unwrap();
        assert_eq!(h.len(), 2);
        assert_eq!(h[1].len(), 2);
        assert!(h[1][1].values().iter().all(|&v| v == 0.0));
        assert!(h[0][0].values().iter().any(|&v| v != 0.0));
    }

    fn assert_exact(
        before: &TensorProductBasis,
        after: &TensorProductBasis,
        a: &CsrMatrix<f64>,
    ) {
        assert_eq!(a.ncols(), before.num_basis_functions());
        assert_eq!(a.nrows(), after.num_basis_functions());
        let c = coefficients(before.num_basis_functions());
        let c_new = DMatrix::from(a) * &c;
        for x in grid() {
            if !after.inside_support(&x) {
                continue;
            }
            let old = before.eval(&x).unwrap().dot(c.as_slice());
            let new = after.eval(&x).unwrap().dot(c_new.as_slice());
            assert!((old - new).abs() < 1e-12, "{x:?}: {old} vs {new}");
        }
    }

    #[test]
    fn edits_preserve_the_represented_function() {
        let b = bivariate();

        let (inserted, a) = b.insert_knots(0.25, 0, 2).unwrap();
        assert_eq!(inserted.num_basis_functions_per_dim(), vec![6, 5]);
        assert_exact(&b, &inserted, &a);

        let (inserted, a) = b.insert_knots(0.3, 1, 1).unwrap();
        assert_eq!(inserted.num_basis_functions_per_dim(), vec![4, 6]);
        assert_exact(&b, &inserted, &a);

        let (refined, a) = b.refine_knots().unwrap();
        assert_exact(&b, &refined, &a);

        let (local, a) = b.refine_knots_locally(&[0.3, 0.2]).unwrap();
        assert_eq!(local.num_basis_functions(), 5 * 6);
        assert_exact(&b, &local, &a);

        let (bezier, a) = b.decompose_to_bezier_form().unwrap();
        assert_exact(&b, &bezier, &a);

        let (reduced, a) = b.reduce_support(&[0.1, -0.2], &[0.4, 0.3]).unwrap();
        assert!(reduced.num_basis_functions() < b.num_basis_functions());
        assert_exact(&b, &reduced, &a);
    }

    #[test]
    fn failed_edit_reports_error() {
        let b = bivariate();
        assert!(matches!(
            b.insert_knots(0.5, 5, 1),
            Err(SplineError::DimensionOutOfRange { .. })
        ));
        assert!(matches!(
            b.reduce_support(&[0.0, 0.5], &[1.0, 0.5]),
            Err(SplineError::EmptyDomain { dim: 1, .. })
        ));
        assert!(matches!(
            b.reduce_support(&[0.0, -2.0], &[1.0, 0.5]),
            Err(SplineError::ExpandedDomain { dim: 1, .. })
        ));
    }
}
