//! Sparse helpers on top of `nalgebra-sparse`.
//!
//! Refinement matrices are stored as CSR matrices of shape
//! `(new count × old count)`. The helpers here build them (Kronecker
//! embedding, composition) and apply them to dense control-point data with
//! the update rule `new = old · Aᵀ`.

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CsrMatrix};

use crate::error::{Result, SplineError};

/// A sparse vector with sorted indices.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseVector {
    len: usize,
    indices: Vec<usize>,
    values: Vec<f64>,
}

impl SparseVector {
    /// Build from sorted, unique `indices` and matching `values`.
    ///
    /// # Panics
    /// Panics if `indices` and `values` differ in length.
    pub fn from_parts(len: usize, indices: Vec<usize>, values: Vec<f64>) -> Self {
        assert_eq!(indices.len(), values.len(), "index/value length mismatch");
        debug_assert!(indices.windows(2).all(|w| w[0] < w[1]));
        debug_assert!(indices.last().map_or(true, |&i| i < len));
        Self {
            len,
            indices,
            values,
        }
    }

    /// Contiguous block of values starting at `first`.
    pub fn from_block(len: usize, first: usize, values: Vec<f64>) -> Self {
        let indices = (first..first + values.len()).collect();
        Self::from_parts(len, indices, values)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    pub fn get(&self, i: usize) -> f64 {
        self.indices
            .binary_search(&i)
            .map_or(0.0, |pos| self.values[pos])
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Inner product with a dense slice of length `len()`.
    pub fn dot(&self, dense: &[f64]) -> f64 {
        self.iter().map(|(i, v)| v * dense[i]).sum()
    }

    pub fn to_dense(&self) -> DVector<f64> {
        let mut out = DVector::zeros(self.len);
        for (i, v) in self.iter() {
            out[i] = v;
        }
        out
    }

    /// Kronecker product `self ⊗ other`; `other`'s index varies fastest.
    pub fn kron(&self, other: &SparseVector) -> SparseVector {
        let mut indices = Vec::with_capacity(self.nnz() * other.nnz());
        let mut values = Vec::with_capacity(self.nnz() * other.nnz());
        for (i, a) in self.iter() {
            for (j, b) in other.iter() {
                indices.push(i * other.len + j);
                values.push(a * b);
            }
        }
        SparseVector::from_parts(self.len * other.len, indices, values)
    }
}

/// Kronecker product of two CSR matrices.
pub fn kron(a: &CsrMatrix<f64>, b: &CsrMatrix<f64>) -> CsrMatrix<f64> {
    let mut coo = CooMatrix::new(a.nrows() * b.nrows(), a.ncols() * b.ncols());
    for (ia, ja, va) in a.triplet_iter() {
        for (ib, jb, vb) in b.triplet_iter() {
            coo.push(ia * b.nrows() + ib, ja * b.ncols() + jb, va * vb);
        }
    }
    CsrMatrix::from(&coo)
}

/// `I_before ⊗ a ⊗ I_after`.
pub fn embed(a: &CsrMatrix<f64>, before: usize, after: usize) -> CsrMatrix<f64> {
    let mut out = a.clone();
    if before > 1 {
        out = kron(&CsrMatrix::identity(before), &out);
    }
    if after > 1 {
        out = kron(&out, &CsrMatrix::identity(after));
    }
    out
}

/// Apply a refinement matrix to row-oriented control data: `m · aᵀ`.
///
/// `m` has one column per old basis function; the result has one column per
/// new basis function and the same number of rows.
pub fn apply_refinement(m: &DMatrix<f64>, a: &CsrMatrix<f64>) -> Result<DMatrix<f64>> {
    if m.ncols() != a.ncols() {
        return Err(SplineError::RefinementShape {
            rows: a.nrows(),
            cols: a.ncols(),
            expected_rows: a.nrows(),
            expected_cols: m.ncols(),
        });
    }
    Ok((a * &m.transpose()).transpose())
}
