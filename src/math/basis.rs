//! Univariate B-spline basis.
//!
//! A basis is a non-decreasing knot vector `t_0 ≤ … ≤ t_{n+p}` and a degree
//! `p`; it spans `n` basis functions. The support is `[t_p, t_n]`, the
//! interval on which the basis is complete (the functions sum to one). For
//! the open knot vectors produced by the builder this is the whole knot
//! range.
//!
//! Structural edits never mutate a basis. They return the edited basis
//! together with the `(n_new × n_old)` matrix that maps old control values to
//! new ones so that the represented function is unchanged on the support.

use nalgebra_sparse::{CooMatrix, CsrMatrix};

use crate::error::{Result, SplineError};
use crate::math::sparse::SparseVector;

/// Relative/absolute tolerance used when deciding if a point sits on a knot.
const KNOT_EPS: f64 = 1e-6;

fn is_near(a: f64, b: f64) -> bool {
    let diff = (a - b).abs();
    diff <= KNOT_EPS || diff <= KNOT_EPS * a.abs().max(b.abs())
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnivariateBasis {
    knots: Vec<f64>,
    degree: usize,
}

impl UnivariateBasis {
    pub fn new(knots: Vec<f64>, degree: usize) -> Result<Self> {
        if degree == 0 {
            return Err(SplineError::InvalidDegree(degree));
        }
        if knots.len() < 2 * (degree + 1) {
            return Err(SplineError::InvalidKnotVector(format!(
                "{} knots cannot carry a degree {degree} basis (need at least {})",
                knots.len(),
                2 * (degree + 1)
            )));
        }
        if knots.iter().any(|t| !t.is_finite()) {
            return Err(SplineError::InvalidKnotVector("non-finite knot".to_string()));
        }
        if knots.windows(2).any(|w| w[0] > w[1]) {
            return Err(SplineError::InvalidKnotVector("knots must be non-decreasing".to_string()));
        }
        let basis = Self { knots, degree };
        if let Some(t) = basis
            .knots
            .iter()
            .find(|&&t| basis.knot_multiplicity(t) > degree + 1)
        {
            return Err(SplineError::InvalidKnotVector(format!(
                "knot {t} repeated more than {} times",
                degree + 1
            )));
        }
        if basis.support_lower() >= basis.support_upper() {
            return Err(SplineError::InvalidKnotVector("empty support".to_string()));
        }
        Ok(basis)
    }

    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn num_basis_functions(&self) -> usize {
        self.knots.len() - self.degree - 1
    }

    pub fn support_lower(&self) -> f64 {
        self.knots[self.degree]
    }

    pub fn support_upper(&self) -> f64 {
        self.knots[self.num_basis_functions()]
    }

    pub fn inside_support(&self, x: f64) -> bool {
        self.support_lower() <= x && x <= self.support_upper()
    }

    pub fn knot_multiplicity(&self, value: f64) -> usize {
        self.knots.iter().filter(|&&t| t == value).count()
    }

    /// Greville abscissae: `(t_{j+1} + … + t_{j+p}) / p` for each basis
    /// function `j`.
    pub fn knot_averages(&self) -> Vec<f64> {
        let p = self.degree;
        (0..self.num_basis_functions())
            .map(|j| self.knots[j + 1..=j + p].iter().sum::<f64>() / p as f64)
            .collect()
    }

    /// Index `μ` of the knot span `[t_μ, t_{μ+1})` containing `x`.
    ///
    /// The upper support bound belongs to the last non-empty span.
    fn span(&self, x: f64) -> usize {
        let p = self.degree;
        let n = self.num_basis_functions();
        if x >= self.knots[n] {
            return (p..n)
                .rev()
                .find(|&mu| self.knots[mu] < self.knots[mu + 1])
                .unwrap_or(n - 1);
        }
        let mu = self.knots.partition_point(|&t| t <= x).saturating_sub(1);
        mu.clamp(p, n - 1)
    }

    fn check_inside(&self, x: f64) -> Result<()> {
        if self.inside_support(x) {
            Ok(())
        } else {
            Err(SplineError::OutsideDomain(vec![x]))
        }
    }

    /// Values of the `p + 1` basis functions that can be non-zero at `x`.
    pub fn eval(&self, x: f64) -> Result<SparseVector> {
        self.check_inside(x)?;
        let mu = self.span(x);
        let mut ders = self.ders_basis_funs(mu, x, 0);
        Ok(SparseVector::from_block(
            self.num_basis_functions(),
            mu - self.degree,
            ders.swap_remove(0),
        ))
    }

    /// Derivatives of order `0..=order` of the non-zero basis functions at
    /// `x`; entry `k` of the result holds the `k`-th derivatives.
    pub fn eval_derivatives(&self, x: f64, order: usize) -> Result<Vec<SparseVector>> {
        self.check_inside(x)?;
        let mu = self.span(x);
        let first = mu - self.degree;
        let n = self.num_basis_functions();
        Ok(self
            .ders_basis_funs(mu, x, order)
            .into_iter()
            .map(|values| SparseVector::from_block(n, first, values))
            .collect())
    }

    /// Basis functions and derivatives on span `mu` (de Boor's triangular
    /// scheme, differentiated). Orders above the degree are zero.
    fn ders_basis_funs(&self, mu: usize, x: f64, order: usize) -> Vec<Vec<f64>> {
        let p = self.degree;
        let t = &self.knots;

        // Upper triangle: basis values of increasing degree.
        // Lower triangle: knot differences.
        let mut ndu = vec![vec![0.0; p + 1]; p + 1];
        let mut left = vec![0.0; p + 1];
        let mut right = vec![0.0; p + 1];
        ndu[0][0] = 1.0;
        for j in 1..=p {
            left[j] = x - t[mu + 1 - j];
            right[j] = t[mu + j] - x;
            let mut saved = 0.0;
            for r in 0..j {
                ndu[j][r] = right[r + 1] + left[j - r];
                let temp = ndu[r][j - 1] / ndu[j][r];
                ndu[r][j] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            }
            ndu[j][j] = saved;
        }

        let mut ders = vec![vec![0.0; p + 1]; order + 1];
        for j in 0..=p {
            ders[0][j] = ndu[j][p];
        }

        let top = order.min(p);
        let mut a = [vec![0.0; p + 1], vec![0.0; p + 1]];
        for r in 0..=p {
            let (mut s1, mut s2) = (0, 1);
            a[0][0] = 1.0;
            for k in 1..=top {
                let mut d = 0.0;
                let rk = r as isize - k as isize;
                let pk = p - k;
                if r >= k {
                    let rk = rk as usize;
                    a[s2][0] = a[s1][0] / ndu[pk + 1][rk];
                    d = a[s2][0] * ndu[rk][pk];
                }
                let j1 = if rk >= -1 { 1 } else { (-rk) as usize };
                let j2 = if r <= pk + 1 { k - 1 } else { p - r };
                for j in j1..=j2 {
                    let idx = (rk + j as isize) as usize;
                    a[s2][j] = (a[s1][j] - a[s1][j - 1]) / ndu[pk + 1][idx];
                    d += a[s2][j] * ndu[idx][pk];
                }
                if r <= pk {
                    a[s2][k] = -a[s1][k - 1] / ndu[pk + 1][r];
                    d += a[s2][k] * ndu[r][pk];
                }
                ders[k][r] = d;
                std::mem::swap(&mut s1, &mut s2);
            }
        }

        let mut factor = p as f64;
        for k in 1..=top {
            for v in ders[k].iter_mut() {
                *v *= factor;
            }
            factor *= (p - k) as f64;
        }
        ders
    }

    /// Insert `tau` `multiplicity` times.
    pub fn insert_knots(&self, tau: f64, multiplicity: usize) -> Result<(Self, CsrMatrix<f64>)> {
        if !self.inside_support(tau) {
            return Err(SplineError::KnotOutsideSupport {
                tau,
                lower: self.support_lower(),
                upper: self.support_upper(),
            });
        }
        let existing = self.knot_multiplicity(tau);
        let max = self.degree + 1;
        if multiplicity > max.saturating_sub(existing) {
            return Err(SplineError::KnotMultiplicityTooHigh {
                tau,
                multiplicity: existing.saturating_add(multiplicity),
                max,
            });
        }

        let mut basis = self.clone();
        let mut a = CsrMatrix::identity(self.num_basis_functions());
        for _ in 0..multiplicity {
            let (next, step) = basis.insert_once(tau);
            a = &step * &a;
            basis = next;
        }
        Ok((basis, a))
    }

    /// Boehm's single knot insertion. `tau` must lie in the support.
    fn insert_once(&self, tau: f64) -> (Self, CsrMatrix<f64>) {
        let p = self.degree;
        let n = self.num_basis_functions();
        let t = &self.knots;
        let pos = t.partition_point(|&v| v <= tau);
        // Largest k with t_k <= tau; any k with t_k <= tau <= t_{k+1} gives
        // the same matrix, so clamping to n is safe at the upper bound.
        let k = (pos - 1).min(n);

        let mut coo = CooMatrix::new(n + 1, n);
        for i in 0..=n {
            if i + p <= k {
                coo.push(i, i, 1.0);
            } else if i > k {
                coo.push(i, i - 1, 1.0);
            } else {
                let denom = t[i + p] - t[i];
                let alpha = if denom > 0.0 { (tau - t[i]) / denom } else { 0.0 };
                if i < n && alpha != 0.0 {
                    coo.push(i, i, alpha);
                }
                if alpha != 1.0 {
                    coo.push(i, i - 1, 1.0 - alpha);
                }
            }
        }

        let mut knots = t.clone();
        knots.insert(pos, tau);
        (
            Self {
                knots,
                degree: p,
            },
            CsrMatrix::from(&coo),
        )
    }

    /// Distinct knot values inside the support, ascending.
    fn distinct_support_knots(&self) -> Vec<f64> {
        let (lo, hi) = (self.support_lower(), self.support_upper());
        let mut values: Vec<f64> = self
            .knots
            .iter()
            .copied()
            .filter(|&t| lo <= t && t <= hi)
            .collect();
        values.dedup();
        values
    }

    /// Apply a sequence of insertions, composing their matrices.
    fn insert_all(&self, insertions: &[(f64, usize)]) -> Result<(Self, CsrMatrix<f64>)> {
        let mut basis = self.clone();
        let mut a = CsrMatrix::identity(self.num_basis_functions());
        for &(tau, mult) in insertions {
            if mult == 0 {
                continue;
            }
            let (next, step) = basis.insert_knots(tau, mult)?;
            a = &step * &a;
            basis = next;
        }
        Ok((basis, a))
    }

    /// Insert the midpoint of every non-empty knot interval in the support.
    pub fn refine_knots(&self) -> Result<(Self, CsrMatrix<f64>)> {
        let midpoints: Vec<(f64, usize)> = self
            .distinct_support_knots()
            .windows(2)
            .map(|w| ((w[0] + w[1]) / 2.0, 1))
            .collect();
        self.insert_all(&midpoints)
    }

    /// Insert one knot in the span containing `x`.
    ///
    /// The knot goes at `x` itself unless `x` is (close to) a knot, in which
    /// case the span midpoint is used.
    pub fn refine_knots_locally(&self, x: f64) -> Result<(Self, CsrMatrix<f64>)> {
        self.check_inside(x)?;
        let mu = self.span(x);
        let (lower, upper) = (self.knots[mu], self.knots[mu + 1]);
        if is_near(lower, upper) {
            return Ok((self.clone(), CsrMatrix::identity(self.num_basis_functions())));
        }

        let tau = if self.knot_multiplicity(x) > 0 || is_near(lower, x) || is_near(upper, x) {
            (lower + upper) / 2.0
        } else {
            x
        };
        self.insert_knots(tau, 1)
    }

    /// Raise every distinct knot in the support to multiplicity `p + 1`.
    pub fn decompose_to_bezier_form(&self) -> Result<(Self, CsrMatrix<f64>)> {
        let target = self.degree + 1;
        let insertions: Vec<(f64, usize)> = self
            .distinct_support_knots()
            .into_iter()
            .map(|t| (t, target.saturating_sub(self.knot_multiplicity(t))))
            .collect();
        self.insert_all(&insertions)
    }

    /// Drop the basis functions that vanish on `(lb, ub)`.
    ///
    /// The kept functions form a contiguous range; the matrix selects them.
    /// The new support contains `[lb, ub]` and lies inside the old one.
    pub fn reduce_support(&self, lb: f64, ub: f64) -> Result<(Self, CsrMatrix<f64>)> {
        let (lo, hi) = (self.support_lower(), self.support_upper());
        if !(lb < ub) {
            return Err(SplineError::EmptyDomain { dim: 0, lb, ub });
        }
        if lb < lo || ub > hi {
            return Err(SplineError::ExpandedDomain {
                dim: 0,
                lb,
                ub,
                lower: lo,
                upper: hi,
            });
        }

        let p = self.degree;
        let n = self.num_basis_functions();
        let t = &self.knots;
        let first = (0..n).find(|&i| t[i + p + 1] > lb).unwrap_or(0);
        let last = (0..n).rev().find(|&i| t[i] < ub).unwrap_or(n - 1);
        if last < first {
            return Err(SplineError::EmptyDomain { dim: 0, lb, ub });
        }

        let reduced = Self::new(t[first..=last + p + 1].to_vec(), p)?;
        let kept = last - first + 1;
        let mut coo = CooMatrix::new(kept, n);
        for r in 0..kept {
            coo.push(r, first + r, 1.0);
        }
        Ok((reduced, CsrMatrix::from(&coo)))
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::{DMatrix, DVector};

    use super::*;

    fn cubic() -> UnivariateBasis {
        UnivariateBasis::new(
            vec![0.0, 0.0, 0.0, 0.0, 2.0, 5.0, 7.0, 10.0, 10.0, 10.0, 10.0],
            3,
        )
        .unwrap()
    }

    fn value_at(b: &UnivariateBasis, coeffs: &DVector<f64>, x: f64) -> f64 {
        b.eval(x).unwrap().dot(coeffs.as_slice())
    }

    fn sample_points(b: &UnivariateBasis) -> Vec<f64> {
        let (lo, hi) = (b.support_lower(), b.support_upper());
        (0..=40).map(|i| lo + (hi - lo) * i as f64 / 40.0).collect()
    }

    #[test]
    fn rejects_invalid_knot_vectors() {
        assert!(UnivariateBasis::new(vec![0.0, 0.0, 1.0, 1.0], 0).is_err());
        assert!(UnivariateBasis::new(vec![0.0, 0.0, 1.0], 1).is_err());
        assert!(UnivariateBasis::new(vec![0.0, 1.0, 0.5, 1.0], 1).is_err());
        assert!(UnivariateBasis::new(vec![0.0, 0.0, 0.0, 1.0, 1.0], 1).is_err());
        assert!(UnivariateBasis::new(vec![0.0, 0.0, 1.0, 1.0], 1).is_ok());
    }

    #[test]
    fn linear_hat_functions() {
        let b = UnivariateBasis::new(vec![0.0, 0.0, 1.0, 2.0, 2.0], 1).unwrap();
        let v = b.eval(0.25).unwrap();
        assert_eq!(v.indices(), &[0, 1]);
        assert!((v.values()[0] - 0.75).abs() < 1e-15);
        assert!((v.values()[1] - 0.25).abs() < 1e-15);

        // Upper bound is inside the support.
        let v = b.eval(2.0).unwrap();
        assert!((v.get(2) - 1.0).abs() < 1e-15);
        assert!(b.eval(2.0 + 1e-9).is_err());
    }

    #[test]
    fn partition_of_unity() {
        let b = cubic();
        for x in sample_points(&b) {
            let v = b.eval(x).unwrap();
            assert_eq!(v.nnz(), 4);
            assert!((v.sum() - 1.0).abs() < 1e-12, "sum at {x} = {}", v.sum());
            assert!(v.values().iter().all(|&w| w >= -1e-14));
        }
    }

    #[test]
    fn derivatives_match_finite_differences() {
        let b = cubic();
        let coeffs = DVector::from_vec(vec![1.0, -2.0, 0.5, 3.0, 4.0, -1.0, 2.0]);
        let h = 1e-5;
        for &x in &[0.5, 1.9, 3.3, 6.0, 8.8] {
            let ders = b.eval_derivatives(x, 2).unwrap();
            let d1 = ders[1].dot(coeffs.as_slice());
            let d2 = ders[2].dot(coeffs.as_slice());
            let fd1 = (value_at(&b, &coeffs, x + h) - value_at(&b, &coeffs, x - h)) / (2.0 * h);
            let fd2 = (value_at(&b, &coeffs, x + h) - 2.0 * value_at(&b, &coeffs, x)
                + value_at(&b, &coeffs, x - h))
                / (h * h);
            assert!((d1 - fd1).abs() < 1e-6, "d1 at {x}: {d1} vs {fd1}");
            assert!((d2 - fd2).abs() < 1e-3, "d2 at {x}: {d2} vs {fd2}");
        }
    }

    #[test]
    fn derivatives_above_degree_vanish() {
        let b = UnivariateBasis::new(vec![0.0, 0.0, 1.0, 1.0], 1).unwrap();
        let ders = b.eval_derivatives(0.3, 2).unwrap();
        assert_eq!(ders.len(), 3);
        assert!((ders[1].values()[0] + 1.0).abs() < 1e-15);
        assert!((ders[1].values()[1] - 1.0).abs() < 1e-15);
        assert!(ders[2].values().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn knot_averages_are_greville_points() {
        let b = UnivariateBasis::new(vec![0.0, 0.0, 0.0, 1.0, 2.0, 2.0, 2.0], 2).unwrap();
        assert_eq!(b.knot_averages(), vec![0.0, 0.5, 1.5, 2.0]);
    }

    #[test]
    fn knot_insertion_preserves_function() {
        let b = cubic();
        let coeffs = DVector::from_vec(vec![1.0, -2.0, 0.5, 3.0, 4.0, -1.0, 2.0]);
        for &(tau, mult) in &[(1.0, 1), (5.0, 2), (0.0, 0), (10.0, 0), (3.7, 3)] {
            let (refined, a) = b.insert_knots(tau, mult).unwrap();
            assert_eq!(a.nrows(), b.num_basis_functions() + mult);
            assert_eq!(a.ncols(), b.num_basis_functions());
            let new_coeffs = DMatrix::from(&a) * &coeffs;
            for x in sample_points(&b) {
                let before = value_at(&b, &coeffs, x);
                let after = value_at(&refined, &new_coeffs, x);
                assert!((before - after).abs() < 1e-12, "tau {tau} at {x}: {before} vs {after}");
            }
        }
    }

    #[test]
    fn knot_insertion_limits() {
        let b = cubic();
        assert!(matches!(
            b.insert_knots(0.0, 1),
            Err(SplineError::KnotMultiplicityTooHigh { .. })
        ));
        assert!(matches!(
            b.insert_knots(11.0, 1),
            Err(SplineError::KnotOutsideSupport { .. })
        ));
        assert!(b.insert_knots(2.0, 3).is_ok());
        assert!(b.insert_knots(2.0, 4).is_err());

        // Huge requests are rejected before any arithmetic can wrap.
        for tau in [2.0, 5.5] {
            match b.insert_knots(tau, usize::MAX) {
                Err(SplineError::KnotMultiplicityTooHigh { multiplicity, max, .. }) => {
                    assert_eq!(multiplicity, usize::MAX);
                    assert_eq!(max, 4);
                }
                other => panic!("expected multiplicity error, got {other:?}"),
            }
        }
    }

    #[test]
    fn global_refinement_halves_intervals() {
        let b = cubic();
        let (refined, a) = b.refine_knots().unwrap();
        assert_eq!(refined.num_basis_functions(), b.num_basis_functions() + 4);
        assert_eq!(a.nrows(), refined.num_basis_functions());
        for &m in &[1.0, 3.5, 6.0, 8.5] {
            assert_eq!(refined.knot_multiplicity(m), 1);
        }
    }

    #[test]
    fn local_refinement_avoids_existing_knots() {
        let b = cubic();
        let (refined, _) = b.refine_knots_locally(3.0).unwrap();
        assert_eq!(refined.knot_multiplicity(3.0), 1);

        let (refined, _) = b.refine_knots_locally(5.0).unwrap();
        assert_eq!(refined.knot_multiplicity(5.0), 1);
        assert_eq!(refined.knot_multiplicity(6.0), 1);
    }

    #[test]
    fn bezier_decomposition_gives_full_multiplicity() {
        let b = cubic();
        let coeffs = DVector::from_vec(vec![1.0, -2.0, 0.5, 3.0, 4.0, -1.0, 2.0]);
        let (bez, a) = b.decompose_to_bezier_form().unwrap();
        for &t in &[0.0, 2.0, 5.0, 7.0, 10.0] {
            assert_eq!(bez.knot_multiplicity(t), 4);
        }
        // Four independent cubic segments.
        assert_eq!(bez.num_basis_functions(), 4 * 4);
        let new_coeffs = DMatrix::from(&a) * &coeffs;
        for x in sample_points(&b) {
            assert!((value_at(&b, &coeffs, x) - value_at(&bez, &new_coeffs, x)).abs() < 1e-12);
        }
    }

    #[test]
    fn reduce_support_keeps_function_on_new_support() {
        let b = cubic();
        let coeffs = DVector::from_vec(vec![1.0, -2.0, 0.5, 3.0, 4.0, -1.0, 2.0]);
        let (reduced, a) = b.reduce_support(5.5, 6.5).unwrap();
        assert!(reduced.support_lower() <= 5.5 && reduced.support_upper() >= 6.5);
        assert!(reduced.support_lower() >= 0.0 && reduced.support_upper() <= 10.0);
        assert_eq!(a.ncols(), 7);
        assert_eq!(a.nrows(), reduced.num_basis_functions());
        let new_coeffs = DMatrix::from(&a) * &coeffs;
        for x in sample_points(&reduced) {
            assert!((value_at(&b, &coeffs, x) - value_at(&reduced, &new_coeffs, x)).abs() < 1e-12);
        }
    }

    #[test]
    fn reduce_support_rejects_bad_bounds() {
        let b = cubic();
        assert!(matches!(b.reduce_support(3.0, 3.0), Err(SplineError::EmptyDomain { .. })));
        assert!(matches!(b.reduce_support(-1.0, 3.0), Err(SplineError::ExpandedDomain { .. })));
    }
}
