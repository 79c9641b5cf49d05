//! Sample storage.
//!
//! A [`DataTable`] keeps its samples sorted lexicographically by `x`
//! (dimension 0 most significant). That is the same order the tensor basis
//! uses for its flat index, so design-matrix rows and knot averages line up
//! with a full grid of samples without any reshuffling. Samples live in a
//! `BTreeSet`, so inserting one costs `O(log n)`.

use std::cmp::Ordering;
use std::collections::{BTreeSet, btree_set};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SplineError};

/// One observation: inputs `x` and scalar output `y`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    x: Vec<f64>,
    y: f64,
}

impl Sample {
    pub fn new(x: impl Into<Vec<f64>>, y: f64) -> Self {
        Self { x: x.into(), y }
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn dim(&self) -> usize {
        self.x.len()
    }

    /// Lexicographic comparison on `x`.
    ///
    /// Samples of different dimension cannot be ordered.
    pub fn try_cmp(&self, other: &Sample) -> Result<Ordering> {
        if self.dim() != other.dim() {
            return Err(SplineError::DimensionMismatch {
                what: "sample coordinates",
                expected: self.dim(),
                got: other.dim(),
            });
        }
        Ok(self
            .x
            .iter()
            .zip(&other.x)
            .map(|(a, b)| a.total_cmp(b))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal))
    }
}

/// A stored sample with its insertion number, which breaks ties between
/// equal inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    sample: Sample,
    seq: u64,
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sample
            .x
            .iter()
            .zip(&other.sample.x)
            .map(|(a, b)| a.total_cmp(b))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| self.sample.dim().cmp(&other.sample.dim()))
            .then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

/// Sorted collection of samples sharing one input dimension.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataTable {
    num_variables: Option<usize>,
    samples: BTreeSet<Entry>,
    next_seq: u64,
}

impl DataTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_samples(samples: impl IntoIterator<Item = Sample>) -> Result<Self> {
        let mut table = Self::new();
        for s in samples {
            table.push(s)?;
        }
        Ok(table)
    }

    /// Add a sample, keeping the table sorted.
    ///
    /// Samples with equal `x` are kept in insertion order.
    pub fn add_sample(&mut self, x: impl Into<Vec<f64>>, y: f64) -> Result<()> {
        self.push(Sample::new(x, y))
    }

    pub fn push(&mut self, sample: Sample) -> Result<()> {
        if !(sample.y.is_finite() && sample.x.iter().all(|v| v.is_finite())) {
            return Err(SplineError::NonFiniteSample {
                x: sample.x,
                y: sample.y,
            });
        }
        match self.num_variables {
            None => self.num_variables = Some(sample.dim()),
            Some(n) if n != sample.dim() => {
                return Err(SplineError::DimensionMismatch {
                    what: "sample coordinates",
                    expected: n,
                    got: sample.dim(),
                });
            }
            Some(_) => {}
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.samples.insert(Entry { sample, seq });
        Ok(())
    }

    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    /// Input dimension, or 0 for an empty table.
    pub fn num_variables(&self) -> usize {
        self.num_variables.unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples in table order.
    pub fn iter(&self) -> Iter<'_> {
        Iter(self.samples.iter())
    }

    /// Outputs in table order.
    pub fn y_values(&self) -> Vec<f64> {
        self.iter().map(|s| s.y).collect()
    }

    /// All coordinates of one input variable, in table order.
    pub fn column(&self, dim: usize) -> Vec<f64> {
        self.iter().map(|s| s.x[dim]).collect()
    }

    /// Sorted distinct coordinates of one input variable.
    pub fn unique_sorted(&self, dim: usize) -> Vec<f64> {
        let mut values = self.column(dim);
        values.sort_by(f64::total_cmp);
        values.dedup();
        values
    }
}

/// Iterator over the samples of a [`DataTable`] in table order.
#[derive(Debug, Clone)]
pub struct Iter<'a>(btree_set::Iter<'a, Entry>);

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Sample;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|e| &e.sample)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl DoubleEndedIterator for Iter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.0.next_back().map(|e| &e.sample)
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl<'a> IntoIterator for &'a DataTable {
    type Item = &'a Sample;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
