//! Declared sparsity patterns and slot-addressed value assembly
//!
//! A solver asks for the *structure* of the Jacobian and Hessian once and
//! for their *values* many times. Both must list the same entries in the
//! same order. [`SparsityPattern`] fixes that order and builds a
//! `(row, col) → slot` map at declaration time; every value pass writes
//! through a [`SparseAccumulator`] that resolves coordinates with that map.
//!
//! ```text
//! declare:   rows = [0, 0, 1]   cols = [0, 2, 1]   slots {(0,0)→0, (0,2)→1, (1,1)→2}
//! evaluate:  acc.add(1, 1, 3.0); acc.add(0, 0, 1.0); acc.add(1, 1, 0.5)
//! finish:    values = [1.0, 0.0, 3.5]
//! ```
//!
//! Contributions are added, never assigned, so several terms landing on the
//! same slot sum correctly. A coordinate outside the pattern is reported by
//! [`SparseAccumulator::finish`] instead of being dropped.

use super::error::AllocationError;
use hashbrown::HashMap;
use sprs::{CsMat, TriMat};

/// Fixed ordered list of structurally nonzero entries.
#[derive(Debug, Clone)]
pub struct SparsityPattern {
    rows: Vec<usize>,
    cols: Vec<usize>,
    shape: (usize, usize),
    lower_triangular: bool,
    slots: HashMap<(usize, usize), usize>,
}

impl SparsityPattern {
    /// Start declaring a general pattern of the given shape.
    pub fn builder(n_rows: usize, n_cols: usize) -> PatternBuilder {
        PatternBuilder::new((n_rows, n_cols), false)
    }

    /// Start declaring the lower triangle of a symmetric `n × n` matrix.
    pub fn lower_triangular(n: usize) -> PatternBuilder {
        PatternBuilder::new((n, n), true)
    }

    pub fn nnz(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn cols(&self) -> &[usize] {
        &self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn is_lower_triangular(&self) -> bool {
        self.lower_triangular
    }

    /// Slot of `(row, col)`; for lower-triangular patterns the coordinate is
    /// mirrored into the lower triangle first.
    #[inline]
    pub fn slot(&self, row: usize, col: usize) -> Option<usize> {
        let key = if self.lower_triangular && row < col {
            (col, row)
        } else {
            (row, col)
        };
        self.slots.get(&key).copied()
    }

    /// Fresh zero-filled accumulator for one value pass.
    pub fn accumulator(&self) -> SparseAccumulator<'_> {
        SparseAccumulator {
            pattern: self,
            values: vec![0.0; self.nnz()],
            miss: None,
        }
    }

    /// Triplet matrix with `values` placed on the pattern. Lower-triangular
    /// patterns are symmetrically completed.
    pub fn to_trimat(&self, values: &[f64]) -> TriMat<f64> {
        let mut tri = TriMat::with_capacity(self.shape, 2 * self.nnz());
        for ((&r, &c), &v) in self.rows.iter().zip(&self.cols).zip(values) {
            tri.add_triplet(r, c, v);
            if self.lower_triangular && r != c {
                tri.add_triplet(c, r, v);
            }
        }
        tri
    }

    pub fn to_csr(&self, values: &[f64]) -> CsMat<f64> {
        self.to_trimat(values).to_csr()
    }

    /// Dense row-major copy (symmetrically completed when lower triangular).
    pub fn to_dense(&self, values: &[f64]) -> Vec<Vec<f64>> {
        let mut dense = vec![vec![0.0; self.shape.1]; self.shape.0];
        for ((&r, &c), &v) in self.rows.iter().zip(&self.cols).zip(values) {
            dense[r][c] += v;
            if self.lower_triangular && r != c {
                dense[c][r] += v;
            }
        }
        dense
    }
}

/// Collects entries in declaration order.
#[derive(Debug)]
pub struct PatternBuilder {
    rows: Vec<usize>,
    cols: Vec<usize>,
    shape: (usize, usize),
    lower_triangular: bool,
    slots: HashMap<(usize, usize), usize>,
    error: Option<String>,
}

impl PatternBuilder {
    fn new(shape: (usize, usize), lower_triangular: bool) -> Self {
        Self {
            rows: Vec::new(),
            cols: Vec::new(),
            shape,
            lower_triangular,
            slots: HashMap::new(),
            error: None,
        }
    }

    /// Declare `(row, col)`. Re-declaring an entry reuses its slot.
    pub fn insert(&mut self, row: usize, col: usize) -> &mut Self {
        if self.error.is_some() {
            return self;
        }
        if row >= self.shape.0 || col >= self.shape.1 {
            self.error = Some(format!(
                "entry ({}, {}) outside {}x{} matrix",
                row, col, self.shape.0, self.shape.1
            ));
            return self;
        }
        if self.lower_triangular && row < col {
            self.error = Some(format!(
                "entry ({}, {}) is above the diagonal of a lower-triangular pattern",
                row, col
            ));
            return self;
        }
        if !self.slots.contains_key(&(row, col)) {
            self.slots.insert((row, col), self.rows.len());
            self.rows.push(row);
            self.cols.push(col);
        }
        self
    }

    pub fn build(self) -> Result<SparsityPattern, AllocationError> {
        if let Some(msg) = self.error {
            return Err(AllocationError::InvalidPattern(msg));
        }
        Ok(SparsityPattern {
            rows: self.rows,
            cols: self.cols,
            shape: self.shape,
            lower_triangular: self.lower_triangular,
            slots: self.slots,
        })
    }
}

/// Additive value assembly against a fixed pattern.
#[derive(Debug)]
pub struct SparseAccumulator<'p> {
    pattern: &'p SparsityPattern,
    values: Vec<f64>,
    miss: Option<(usize, usize)>,
}

impl<'p> SparseAccumulator<'p> {
    /// Add `value` into the slot of `(row, col)`.
    #[inline]
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        match self.pattern.slot(row, col) {
            Some(slot) => self.values[slot] += value,
            None => {
                if self.miss.is_none() {
                    self.miss = Some((row, col));
                }
            }
        }
    }

    /// Values in pattern order, or the first coordinate that missed.
    pub fn finish(self) -> Result<Vec<f64>, AllocationError> {
        match self.miss {
            Some((row, col)) => Err(AllocationError::PatternMismatch { row, col }),
            None => Ok(self.values),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulates_in_declaration_order() {
        let mut b = SparsityPattern::builder(2, 3);
        b.insert(0, 0).insert(0, 2).insert(1, 1);
        let pattern = b.build().unwrap();

        let mut acc = pattern.accumulator();
        acc.add(1, 1, 3.0);
        acc.add(0, 0, 1.0);
        acc.add(1, 1, 0.5);
        assert_eq!(acc.finish().unwrap(), vec![1.0, 0.0, 3.5]);
    }

    #[test]
    fn test_duplicate_declaration_reuses_slot() {
        let mut b = SparsityPattern::builder(2, 2);
        b.insert(1, 0).insert(0, 1).insert(1, 0);
        let pattern = b.build().unwrap();
        assert_eq!(pattern.nnz(), 2);
        assert_eq!(pattern.slot(1, 0), Some(0));
    }

    #[test]
    fn test_unknown_entry_is_reported() {
        let mut b = SparsityPattern::builder(2, 2);
        b.insert(0, 0);
        let pattern = b.build().unwrap();

        let mut acc = pattern.accumulator();
        acc.add(0, 0, 1.0);
        acc.add(1, 1, 2.0);
        let err = acc.finish().unwrap_err();
        assert!(matches!(err, AllocationError::PatternMismatch { row: 1, col: 1 }));
    }

    #[test]
    fn test_lower_triangular_mirrors_upper_writes() {
        let mut b = SparsityPattern::lower_triangular(3);
        b.insert(2, 0).insert(1, 1);
        let pattern = b.build().unwrap();

        let mut acc = pattern.accumulator();
        acc.add(0, 2, 4.0);
        acc.add(2, 0, 1.0);
        let values = acc.finish().unwrap();
        assert_eq!(values, vec![5.0, 0.0]);

        let dense = pattern.to_dense(&values);
        assert_eq!(dense[0][2], 5.0);
        assert_eq!(dense[2][0], 5.0);
    }

    #[test]
    fn test_rejects_upper_triangle_declaration() {
        let mut b = SparsityPattern::lower_triangular(3);
        b.insert(0, 1);
        assert!(matches!(b.build(), Err(AllocationError::InvalidPattern(_))));
    }

    #[test]
    fn test_rejects_out_of_shape() {
        let mut b = SparsityPattern::builder(2, 2);
        b.insert(2, 0);
        assert!(b.build().is_err());
    }

    #[test]
    fn test_to_csr() {
        let mut b = SparsityPattern::builder(2, 2);
        b.insert(0, 1).insert(1, 0);
        let pattern = b.build().unwrap();
        let m = pattern.to_csr(&[2.0, 3.0]);
        assert_eq!(m.get(0, 1), Some(&2.0));
        assert_eq!(m.get(1, 0), Some(&3.0));
    }
}
