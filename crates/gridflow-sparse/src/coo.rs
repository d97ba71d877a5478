//! Single-vector COO accumulator.
//!
//! One growable vector of `(row, col, value)` triples with deferred
//! sort-then-merge compaction. Sorting is postponed until `compact` (or an
//! explicit `sort_index`) so assignment stays a plain append; whether the
//! container is currently sorted is tracked with a cheap count comparison
//! rather than a flag that every mutation would have to maintain.

use gridflow_core::{Count, Index};

use crate::element::{compare_col, compare_row, MatrixElement};
use crate::error::MatrixError;
use crate::ordering::Ordering;
use crate::traits::MatrixData;

#[derive(Debug, Clone)]
pub struct CooMatrix {
    data: Vec<MatrixElement>,
    row_lim: Index,
    col_lim: Index,
    /// entry count at the time of the last sort; sorted iff equal to len
    sort_count: usize,
    sort_ordering: Ordering,
    cur: usize,
}

impl CooMatrix {
    pub fn new(rows: Index, cols: Index) -> Self {
        Self::with_capacity(rows, cols, 50)
    }

    pub fn with_capacity(rows: Index, cols: Index, capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            row_lim: rows,
            col_lim: cols,
            sort_count: usize::MAX,
            sort_ordering: Ordering::ColMajor,
            cur: 0,
        }
    }

    /// Whether the container is currently sorted.
    pub fn is_sorted(&self) -> bool {
        self.sort_count == self.data.len()
    }

    /// Sort entries under the given ordering.
    pub fn sort_index(&mut self, ordering: Ordering) {
        match ordering {
            Ordering::RowMajor => self.data.sort_unstable_by(compare_row),
            Ordering::ColMajor => self.data.sort_unstable_by(compare_col),
        }
        self.sort_ordering = ordering;
        self.sort_count = self.data.len();
    }

    fn mark_unsorted(&mut self) {
        self.sort_count = usize::MAX;
    }

    /// Scale a contiguous range of entries in storage order.
    pub fn scale(&mut self, factor: f64, start: usize, count: usize) {
        let len = self.data.len();
        let end = start.saturating_add(count).min(len);
        for el in &mut self.data[start.min(len)..end] {
            el.value *= factor;
        }
    }

    /// Scale every entry in a row.
    pub fn scale_row(&mut self, row: Index, factor: f64) {
        for el in &mut self.data {
            if el.row == row {
                el.value *= factor;
            }
        }
    }

    /// Scale every entry in a column.
    pub fn scale_col(&mut self, col: Index, factor: f64) {
        for el in &mut self.data {
            if el.col == col {
                el.value *= factor;
            }
        }
    }

    /// Re-tag every entry in `orig_row` with `new_row`.
    pub fn translate_row(&mut self, orig_row: Index, new_row: Index) {
        for el in &mut self.data {
            if el.row == orig_row {
                el.row = new_row;
            }
        }
        self.mark_unsorted();
    }

    /// Re-tag every entry in `orig_col` with `new_col`.
    pub fn translate_col(&mut self, orig_col: Index, new_col: Index) {
        for el in &mut self.data {
            if el.col == orig_col {
                el.col = new_col;
            }
        }
        self.mark_unsorted();
    }

    /// Swap rows and columns of every entry.
    pub fn transpose(&mut self) {
        for el in &mut self.data {
            std::mem::swap(&mut el.row, &mut el.col);
        }
        std::mem::swap(&mut self.row_lim, &mut self.col_lim);
        self.mark_unsorted();
    }

    /// Drop entries whose coordinates exceed the current limits, plus any
    /// entry in `row_test`.
    pub fn filter(&mut self, row_test: Index) {
        let (rlim, clim) = (self.row_lim, self.col_lim);
        self.data
            .retain(|el| el.row != row_test && el.row < rlim && el.col < clim);
        self.mark_unsorted();
    }

    /// Typed fast path for [`MatrixData::copy_translate_row`] that avoids
    /// the cursor protocol.
    pub fn copy_translate_row_from(&mut self, other: &CooMatrix, orig_row: Index, new_row: Index) {
        for el in &other.data {
            if el.row == orig_row {
                self.data.push(MatrixElement::new(new_row, el.col, el.value));
            }
        }
        self.mark_unsorted();
    }

    /// Nonzeros per column, computed over compacted data.
    pub fn column_counts(&mut self) -> Vec<Count> {
        self.compact();
        let mut counts = vec![0; self.col_lim as usize];
        for el in &self.data {
            counts[el.col as usize] += 1;
        }
        counts
    }

    /// Iterate entries in storage order without touching the cursor.
    pub fn elements(&self) -> impl Iterator<Item = &MatrixElement> {
        self.data.iter()
    }
}

impl MatrixData for CooMatrix {
    fn clear(&mut self) {
        self.data.clear();
        self.mark_unsorted();
    }

    fn assign(&mut self, row: Index, col: Index, value: f64) -> Result<(), MatrixError> {
        if row >= self.row_lim || col >= self.col_lim {
            return Err(MatrixError::InvalidCoordinate {
                row,
                col,
                row_limit: self.row_lim,
                col_limit: self.col_lim,
            });
        }
        if !value.is_finite() {
            return Err(MatrixError::NonFiniteValue { row, col, value });
        }
        self.data.push(MatrixElement::new(row, col, value));
        Ok(())
    }

    fn size(&self) -> Count {
        self.data.len() as Count
    }

    fn capacity(&self) -> Count {
        self.data.capacity() as Count
    }

    fn reserve(&mut self, max_nonzeros: Count) {
        self.data.reserve(max_nonzeros as usize);
    }

    fn row_limit(&self) -> Index {
        self.row_lim
    }

    fn col_limit(&self) -> Index {
        self.col_lim
    }

    fn set_row_limit(&mut self, limit: Index) -> Result<(), MatrixError> {
        self.row_lim = limit;
        Ok(())
    }

    fn set_col_limit(&mut self, limit: Index) -> Result<(), MatrixError> {
        self.col_lim = limit;
        Ok(())
    }

    fn at(&self, row: Index, col: Index) -> f64 {
        if self.is_sorted() {
            let probe = MatrixElement::new(row, col, 0.0);
            let cmp = match self.sort_ordering {
                Ordering::RowMajor => compare_row,
                Ordering::ColMajor => compare_col,
            };
            let start = self.data.partition_point(|el| cmp(el, &probe).is_lt());
            // duplicates of one coordinate sit adjacent in sort order;
            // sum them all so pre-compaction reads are still total
            self.data[start..]
                .iter()
                .take_while(|el| el.row == row && el.col == col)
                .map(|el| el.value)
                .sum()
        } else {
            self.data
                .iter()
                .filter(|el| el.row == row && el.col == col)
                .map(|el| el.value)
                .sum()
        }
    }

    fn element(&self, n: Count) -> MatrixElement {
        self.data[n as usize]
    }

    fn compact(&mut self) {
        if self.data.is_empty() {
            return;
        }
        if !self.is_sorted() {
            self.sort_index(Ordering::ColMajor);
        }
        let mut write = 0;
        for read in 1..self.data.len() {
            let el = self.data[read];
            let prev = &mut self.data[write];
            if el.row == prev.row && el.col == prev.col {
                prev.value += el.value;
            } else {
                write += 1;
                self.data[write] = el;
            }
        }
        self.data.truncate(write + 1);
        self.sort_count = self.data.len();
    }

    fn start(&mut self) {
        self.cur = 0;
    }

    fn next_element(&mut self) -> MatrixElement {
        let el = self.data[self.cur];
        self.cur += 1;
        el
    }

    fn more_data(&self) -> bool {
        self.cur < self.data.len()
    }
}

/// Rows of a compacted container with no usable entry.
///
/// A Jacobian row with no finite, normal value means the corresponding
/// equation cannot constrain any state: the classic cause of a singular
/// factorization. Called from the solver's failure path to name the
/// offending states.
pub fn find_missing(md: &mut CooMatrix) -> Vec<Index> {
    md.compact();
    md.sort_index(Ordering::RowMajor);
    let mut missing = Vec::new();
    let mut pp = 0usize;
    for row in 0..md.row_limit() {
        let mut good = false;
        while pp < md.data.len() && md.data[pp].row <= row {
            if md.data[pp].row == row && md.data[pp].value.is_normal() {
                good = true;
            }
            pp += 1;
        }
        if !good {
            missing.push(row);
        }
    }
    missing
}
