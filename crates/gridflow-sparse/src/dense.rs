//! Dense accumulator.
//!
//! A row-major `rows × cols` buffer that sums contributions in place.
//! Always compact: `at` is a direct O(1) read and `compact` is a no-op.
//! Appropriate for small systems where the Jacobian is nearly full and for
//! cross-checking the sparse paths in tests.

use gridflow_core::{Count, Index};

use crate::element::MatrixElement;
use crate::error::MatrixError;
use crate::traits::MatrixData;

#[derive(Debug, Clone)]
pub struct DenseMatrix {
    rows: Index,
    cols: Index,
    data: Vec<f64>,
    cur: usize,
}

impl DenseMatrix {
    pub fn new(rows: Index, cols: Index) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows as usize * cols as usize],
            cur: 0,
        }
    }

    #[inline]
    fn offset(&self, row: Index, col: Index) -> usize {
        row as usize * self.cols as usize + col as usize
    }

    /// Borrow the backing buffer (row-major).
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}

impl MatrixData for DenseMatrix {
    fn clear(&mut self) {
        self.data.fill(0.0);
    }

    fn assign(&mut self, row: Index, col: Index, value: f64) -> Result<(), MatrixError> {
        if row >= self.rows || col >= self.cols {
            return Err(MatrixError::InvalidCoordinate {
                row,
                col,
                row_limit: self.rows,
                col_limit: self.cols,
            });
        }
        if !value.is_finite() {
            return Err(MatrixError::NonFiniteValue { row, col, value });
        }
        let off = self.offset(row, col);
        self.data[off] += value;
        Ok(())
    }

    fn size(&self) -> Count {
        (self.rows as usize * self.cols as usize) as Count
    }

    fn capacity(&self) -> Count {
        self.data.capacity() as Count
    }

    fn row_limit(&self) -> Index {
        self.rows
    }

    fn col_limit(&self) -> Index {
        self.cols
    }

    fn set_row_limit(&mut self, limit: Index) -> Result<(), MatrixError> {
        // resizing reallocates and zeroes; dense storage cannot keep
        // entries across a shape change
        self.rows = limit;
        self.data = vec![0.0; self.rows as usize * self.cols as usize];
        Ok(())
    }

    fn set_col_limit(&mut self, limit: Index) -> Result<(), MatrixError> {
        self.cols = limit;
        self.data = vec![0.0; self.rows as usize * self.cols as usize];
        Ok(())
    }

    fn at(&self, row: Index, col: Index) -> f64 {
        if row >= self.rows || col >= self.cols {
            return 0.0;
        }
        self.data[self.offset(row, col)]
    }

    fn element(&self, n: Count) -> MatrixElement {
        let row = n / self.cols;
        let col = n % self.cols;
        MatrixElement::new(row, col, self.data[n as usize])
    }

    fn start(&mut self) {
        self.cur = 0;
    }

    fn next_element(&mut self) -> MatrixElement {
        let el = self.element(self.cur as Count);
        self.cur += 1;
        el
    }

    fn more_data(&self) -> bool {
        self.cur < self.data.len()
    }
}
