//! Borrowing adapters over solver-owned matrices.
//!
//! Once a linear solver has an established sparsity pattern there is no
//! reason to rebuild it on every Jacobian evaluation. These adapters let
//! fill code speak the [`MatrixData`] contract while writing straight into
//! the solver's own storage: [`CscAdapter`] refreshes the values of a
//! compressed-sparse-column matrix whose structure is already fixed, and
//! [`DenseAdapter`] accumulates into a dense factorization workspace.
//!
//! Both borrow mutably for the duration of one fill pass; neither can
//! change the wrapped matrix's shape or, for CSC, its pattern.

use gridflow_core::{Count, Index};
use sprs::{CsMat, TriMat};

use crate::element::MatrixElement;
use crate::error::MatrixError;
use crate::traits::MatrixData;

/// Value-refresh adapter over an established CSC matrix.
///
/// Assignment to a coordinate already in the pattern sums into its stored
/// value; assignment outside the pattern is a typed error, since a
/// structural insert would invalidate the solver's symbolic factorization.
pub struct CscAdapter<'a> {
    mat: &'a mut CsMat<f64>,
    cur: usize,
    cur_col: usize,
}

impl<'a> CscAdapter<'a> {
    /// Wrap `mat`, which must be in CSC storage.
    pub fn new(mat: &'a mut CsMat<f64>) -> Self {
        debug_assert!(mat.is_csc());
        Self {
            mat,
            cur: 0,
            cur_col: 0,
        }
    }

    fn col_of(&self, n: usize) -> usize {
        let indptr = self.mat.indptr();
        let mut col = 0;
        while indptr.index(col + 1) <= n {
            col += 1;
        }
        col
    }
}

impl MatrixData for CscAdapter<'_> {
    /// Zero every stored value; the pattern is untouched.
    fn clear(&mut self) {
        for v in self.mat.data_mut() {
            *v = 0.0;
        }
    }

    fn assign(&mut self, row: Index, col: Index, value: f64) -> Result<(), MatrixError> {
        if row as usize >= self.mat.rows() || col as usize >= self.mat.cols() {
            return Err(MatrixError::InvalidCoordinate {
                row,
                col,
                row_limit: self.mat.rows() as Index,
                col_limit: self.mat.cols() as Index,
            });
        }
        if !value.is_finite() {
            return Err(MatrixError::NonFiniteValue { row, col, value });
        }
        let indptr = self.mat.indptr();
        let start = indptr.index(col as usize);
        let end = indptr.index(col as usize + 1);
        let indices = &self.mat.indices()[start..end];
        match indices.binary_search(&(row as usize)) {
            Ok(pos) => {
                self.mat.data_mut()[start + pos] += value;
                Ok(())
            }
            Err(_) => Err(MatrixError::NotInPattern { row, col }),
        }
    }

    fn size(&self) -> Count {
        self.mat.nnz() as Count
    }

    fn capacity(&self) -> Count {
        self.mat.nnz() as Count
    }

    fn row_limit(&self) -> Index {
        self.mat.rows() as Index
    }

    fn col_limit(&self) -> Index {
        self.mat.cols() as Index
    }

    fn set_row_limit(&mut self, limit: Index) -> Result<(), MatrixError> {
        if limit as usize == self.mat.rows() {
            Ok(())
        } else {
            Err(MatrixError::FixedShape {
                rows: self.mat.rows() as Index,
                cols: self.mat.cols() as Index,
            })
        }
    }

    fn set_col_limit(&mut self, limit: Index) -> Result<(), MatrixError> {
        if limit as usize == self.mat.cols() {
            Ok(())
        } else {
            Err(MatrixError::FixedShape {
                rows: self.mat.rows() as Index,
                cols: self.mat.cols() as Index,
            })
        }
    }

    fn at(&self, row: Index, col: Index) -> f64 {
        if row as usize >= self.mat.rows() || col as usize >= self.mat.cols() {
            return 0.0;
        }
        let indptr = self.mat.indptr();
        let start = indptr.index(col as usize);
        let end = indptr.index(col as usize + 1);
        let indices = &self.mat.indices()[start..end];
        match indices.binary_search(&(row as usize)) {
            Ok(pos) => self.mat.data()[start + pos],
            Err(_) => 0.0,
        }
    }

    fn element(&self, n: Count) -> MatrixElement {
        let n = n as usize;
        MatrixElement::new(
            self.mat.indices()[n] as Index,
            self.col_of(n) as Index,
            self.mat.data()[n],
        )
    }

    fn start(&mut self) {
        self.cur = 0;
        self.cur_col = 0;
    }

    fn next_element(&mut self) -> MatrixElement {
        while self.mat.indptr().index(self.cur_col + 1) <= self.cur {
            self.cur_col += 1;
        }
        let el = MatrixElement::new(
            self.mat.indices()[self.cur] as Index,
            self.cur_col as Index,
            self.mat.data()[self.cur],
        );
        self.cur += 1;
        el
    }

    fn more_data(&self) -> bool {
        self.cur < self.mat.nnz()
    }
}

/// Accumulating adapter over a dense factorization workspace.
pub struct DenseAdapter<'a> {
    mat: &'a mut faer::Mat<f64>,
    cur: usize,
}

impl<'a> DenseAdapter<'a> {
    pub fn new(mat: &'a mut faer::Mat<f64>) -> Self {
        Self { mat, cur: 0 }
    }
}

impl MatrixData for DenseAdapter<'_> {
    fn clear(&mut self) {
        for col in 0..self.mat.ncols() {
            for row in 0..self.mat.nrows() {
                self.mat[(row, col)] = 0.0;
            }
        }
    }

    fn assign(&mut self, row: Index, col: Index, value: f64) -> Result<(), MatrixError> {
        if row as usize >= self.mat.nrows() || col as usize >= self.mat.ncols() {
            return Err(MatrixError::InvalidCoordinate {
                row,
                col,
                row_limit: self.mat.nrows() as Index,
                col_limit: self.mat.ncols() as Index,
            });
        }
        if !value.is_finite() {
            return Err(MatrixError::NonFiniteValue { row, col, value });
        }
        self.mat[(row as usize, col as usize)] += value;
        Ok(())
    }

    fn size(&self) -> Count {
        (self.mat.nrows() * self.mat.ncols()) as Count
    }

    fn capacity(&self) -> Count {
        self.size()
    }

    fn row_limit(&self) -> Index {
        self.mat.nrows() as Index
    }

    fn col_limit(&self) -> Index {
        self.mat.ncols() as Index
    }

    fn set_row_limit(&mut self, limit: Index) -> Result<(), MatrixError> {
        if limit as usize == self.mat.nrows() {
            Ok(())
        } else {
            Err(MatrixError::FixedShape {
                rows: self.mat.nrows() as Index,
                cols: self.mat.ncols() as Index,
            })
        }
    }

    fn set_col_limit(&mut self, limit: Index) -> Result<(), MatrixError> {
        if limit as usize == self.mat.ncols() {
            Ok(())
        } else {
            Err(MatrixError::FixedShape {
                rows: self.mat.nrows() as Index,
                cols: self.mat.ncols() as Index,
            })
        }
    }

    fn at(&self, row: Index, col: Index) -> f64 {
        if (row as usize) < self.mat.nrows() && (col as usize) < self.mat.ncols() {
            self.mat[(row as usize, col as usize)]
        } else {
            0.0
        }
    }

    /// Column-major positional access, matching the underlying storage.
    fn element(&self, n: Count) -> MatrixElement {
        let n = n as usize;
        let rows = self.mat.nrows();
        let (row, col) = (n % rows, n / rows);
        MatrixElement::new(row as Index, col as Index, self.mat[(row, col)])
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
        self.cur < (self.mat.nrows() * self.mat.ncols())
    }
}

/// Translate any accumulation container into a freshly built CSC matrix.
///
/// The container is compacted first so duplicate coordinates collapse into
/// single structural entries. This is the structure-discovery half of the
/// two-phase Jacobian protocol; later passes refresh the result in place
/// through [`CscAdapter`].
pub fn csc_from_matrix_data(md: &mut dyn MatrixData, rows: usize, cols: usize) -> CsMat<f64> {
    md.compact();
    let mut tri = TriMat::with_capacity((rows, cols), md.size() as usize);
    md.start();
    while md.more_data() {
        let el = md.next_element();
        tri.add_triplet(el.row as usize, el.col as usize, el.value);
    }
    tri.to_csc()
}
