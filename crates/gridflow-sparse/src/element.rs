//! The single-contribution record shared by every container variant.

use gridflow_core::Index;

/// One `(row, col, value)` Jacobian contribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatrixElement {
    pub row: Index,
    pub col: Index,
    pub value: f64,
}

impl MatrixElement {
    pub fn new(row: Index, col: Index, value: f64) -> Self {
        Self { row, col, value }
    }
}

/// Row-major comparison: row first, then column.
pub fn compare_row(a: &MatrixElement, b: &MatrixElement) -> std::cmp::Ordering {
    (a.row, a.col).cmp(&(b.row, b.col))
}

/// Column-major comparison: column first, then row.
pub fn compare_col(a: &MatrixElement, b: &MatrixElement) -> std::cmp::Ordering {
    (a.col, a.row).cmp(&(b.col, b.row))
}
