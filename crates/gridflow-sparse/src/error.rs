//! Errors from matrix accumulation.

use gridflow_core::{GridError, Index};
use thiserror::Error;

/// Errors raised by the accumulation containers.
///
/// Every container variant enforces the same typed policy: an out-of-range
/// or non-finite contribution is caught where it happens, at the assigning
/// call site.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum MatrixError {
    #[error("coordinate ({row}, {col}) outside limits ({row_limit}, {col_limit})")]
    InvalidCoordinate {
        row: Index,
        col: Index,
        row_limit: Index,
        col_limit: Index,
    },

    #[error("non-finite value {value} at ({row}, {col})")]
    NonFiniteValue { row: Index, col: Index, value: f64 },

    #[error("limit {limit} exceeds the {bits}-bit coordinate key half-width")]
    LimitExceedsKeyWidth { limit: Index, bits: u32 },

    #[error("shard exponent {k} too large (max {max})")]
    ShardCount { k: u32, max: u32 },

    #[error("entry ({row}, {col}) absent from the established sparsity pattern")]
    NotInPattern { row: Index, col: Index },

    #[error("borrowed solver storage has fixed shape {rows}x{cols}")]
    FixedShape { rows: Index, cols: Index },
}

impl From<MatrixError> for GridError {
    fn from(err: MatrixError) -> Self {
        GridError::Solver(err.to_string())
    }
}
