//! # Sparse Jacobian accumulation for power-system solvers
//!
//! Newton-type solvers for power networks assemble a Jacobian from many
//! small contributions: every bus, branch, and generator model adds its
//! partial derivatives independently, and several models routinely touch
//! the same matrix entry. This crate provides the accumulation containers
//! that collect those `(row, col, value)` contributions and hand them to a
//! linear solver.
//!
//! ## Module Organization
//!
//! - [`traits`]: the common [`MatrixData`] accumulation contract
//! - [`dense`]: fixed-size dense buffer, sums in place
//! - [`coo`]: growable coordinate-triplet store with deferred sort/compact
//! - [`sharded`]: `2^k` independent COO shards for cheaper sorting and
//!   parallel-friendly fill
//! - [`csc`]: borrowing adapters that write straight into an established
//!   compressed-sparse-column or dense matrix owned by a linear solver
//! - [`ordering`], [`block`]: the packed coordinate-key codec and the
//!   shard selector behind the sharded store
//!
//! ## Accumulation semantics
//!
//! Repeated assignment to one coordinate always *sums*; `compact()` sorts
//! by packed key and merges duplicates. Lookup via `at()` returns the full
//! sum whether or not the container has been compacted.
//!
//! ## Usage
//!
//! ```
//! use gridflow_sparse::{MatrixData, ShardedMatrix, Ordering};
//!
//! let mut jac = ShardedMatrix::<u32>::new(2, Ordering::ColMajor, 100, 100).unwrap();
//! jac.assign(3, 4, 0.5).unwrap();
//! jac.assign(3, 4, 0.25).unwrap();
//! jac.compact();
//! assert_eq!(jac.size(), 1);
//! assert!((jac.at(3, 4) - 0.75).abs() < 1e-14);
//! ```

pub mod block;
pub mod coo;
pub mod csc;
pub mod dense;
pub mod element;
pub mod error;
pub mod ordering;
pub mod sharded;
pub mod traits;

pub use block::BlockSelector;
pub use coo::{find_missing, CooMatrix};
pub use csc::{csc_from_matrix_data, CscAdapter, DenseAdapter};
pub use dense::DenseMatrix;
pub use element::MatrixElement;
pub use error::MatrixError;
pub use ordering::{CoordKey, KeyCodec, Ordering};
pub use sharded::ShardedMatrix;
pub use traits::MatrixData;
