//! # gridflow-core: shared types for the gridflow solver stack
//!
//! Small foundation crate for the gridflow workspace: the index/count
//! aliases used throughout the sparse-matrix and solver crates, and the
//! unified [`GridError`] type that domain-specific errors convert into at
//! API boundaries.
//!
//! ## Quick Start
//!
//! ```rust
//! use gridflow_core::{GridError, GridResult, Index, NULL_LOCATION};
//!
//! fn locate(slot: Index) -> GridResult<Index> {
//!     if slot == NULL_LOCATION {
//!         return Err(GridError::Validation("state has no allocated slot".into()));
//!     }
//!     Ok(slot)
//! }
//! ```

pub mod error;
pub mod types;

pub use error::{GridError, GridResult};
pub use types::{Count, Index, SolverMode, NULL_LOCATION};
