//! # Newton nonlinear-solver adapter for power-system models
//!
//! Drives a [`SystemModel`]'s residual equations to zero with an exact
//! Newton iteration: the Jacobian is rebuilt every iteration, factored by
//! a dense or sparse LU backend, and the step solved against the current
//! residual.
//!
//! The sparse path uses the two-phase Jacobian protocol from
//! [`gridflow_sparse`]: the first Jacobian evaluation after allocation (or
//! after a resize re-initialization) runs through a sharded discovery
//! container to establish the sparsity pattern, and every later evaluation
//! accumulates values directly into the established compressed-sparse-
//! column structure without re-deriving it.
//!
//! ## Module organization
//!
//! - [`model`]: the residual/Jacobian callback contract
//! - [`status`]: solve outcome codes and their diagnostic strings
//! - [`backend`]: dense and sparse linear-solve backends
//! - [`newton`]: the solver adapter and its configuration
//! - [`capture`]: binary diagnostic capture files

pub mod backend;
pub mod capture;
pub mod model;
pub mod newton;
pub mod status;

pub use backend::{discovery_container, BackendError, LinearBackend, SparseReinitMode};
pub use capture::{read_capture, write_array, write_vector, CaptureRecord};
pub use model::{Constraint, SystemModel};
pub use newton::{NewtonSolver, SolverConfig};
pub use status::{CallbackStatus, SolverStatus};
