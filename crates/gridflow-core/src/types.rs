//! Index and count aliases shared across the workspace.
//!
//! Matrix coordinates and element counts are 32-bit unsigned values; the
//! sparse containers that need a wider coordinate space use 64-bit packed
//! keys internally while keeping this external index type.

use serde::{Deserialize, Serialize};

/// Row/column index into a state vector or Jacobian.
pub type Index = u32;

/// Element count (sizes, capacities, call counters).
pub type Count = u32;

/// Sentinel for "this state has no allocated slot".
///
/// Jacobian-building code frequently computes candidate locations that may
/// not exist in the current solver mode; such locations carry this value
/// and are filtered by the checked assignment variants.
pub const NULL_LOCATION: Index = Index::MAX;

/// Identifies which portion of a composite state vector a solver works on.
///
/// Carried opaquely through residual/Jacobian callbacks and recorded in
/// diagnostic capture files so offline tooling can tell solver modes apart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverMode {
    /// Offset of this mode's states within the full simulation state.
    pub offset_index: Index,
}

impl SolverMode {
    pub fn new(offset_index: Index) -> Self {
        Self { offset_index }
    }
}
