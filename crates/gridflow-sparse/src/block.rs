//! Shard selection for the sharded COO store.
//!
//! Pre-partitioning entries across `2^k` shards keeps each shard's sort
//! cheap and lets independent workers fill disjoint shards. The selector
//! maps the ordering's major index (row for row-major, column for
//! column-major) to a shard, calibrated once per matrix-size change so the
//! interior shards receive equal index ranges and the first/last shards
//! absorb the remainder.

use gridflow_core::Index;

use crate::error::MatrixError;
use crate::ordering::Ordering;

/// Maximum supported shard exponent; `2^6` shards is already well past the
/// point of diminishing sort-cost returns.
pub const MAX_SHARD_BITS: u32 = 6;

#[derive(Debug, Clone, Copy)]
enum Split {
    /// k = 0: every entry lands in shard 0.
    Single,
    /// k = 1: two shards split at the midpoint of the index range.
    Half { split: Index },
    /// k >= 2: `2^shift` indices per interior shard, bias centering the
    /// remainder on the first and last shards.
    Shifted { shift: u32, bias: Index },
}

/// Maps `(row, col)` to a shard in `[0, 2^k)`.
///
/// Calibrate with [`set_max_index`](Self::set_max_index) whenever the
/// relevant dimension changes; selection itself is a pure function.
#[derive(Debug, Clone, Copy)]
pub struct BlockSelector {
    k: u32,
    ordering: Ordering,
    split: Split,
}

impl BlockSelector {
    pub fn new(k: u32, ordering: Ordering) -> Result<Self, MatrixError> {
        if k > MAX_SHARD_BITS {
            return Err(MatrixError::ShardCount {
                k,
                max: MAX_SHARD_BITS,
            });
        }
        let split = match k {
            0 => Split::Single,
            1 => Split::Half { split: 0 },
            _ => Split::Shifted { shift: 0, bias: 0 },
        };
        Ok(Self { k, ordering, split })
    }

    /// Number of shards (`2^k`).
    pub fn block_count(&self) -> usize {
        1usize << self.k
    }

    /// Recalibrate for new row/column limits.
    ///
    /// Only the ordering's major dimension matters: entries are sharded on
    /// the same index the sort key leads with, so each shard stays
    /// internally contiguous in key order.
    pub fn set_max_index(&mut self, row_max: Index, col_max: Index) {
        let key_max = match self.ordering {
            Ordering::RowMajor => row_max,
            Ordering::ColMajor => col_max,
        };
        self.split = match self.k {
            0 => Split::Single,
            1 => Split::Half {
                split: key_max >> 1,
            },
            k => {
                // shift such that 2^shift indices fill each of the
                // 2^k - 2 interior shards; bit width of key_max - 1 so an
                // exact power-of-two range still divides evenly
                let bits = Index::BITS - key_max.saturating_sub(1).leading_zeros();
                let shift = bits.saturating_sub(k);
                let interior = (1u64 << shift) * ((1u64 << k) - 2);
                let extra = u64::from(key_max).saturating_sub(interior);
                let bias = (1u64 << shift).saturating_sub(extra >> 1) as Index;
                Split::Shifted { shift, bias }
            }
        };
    }

    /// Shard index for `(row, col)`, always within `[0, 2^k)`.
    #[inline]
    pub fn block_index(&self, row: Index, col: Index) -> usize {
        let major = match self.ordering {
            Ordering::RowMajor => row,
            Ordering::ColMajor => col,
        };
        let idx = match self.split {
            Split::Single => 0,
            Split::Half { split } => usize::from(major >= split),
            Split::Shifted { shift, bias } => ((major + bias) >> shift) as usize,
        };
        idx.min(self.block_count() - 1)
    }
}
