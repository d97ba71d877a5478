//! Packed coordinate keys.
//!
//! A `(row, col)` pair is packed into a single unsigned key so that sorting
//! entries by key yields row-major or column-major order directly. The key's
//! upper half holds the major index and the lower half the minor index:
//! 16 bits each for `u32` keys, 32 bits each for `u64` keys.
//!
//! Indices must fit the key half-width. That precondition is enforced when a
//! container declares its row/column limits ([`KeyCodec::check_limit`])
//! rather than on every packed key, so the hot path stays branch-free.

use gridflow_core::Index;

use crate::error::MatrixError;

/// Sort order produced by the packed keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ordering {
    /// Keys sort by row first, then column.
    RowMajor,
    /// Keys sort by column first, then row. The default: compressed
    /// sparse column construction wants entries grouped by column.
    #[default]
    ColMajor,
}

/// Unsigned integer usable as a packed coordinate key.
pub trait CoordKey: Copy + Ord + std::fmt::Debug {
    /// Bits available for each of the two packed indices.
    const HALF_BITS: u32;

    /// Pack `(major, minor)` into a key.
    fn pack(major: Index, minor: Index) -> Self;
    /// Upper (major) half of the key.
    fn major(self) -> Index;
    /// Lower (minor) half of the key.
    fn minor(self) -> Index;
}

impl CoordKey for u32 {
    const HALF_BITS: u32 = 16;

    #[inline]
    fn pack(major: Index, minor: Index) -> Self {
        (major << Self::HALF_BITS) | minor
    }

    #[inline]
    fn major(self) -> Index {
        self >> Self::HALF_BITS
    }

    #[inline]
    fn minor(self) -> Index {
        self & ((1u32 << Self::HALF_BITS) - 1)
    }
}

impl CoordKey for u64 {
    const HALF_BITS: u32 = 32;

    #[inline]
    fn pack(major: Index, minor: Index) -> Self {
        ((major as u64) << Self::HALF_BITS) | minor as u64
    }

    #[inline]
    fn major(self) -> Index {
        (self >> Self::HALF_BITS) as Index
    }

    #[inline]
    fn minor(self) -> Index {
        (self & ((1u64 << Self::HALF_BITS) - 1)) as Index
    }
}

/// Codec between `(row, col)` pairs and packed keys under a chosen ordering.
#[derive(Debug, Clone, Copy)]
pub struct KeyCodec<X: CoordKey> {
    ordering: Ordering,
    _key: std::marker::PhantomData<X>,
}

impl<X: CoordKey> KeyCodec<X> {
    pub fn new(ordering: Ordering) -> Self {
        Self {
            ordering,
            _key: std::marker::PhantomData,
        }
    }

    pub fn ordering(&self) -> Ordering {
        self.ordering
    }

    #[inline]
    pub fn key(&self, row: Index, col: Index) -> X {
        match self.ordering {
            Ordering::RowMajor => X::pack(row, col),
            Ordering::ColMajor => X::pack(col, row),
        }
    }

    #[inline]
    pub fn row(&self, key: X) -> Index {
        match self.ordering {
            Ordering::RowMajor => key.major(),
            Ordering::ColMajor => key.minor(),
        }
    }

    #[inline]
    pub fn col(&self, key: X) -> Index {
        match self.ordering {
            Ordering::RowMajor => key.minor(),
            Ordering::ColMajor => key.major(),
        }
    }

    /// Verify that all indices below `limit` fit the key half-width.
    pub fn check_limit(limit: Index) -> Result<(), MatrixError> {
        if X::HALF_BITS >= Index::BITS {
            return Ok(());
        }
        if limit > (1u32 << X::HALF_BITS) {
            return Err(MatrixError::LimitExceedsKeyWidth {
                limit,
                bits: X::HALF_BITS,
            });
        }
        Ok(())
    }
}
