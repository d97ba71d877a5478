//! The common accumulation contract.
//!
//! Every container variant — dense, COO, sharded, and the borrowing
//! solver-native adapters — exposes the same interface so Jacobian-building
//! code never knows which storage it is writing into. The contract is
//! accumulate-on-assign: repeated assignment to one coordinate sums.
//!
//! Containers are not thread safe; the parallel story is one container per
//! worker, merged after join ([`MatrixData::merge`]). The `start` /
//! `next_element` / `more_data` protocol is a resettable forward cursor
//! usable through `dyn MatrixData`; it is invalidated by any mutation.

use gridflow_core::{Count, Index};

use crate::element::MatrixElement;
use crate::error::MatrixError;

/// Common contract for Jacobian-entry accumulation.
pub trait MatrixData {
    /// Discard all entries; limits are untouched.
    fn clear(&mut self);

    /// Add a contribution at `(row, col)`.
    ///
    /// Out-of-range coordinates and non-finite values are typed errors in
    /// every variant.
    fn assign(&mut self, row: Index, col: Index, value: f64) -> Result<(), MatrixError>;

    /// Current entry count. Before `compact` this may include duplicate
    /// coordinates awaiting summation.
    fn size(&self) -> Count;

    /// Reserved storage, informational.
    fn capacity(&self) -> Count;

    /// Pre-allocate for an expected nonzero count.
    fn reserve(&mut self, _max_nonzeros: Count) {}

    fn row_limit(&self) -> Index;
    fn col_limit(&self) -> Index;

    /// Update the row bound; keyed variants also recalibrate their shard
    /// selector and revalidate the key width.
    fn set_row_limit(&mut self, limit: Index) -> Result<(), MatrixError>;
    fn set_col_limit(&mut self, limit: Index) -> Result<(), MatrixError>;

    /// Summed value at `(row, col)`, 0.0 if absent. Correct whether or not
    /// the container has been compacted.
    fn at(&self, row: Index, col: Index) -> f64;

    /// Positional access into the container's storage order.
    ///
    /// `n` must be below [`size`](Self::size). For sharded storage this
    /// walks shard boundaries and is O(shards), not O(1).
    fn element(&self, n: Count) -> MatrixElement;

    /// Sort by key and merge duplicate coordinates by summation.
    /// Idempotent; a no-op for storage that is always compact.
    fn compact(&mut self) {}

    /// Reset the forward cursor to the first entry.
    fn start(&mut self);

    /// Return the cursor's entry and advance. Only valid while
    /// [`more_data`](Self::more_data) is true.
    fn next_element(&mut self) -> MatrixElement;

    /// Whether the cursor has entries left.
    fn more_data(&self) -> bool;

    /// Add a contribution, silently dropping it if `row` is out of range.
    ///
    /// Jacobian builders use this family when a contributing state may
    /// have no allocated slot (a `NULL_LOCATION` row or column).
    fn assign_check_row(&mut self, row: Index, col: Index, value: f64) -> Result<(), MatrixError> {
        if !value.is_finite() {
            return Err(MatrixError::NonFiniteValue { row, col, value });
        }
        if row < self.row_limit() {
            self.assign(row, col, value)
        } else {
            Ok(())
        }
    }

    /// Add a contribution, silently dropping it if `col` is out of range.
    fn assign_check_col(&mut self, row: Index, col: Index, value: f64) -> Result<(), MatrixError> {
        if !value.is_finite() {
            return Err(MatrixError::NonFiniteValue { row, col, value });
        }
        if col < self.col_limit() {
            self.assign(row, col, value)
        } else {
            Ok(())
        }
    }

    /// Add a contribution, silently dropping it if either coordinate is
    /// out of range.
    fn assign_check(&mut self, row: Index, col: Index, value: f64) -> Result<(), MatrixError> {
        if !value.is_finite() {
            return Err(MatrixError::NonFiniteValue { row, col, value });
        }
        if row < self.row_limit() && col < self.col_limit() {
            self.assign(row, col, value)
        } else {
            Ok(())
        }
    }

    /// Append every entry of `other`.
    fn merge(&mut self, other: &mut dyn MatrixData) -> Result<(), MatrixError> {
        other.start();
        while other.more_data() {
            let el = other.next_element();
            self.assign(el.row, el.col, el.value)?;
        }
        Ok(())
    }

    /// Append every entry of `other`, scaled.
    fn merge_scaled(
        &mut self,
        other: &mut dyn MatrixData,
        scale: f64,
    ) -> Result<(), MatrixError> {
        other.start();
        while other.more_data() {
            let el = other.next_element();
            self.assign(el.row, el.col, el.value * scale)?;
        }
        Ok(())
    }

    /// Copy entries of `other` whose row equals `orig_row`, re-tagged with
    /// `new_row`. Used to splice a sub-model's local equation index into a
    /// parent's global index space.
    fn copy_translate_row(
        &mut self,
        other: &mut dyn MatrixData,
        orig_row: Index,
        new_row: Index,
    ) -> Result<(), MatrixError> {
        other.start();
        while other.more_data() {
            let el = other.next_element();
            if el.row == orig_row {
                self.assign(new_row, el.col, el.value)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coo::CooMatrix;

    #[test]
    fn check_variants_drop_out_of_range_silently() {
        let mut m = CooMatrix::new(5, 5);
        m.assign_check_row(7, 1, 1.0).unwrap();
        assert_eq!(m.size(), 0);
        m.assign_check_col(1, 9, 1.0).unwrap();
        assert_eq!(m.size(), 0);
        m.assign_check(6, 6, 1.0).unwrap();
        assert_eq!(m.size(), 0);
        m.assign_check(2, 3, 1.0).unwrap();
        assert_eq!(m.size(), 1);
    }

    #[test]
    fn check_variants_still_reject_non_finite() {
        let mut m = CooMatrix::new(5, 5);
        assert!(m.assign_check(9, 9, f64::NAN).is_err());
        assert!(m.assign_check_row(1, 1, f64::INFINITY).is_err());
    }

    #[test]
    fn merge_appends_all_entries() {
        let mut a = CooMatrix::new(4, 4);
        let mut b = CooMatrix::new(4, 4);
        a.assign(0, 0, 1.0).unwrap();
        b.assign(0, 0, 2.0).unwrap();
        b.assign(3, 1, 5.0).unwrap();
        a.merge(&mut b).unwrap();
        a.compact();
        assert!((a.at(0, 0) - 3.0).abs() < 1e-14);
        assert!((a.at(3, 1) - 5.0).abs() < 1e-14);
    }

    #[test]
    fn merge_scaled_applies_factor() {
        let mut a = CooMatrix::new(4, 4);
        let mut b = CooMatrix::new(4, 4);
        b.assign(2, 2, 4.0).unwrap();
        a.merge_scaled(&mut b, -0.5).unwrap();
        assert!((a.at(2, 2) + 2.0).abs() < 1e-14);
    }

    #[test]
    fn per_worker_containers_merge_after_join() {
        let (mut left, mut right) = rayon::join(
            || {
                let mut m = CooMatrix::new(100, 100);
                for i in 0..100 {
                    m.assign(i, i, 1.0).unwrap();
                }
                m
            },
            || {
                let mut m = CooMatrix::new(100, 100);
                for i in 0..100 {
                    m.assign(i, i, 2.0).unwrap();
                }
                m
            },
        );
        left.merge(&mut right).unwrap();
        left.compact();
        assert_eq!(left.size(), 100);
        assert!((left.at(42, 42) - 3.0).abs() < 1e-14);
    }

    #[test]
    fn copy_translate_row_retags_matching_rows() {
        let mut local = CooMatrix::new(4, 4);
        local.assign(1, 0, 2.0).unwrap();
        local.assign(1, 3, 7.0).unwrap();
        local.assign(2, 2, 9.0).unwrap();

        let mut global = CooMatrix::new(40, 4);
        global.copy_translate_row(&mut local, 1, 30).unwrap();
        assert_eq!(global.size(), 2);
        assert!((global.at(30, 0) - 2.0).abs() < 1e-14);
        assert!((global.at(30, 3) - 7.0).abs() < 1e-14);
        assert_eq!(global.at(2, 2), 0.0);
    }
}
