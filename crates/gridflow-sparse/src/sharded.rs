//! Sharded COO accumulator.
//!
//! Entries are stored as `(packed key, value)` pairs spread over `2^k`
//! shards keyed on the ordering's major index. Each shard covers a
//! contiguous major-index range, so sorting shards independently and
//! walking them in order yields a globally key-sorted sequence. Sorting
//! `2^k` vectors of `n / 2^k` entries is meaningfully cheaper than one
//! sort of `n`, and disjoint shards can be filled without contention.

use gridflow_core::{Count, Index};

use crate::block::BlockSelector;
use crate::element::MatrixElement;
use crate::error::MatrixError;
use crate::ordering::{CoordKey, KeyCodec, Ordering};
use crate::traits::MatrixData;

#[derive(Debug, Clone)]
pub struct ShardedMatrix<X: CoordKey> {
    codec: KeyCodec<X>,
    selector: BlockSelector,
    shards: Vec<Vec<(X, f64)>>,
    /// per-shard entry count at last sort; shard is sorted iff equal to len
    sorted_len: Vec<usize>,
    row_lim: Index,
    col_lim: Index,
    cur_shard: usize,
    cur_pos: usize,
}

impl<X: CoordKey> ShardedMatrix<X> {
    /// Checked constructor: `k` must not exceed the supported shard
    /// exponent and both limits must fit the key half-width.
    pub fn new(k: u32, ordering: Ordering, rows: Index, cols: Index) -> Result<Self, MatrixError> {
        KeyCodec::<X>::check_limit(rows)?;
        KeyCodec::<X>::check_limit(cols)?;
        let mut selector = BlockSelector::new(k, ordering)?;
        selector.set_max_index(rows, cols);
        let shard_count = selector.block_count();
        Ok(Self {
            codec: KeyCodec::new(ordering),
            selector,
            shards: vec![Vec::new(); shard_count],
            sorted_len: vec![usize::MAX; shard_count],
            row_lim: rows,
            col_lim: cols,
            cur_shard: 0,
            cur_pos: 0,
        })
    }

    pub fn ordering(&self) -> Ordering {
        self.codec.ordering()
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn shard_is_sorted(&self, s: usize) -> bool {
        self.sorted_len[s] == self.shards[s].len()
    }

    /// Re-shard every entry after a calibration change. Keys are already
    /// packed so only the shard assignment moves.
    fn redistribute(&mut self) {
        let all: Vec<(X, f64)> = self.shards.iter_mut().flat_map(std::mem::take).collect();
        for s in &mut self.sorted_len {
            *s = usize::MAX;
        }
        for (key, value) in all {
            let shard = self
                .selector
                .block_index(self.codec.row(key), self.codec.col(key));
            self.shards[shard].push((key, value));
        }
    }

    fn recalibrate(&mut self) {
        self.selector.set_max_index(self.row_lim, self.col_lim);
        if self.shards.iter().any(|s| !s.is_empty()) {
            self.redistribute();
        }
    }

    /// Entry at linearized position `n` across the shards in shard order.
    fn locate(&self, n: usize) -> (usize, usize) {
        let mut remaining = n;
        for (s, shard) in self.shards.iter().enumerate() {
            if remaining < shard.len() {
                return (s, remaining);
            }
            remaining -= shard.len();
        }
        (self.shards.len(), 0)
    }
}

impl<X: CoordKey> MatrixData for ShardedMatrix<X> {
    fn clear(&mut self) {
        for shard in &mut self.shards {
            shard.clear();
        }
        for s in &mut self.sorted_len {
            *s = usize::MAX;
        }
    }

    fn assign(&mut self, row: Index, col: Index, value: f64) -> Result<(), MatrixError> {
        if row >= self.row_lim || col >= self.col_lim {
            return Err(MatrixError::InvalidCoordinate {
                row,
                col,
                row_limit: self.row_lim,
                col_limit: self.col_lim,
            });
        }
        if !value.is_finite() {
            return Err(MatrixError::NonFiniteValue { row, col, value });
        }
        let shard = self.selector.block_index(row, col);
        self.shards[shard].push((self.codec.key(row, col), value));
        Ok(())
    }

    fn size(&self) -> Count {
        self.shards.iter().map(Vec::len).sum::<usize>() as Count
    }

    fn capacity(&self) -> Count {
        self.shards.iter().map(Vec::capacity).sum::<usize>() as Count
    }

    fn reserve(&mut self, max_nonzeros: Count) {
        // fills are rarely uniform; leave each shard slack over an even split
        let per_shard = (max_nonzeros as usize / self.shards.len()) + (max_nonzeros as usize >> 3);
        for shard in &mut self.shards {
            shard.reserve(per_shard);
        }
    }

    fn row_limit(&self) -> Index {
        self.row_lim
    }

    fn col_limit(&self) -> Index {
        self.col_lim
    }

    fn set_row_limit(&mut self, limit: Index) -> Result<(), MatrixError> {
        KeyCodec::<X>::check_limit(limit)?;
        self.row_lim = limit;
        self.recalibrate();
        Ok(())
    }

    fn set_col_limit(&mut self, limit: Index) -> Result<(), MatrixError> {
        KeyCodec::<X>::check_limit(limit)?;
        self.col_lim = limit;
        self.recalibrate();
        Ok(())
    }

    fn at(&self, row: Index, col: Index) -> f64 {
        if row >= self.row_lim || col >= self.col_lim {
            return 0.0;
        }
        let key = self.codec.key(row, col);
        let s = self.selector.block_index(row, col);
        let shard = &self.shards[s];
        if self.shard_is_sorted(s) {
            let start = shard.partition_point(|&(k, _)| k < key);
            shard[start..]
                .iter()
                .take_while(|&&(k, _)| k == key)
                .map(|&(_, v)| v)
                .sum()
        } else {
            shard
                .iter()
                .filter(|&&(k, _)| k == key)
                .map(|&(_, v)| v)
                .sum()
        }
    }

    fn element(&self, n: Count) -> MatrixElement {
        let (s, pos) = self.locate(n as usize);
        let (key, value) = self.shards[s][pos];
        MatrixElement::new(self.codec.row(key), self.codec.col(key), value)
    }

    fn compact(&mut self) {
        for (s, shard) in self.shards.iter_mut().enumerate() {
            if shard.is_empty() {
                self.sorted_len[s] = 0;
                continue;
            }
            if self.sorted_len[s] != shard.len() {
                shard.sort_unstable_by_key(|&(k, _)| k);
            }
            let mut write = 0;
            for read in 1..shard.len() {
                let (key, value) = shard[read];
                if key == shard[write].0 {
                    shard[write].1 += value;
                } else {
                    write += 1;
                    shard[write] = (key, value);
                }
            }
            shard.truncate(write + 1);
            self.sorted_len[s] = shard.len();
        }
    }

    fn start(&mut self) {
        self.cur_shard = 0;
        self.cur_pos = 0;
        while self.cur_shard < self.shards.len() && self.shards[self.cur_shard].is_empty() {
            self.cur_shard += 1;
        }
    }

    fn next_element(&mut self) -> MatrixElement {
        let (key, value) = self.shards[self.cur_shard][self.cur_pos];
        self.cur_pos += 1;
        while self.cur_shard < self.shards.len()
            && self.cur_pos >= self.shards[self.cur_shard].len()
        {
            self.cur_shard += 1;
            self.cur_pos = 0;
        }
        MatrixElement::new(self.codec.row(key), self.codec.col(key), value)
    }

    fn more_data(&self) -> bool {
        self.cur_shard < self.shards.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn sum_on_duplicate_assignment() {
        let mut m = ShardedMatrix::<u32>::new(2, Ordering::ColMajor, 50, 50).unwrap();
        m.assign(10, 20, 1.0).unwrap();
        m.assign(10, 20, 2.0).unwrap();
        assert!((m.at(10, 20) - 3.0).abs() < 1e-14);
        m.compact();
        assert_eq!(m.size(), 1);
        assert!((m.at(10, 20) - 3.0).abs() < 1e-14);
    }

    #[test]
    fn compacted_iteration_is_key_ordered() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut m = ShardedMatrix::<u32>::new(2, Ordering::ColMajor, 1000, 1000).unwrap();
        for _ in 0..1000 {
            let row = rng.gen_range(0..1000);
            let col = rng.gen_range(0..1000);
            m.assign(row, col, rng.gen_range(-1.0..1.0)).unwrap();
        }
        m.compact();
        let codec = KeyCodec::<u32>::new(Ordering::ColMajor);
        let mut last = None;
        m.start();
        while m.more_data() {
            let el = m.next_element();
            let key = codec.key(el.row, el.col);
            if let Some(prev) = last {
                assert!(key > prev, "keys must strictly increase after compaction");
            }
            last = Some(key);
        }
    }

    #[test]
    fn compaction_preserves_totals_per_coordinate() {
        let mut rng = StdRng::seed_from_u64(13);
        let mut m = ShardedMatrix::<u64>::new(3, Ordering::RowMajor, 200, 200).unwrap();
        let mut expected = std::collections::HashMap::new();
        for _ in 0..500 {
            let row = rng.gen_range(0..200);
            let col = rng.gen_range(0..20);
            let v = rng.gen_range(-10.0..10.0);
            *expected.entry((row, col)).or_insert(0.0) += v;
            m.assign(row, col, v).unwrap();
        }
        m.compact();
        assert_eq!(m.size() as usize, expected.len());
        for (&(row, col), &total) in &expected {
            assert!((m.at(row, col) - total).abs() < 1e-9);
        }
    }

    #[test]
    fn rejects_out_of_range_and_non_finite() {
        let mut m = ShardedMatrix::<u32>::new(1, Ordering::ColMajor, 10, 10).unwrap();
        assert!(matches!(
            m.assign(10, 0, 1.0),
            Err(MatrixError::InvalidCoordinate { .. })
        ));
        assert!(matches!(
            m.assign(0, 0, f64::NAN),
            Err(MatrixError::NonFiniteValue { .. })
        ));
        assert_eq!(m.size(), 0);
    }

    #[test]
    fn narrow_keys_reject_wide_limits() {
        assert!(ShardedMatrix::<u32>::new(2, Ordering::ColMajor, 70_000, 10).is_err());
        assert!(ShardedMatrix::<u64>::new(2, Ordering::ColMajor, 70_000, 70_000).is_ok());
    }

    #[test]
    fn limit_change_recalibrates_without_losing_entries() {
        let mut m = ShardedMatrix::<u32>::new(2, Ordering::ColMajor, 100, 100).unwrap();
        for i in 0..50 {
            m.assign(i, i * 2, f64::from(i)).unwrap();
        }
        m.set_col_limit(4000).unwrap();
        m.set_row_limit(4000).unwrap();
        assert_eq!(m.size(), 50);
        for i in 0..50 {
            assert!((m.at(i, i * 2) - f64::from(i)).abs() < 1e-14);
        }
    }

    #[test]
    fn element_indexing_spans_shards() {
        let mut m = ShardedMatrix::<u32>::new(2, Ordering::RowMajor, 100, 100).unwrap();
        for row in [5, 30, 60, 95] {
            m.assign(row, 0, f64::from(row)).unwrap();
        }
        m.compact();
        let rows: Vec<Index> = (0..m.size()).map(|n| m.element(n).row).collect();
        assert_eq!(rows, vec![5, 30, 60, 95]);
    }

    #[test]
    fn clear_resets_all_shards() {
        let mut m = ShardedMatrix::<u32>::new(3, Ordering::ColMajor, 64, 64).unwrap();
        for i in 0..64 {
            m.assign(0, i, 1.0).unwrap();
        }
        m.clear();
        assert_eq!(m.size(), 0);
        m.start();
        assert!(!m.more_data());
    }
}
