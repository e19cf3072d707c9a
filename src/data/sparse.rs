//! Row-distributed sparse matrix in compressed sparse row form.
//!
//! Rows are split into contiguous blocks of `height / comm_size` rows, the last
//! rank taking the remainder. Each rank stores its rows as a CSR structure with
//! global column indices. Updates are queued with [`DistSparseMatrix::queue_update`]
//! and only become visible after [`DistSparseMatrix::process_queues`], which
//! sorts the local entries by `(row, col)` and sums duplicates.

use crate::data::scalar::Scalar;
use crate::debug_invariants::DebugInvariants;
use crate::front_error::FrontError;

#[derive(Clone, Debug, PartialEq)]
pub struct DistSparseMatrix<F> {
    height: usize,
    width: usize,
    rank: usize,
    comm_size: usize,
    /// `row_offsets[k]..row_offsets[k + 1]` are the entries of local row `k`.
    row_offsets: Vec<usize>,
    cols: Vec<usize>,
    vals: Vec<F>,
    /// Pending `(local row, col, value)` updates.
    queue: Vec<(usize, usize, F)>,
}

impl<F: Scalar> DistSparseMatrix<F> {
    /// Empty `height × width` matrix as seen from `rank` of `comm_size` ranks.
    pub fn zeros(height: usize, width: usize, rank: usize, comm_size: usize) -> Self {
        debug_assert!(rank < comm_size.max(1));
        let mut a = Self {
            height,
            width,
            rank,
            comm_size: comm_size.max(1),
            row_offsets: Vec::new(),
            cols: Vec::new(),
            vals: Vec::new(),
            queue: Vec::new(),
        };
        a.row_offsets = vec![0; a.local_height() + 1];
        a
    }

    /// Reset to an empty `height × width` matrix, keeping the distribution.
    pub fn resize(&mut self, height: usize, width: usize) {
        *self = Self::zeros(height, width, self.rank, self.comm_size);
    }

    /// Move the matrix to a different communicator shape; all entries are dropped.
    pub fn set_comm(&mut self, rank: usize, comm_size: usize) {
        *self = Self::zeros(self.height, self.width, rank, comm_size);
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }
    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }
    #[inline]
    pub fn comm_size(&self) -> usize {
        self.comm_size
    }

    #[inline]
    pub fn blocksize(&self) -> usize {
        self.height / self.comm_size
    }

    /// Rank owning global row `i`.
    #[inline]
    pub fn row_owner(&self, i: usize) -> usize {
        let bs = self.blocksize();
        if bs == 0 {
            self.comm_size - 1
        } else {
            (i / bs).min(self.comm_size - 1)
        }
    }

    #[inline]
    pub fn first_local_row(&self) -> usize {
        self.rank * self.blocksize()
    }

    #[inline]
    pub fn local_height(&self) -> usize {
        if self.rank + 1 < self.comm_size {
            self.blocksize()
        } else {
            self.height - (self.comm_size - 1) * self.blocksize()
        }
    }

    #[inline]
    pub fn global_row(&self, i_loc: usize) -> usize {
        self.first_local_row() + i_loc
    }

    #[inline]
    pub fn num_local_entries(&self) -> usize {
        self.cols.len()
    }

    /// Index of the first local entry of local row `i_loc`.
    #[inline]
    pub fn entry_offset(&self, i_loc: usize) -> usize {
        self.row_offsets[i_loc]
    }

    #[inline]
    pub fn num_connections(&self, i_loc: usize) -> usize {
        self.row_offsets[i_loc + 1] - self.row_offsets[i_loc]
    }

    /// Global row of local entry `e`.
    pub fn row(&self, e: usize) -> usize {
        let i_loc = self.row_offsets.partition_point(|&off| off <= e) - 1;
        self.global_row(i_loc)
    }

    #[inline]
    pub fn col(&self, e: usize) -> usize {
        self.cols[e]
    }

    #[inline]
    pub fn value(&self, e: usize) -> F {
        self.vals[e]
    }

    /// Local column indices in entry order.
    pub fn local_cols(&self) -> &[usize] {
        &self.cols
    }

    /// `(global row, col, value)` of every processed local entry, sorted.
    pub fn local_entries(&self) -> impl Iterator<Item = (usize, usize, F)> + '_ {
        (0..self.local_height()).flat_map(move |i_loc| {
            let i = self.global_row(i_loc);
            (self.row_offsets[i_loc]..self.row_offsets[i_loc + 1])
                .map(move |e| (i, self.cols[e], self.vals[e]))
        })
    }

    /// Room for `n` more queued updates.
    pub fn reserve(&mut self, n: usize) {
        self.queue.reserve(n);
    }

    /// Queue `A(i, j) += value`; `i` must be a local row.
    pub fn queue_update(&mut self, i: usize, j: usize, value: F) -> Result<(), FrontError> {
        if i >= self.height {
            return Err(FrontError::IndexOutOfRange {
                index: i,
                len: self.height,
            });
        }
        if self.row_owner(i) != self.rank {
            return Err(FrontError::NonLocalRow {
                row: i,
                rank: self.rank,
            });
        }
        self.queue_local_update(i - self.first_local_row(), j, value)
    }

    /// Queue `A(global_row(i_loc), j) += value`.
    pub fn queue_local_update(&mut self, i_loc: usize, j: usize, value: F) -> Result<(), FrontError> {
        if i_loc >= self.local_height() {
            return Err(FrontError::IndexOutOfRange {
                index: i_loc,
                len: self.local_height(),
            });
        }
        if j >= self.width {
            return Err(FrontError::IndexOutOfRange {
                index: j,
                len: self.width,
            });
        }
        self.queue.push((i_loc, j, value));
        Ok(())
    }

    /// Fold queued updates into the CSR structure: entries sorted by
    /// `(row, col)`, duplicates summed.
    pub fn process_queues(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        let mut triplets: Vec<(usize, usize, F)> =
            Vec::with_capacity(self.cols.len() + self.queue.len());
        for i_loc in 0..self.local_height() {
            for e in self.row_offsets[i_loc]..self.row_offsets[i_loc + 1] {
                triplets.push((i_loc, self.cols[e], self.vals[e]));
            }
        }
        triplets.append(&mut self.queue);
        triplets.sort_by_key(|&(i, j, _)| (i, j));

        let mut row_counts = vec![0usize; self.local_height()];
        self.cols.clear();
        self.vals.clear();
        let mut last: Option<(usize, usize)> = None;
        for (i, j, v) in triplets {
            if last == Some((i, j)) {
                if let Some(slot) = self.vals.last_mut() {
                    *slot += v;
                }
                continue;
            }
            last = Some((i, j));
            row_counts[i] += 1;
            self.cols.push(j);
            self.vals.push(v);
        }
        self.row_offsets.clear();
        self.row_offsets.push(0);
        let mut total = 0;
        for c in row_counts {
            total += c;
            self.row_offsets.push(total);
        }
        crate::debug_invariants!(self.validate_invariants(), "DistSparseMatrix::process_queues");
    }
}

impl<F: Scalar> DebugInvariants for DistSparseMatrix<F> {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "DistSparseMatrix");
    }

    fn validate_invariants(&self) -> Result<(), FrontError> {
        let lh = self.local_height();
        if self.row_offsets.len() != lh + 1 || self.row_offsets.last() != Some(&self.cols.len()) {
            return Err(FrontError::AccountingMismatch {
                stage: "sparse row offsets",
                rank: self.rank,
                expected: self.cols.len(),
                got: self.row_offsets.last().copied().unwrap_or(0),
            });
        }
        for i_loc in 0..lh {
            let row = &self.cols[self.row_offsets[i_loc]..self.row_offsets[i_loc + 1]];
            if let Some(&j) = row.iter().find(|&&j| j >= self.width) {
                return Err(FrontError::IndexOutOfRange {
                    index: j,
                    len: self.width,
                });
            }
            if row.windows(2).any(|w| w[0] >= w[1]) {
                return Err(FrontError::AccountingMismatch {
                    stage: "sparse row ordering",
                    rank: self.rank,
                    expected: row.len(),
                    got: row.windows(2).filter(|w| w[0] < w[1]).count() + 1,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_row_distribution() {
        let a = DistSparseMatrix::<f64>::zeros(10, 10, 2, 3);
        assert_eq!(a.blocksize(), 3);
        assert_eq!(a.first_local_row(), 6);
        assert_eq!(a.local_height(), 4);
        assert_eq!(a.row_owner(9), 2);
        assert_eq!(a.row_owner(5), 1);

        // fewer rows than ranks: the last rank owns everything
        let b = DistSparseMatrix::<f64>::zeros(2, 2, 0, 4);
        assert_eq!(b.local_height(), 0);
        assert_eq!(b.row_owner(1), 3);
    }

    #[test]
    fn queue_sorts_and_sums() {
        let mut a = DistSparseMatrix::<f64>::zeros(4, 4, 1, 2);
        a.queue_update(3, 1, 1.0).unwrap();
        a.queue_update(2, 3, 2.0).unwrap();
        a.queue_update(3, 1, 0.5).unwrap();
        a.queue_update(2, 0, 4.0).unwrap();
        a.process_queues();
        let got: Vec<_> = a.local_entries().collect();
        assert_eq!(got, vec![(2, 0, 4.0), (2, 3, 2.0), (3, 1, 1.5)]);
        assert_eq!(a.num_connections(0), 2);
        assert_eq!(a.entry_offset(1), 2);
        assert_eq!(a.row(2), 3);

        // a second round merges with what is already stored
        a.queue_update(2, 3, 1.0).unwrap();
        a.process_queues();
        assert_eq!(a.value(1), 3.0);
        assert_eq!(a.num_local_entries(), 3);
    }

    #[test]
    fn foreign_rows_are_rejected() {
        let mut a = DistSparseMatrix::<f64>::zeros(4, 4, 0, 2);
        assert_eq!(
            a.queue_update(3, 0, 1.0),
            Err(FrontError::NonLocalRow { row: 3, rank: 0 })
        );
        assert!(matches!(
            a.queue_update(1, 7, 1.0),
            Err(FrontError::IndexOutOfRange { index: 7, len: 4 })
        ));
    }
}
