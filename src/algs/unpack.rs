//! Unpack: drain the factor entries of a frontal tree into a sparse matrix.
//!
//! The inverse of [`pull`](crate::algs::pull::pull). A counting pass sizes the
//! per-destination buffers, a packing pass fills them by walking the same
//! entries in the same order, and one exchange delivers `(row, col, value)`
//! records to the owners of the rows.

use std::time::Instant;

use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::exchange::all_to_all_payloads;
use crate::algs::traversal::for_each_factor_entry;
use crate::algs::wire::{Phase, entry_size, push_entry, read_entries};
use crate::data::dist_map::DistMap;
use crate::data::scalar::Scalar;
use crate::data::sparse::DistSparseMatrix;
use crate::debug_invariants::check_cursor;
use crate::front::FrontTree;
use crate::front_error::FrontError;
use crate::topology::grid::Team;
use crate::topology::tree::SymbolicTree;

/// Default tag of [`FrontTree::unpack`].
pub const UNPACK_TAG: CommTag = CommTag::new(0x554E);

impl<F: Scalar> FrontTree<F> {
    /// A fresh `n × n` sparse matrix, `n = root.off + root.size`, holding the
    /// lower triangle of every diagonal block and every fill-in block, in
    /// reordered numbering.
    ///
    /// Entries that are exactly zero are not transmitted. Collective over the
    /// world of `comm`.
    pub fn unpack<C: Communicator>(
        &self,
        tree: &SymbolicTree,
        comm: &C,
    ) -> Result<DistSparseMatrix<F>, FrontError> {
        self.unpack_with_tag(tree, comm, UNPACK_TAG)
    }

    pub fn unpack_with_tag<C: Communicator>(
        &self,
        tree: &SymbolicTree,
        comm: &C,
        tag: CommTag,
    ) -> Result<DistSparseMatrix<F>, FrontError> {
        self.check_shape(tree)?;
        let team = Team::world(comm.size(), comm.rank());
        let n = tree.dimension();
        let mut a = DistSparseMatrix::zeros(n, n, comm.rank(), comm.size());

        // count
        let t0 = Instant::now();
        let mut send_sizes = vec![0usize; team.size()];
        for_each_factor_entry(tree, self, |i, _, value| {
            if !value.is_zero() {
                send_sizes[a.row_owner(i)] += 1;
            }
        });

        // pack, same walk
        let mut payloads: Vec<Vec<u8>> = send_sizes
            .iter()
            .map(|&k| Vec::with_capacity(k * entry_size::<F>()))
            .collect();
        for_each_factor_entry(tree, self, |i, j, value| {
            if !value.is_zero() {
                push_entry(&mut payloads[a.row_owner(i)], i, j, value);
            }
        });
        for (q, payload) in payloads.iter().enumerate() {
            check_cursor(
                "unpack pack",
                q,
                send_sizes[q],
                payload.len() / entry_size::<F>(),
            )?;
        }
        log::debug!(
            "unpack[{}]: packed {} entries in {:?}",
            comm.rank(),
            send_sizes.iter().sum::<usize>(),
            t0.elapsed()
        );

        // exchange and queue
        let t0 = Instant::now();
        let frames = all_to_all_payloads(comm, &team, tag, Phase::UnpackEntries, payloads, &send_sizes)?;
        a.reserve(frames.iter().map(|(count, _)| count).sum());
        for (q, (count, bytes)) in frames.into_iter().enumerate() {
            if bytes.len() != count * entry_size::<F>() {
                return Err(FrontError::BufferSizeMismatch {
                    neighbor: team.world_rank(q),
                    expected: count * entry_size::<F>(),
                    got: bytes.len(),
                });
            }
            for (i, j, value) in read_entries::<F>(&bytes) {
                a.queue_update(i, j, value)?;
            }
        }
        a.process_queues();
        log::debug!(
            "unpack[{}]: {} local entries after {:?}",
            comm.rank(),
            a.num_local_entries(),
            t0.elapsed()
        );
        Ok(a)
    }

    /// Redistribute the fronts into an existing matrix without zeroing it.
    ///
    /// Not available: always fails with [`FrontError::Unimplemented`].
    pub fn push<C: Communicator>(
        &self,
        _a: &mut DistSparseMatrix<F>,
        _reordering: &DistMap,
        _tree: &SymbolicTree,
        _comm: &C,
    ) -> Result<(), FrontError> {
        Err(FrontError::Unimplemented("push"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;

    #[test]
    fn push_is_unimplemented() {
        let tree = SymbolicTree::single(vec![0]);
        let fronts = FrontTree::<f64>::zeros(&tree);
        let mut a = DistSparseMatrix::zeros(1, 1, 0, 1);
        let map = DistMap::identity(1, 0, 1);
        assert_eq!(
            fronts.push(&mut a, &map, &tree, &NoComm),
            Err(FrontError::Unimplemented("push"))
        );
    }

    #[test]
    fn zero_front_unpacks_to_empty_matrix() {
        let tree = SymbolicTree::single(vec![0, 1, 2]);
        let fronts = FrontTree::<f64>::zeros(&tree);
        let a = fronts.unpack(&tree, &NoComm).unwrap();
        assert_eq!(a.height(), 3);
        assert_eq!(a.num_local_entries(), 0);
    }

    #[test]
    fn lower_triangle_and_fill_are_sent() {
        let tree = SymbolicTree::single(vec![0, 1]);
        let mut fronts = FrontTree::<f64>::zeros(&tree);
        let f = fronts.front_mut(fronts.root()).unwrap();
        f.l.set(0, 0, 1.0);
        f.l.set(1, 0, 2.0);
        f.l.set(1, 1, 3.0);
        f.l.set(0, 1, 9.0); // strictly upper, never read
        let a = fronts.unpack(&tree, &NoComm).unwrap();
        let got: Vec<_> = a.local_entries().collect();
        assert_eq!(got, vec![(0, 0, 1.0), (1, 0, 2.0), (1, 1, 3.0)]);
    }
}
