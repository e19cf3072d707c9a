//! Extend-add data movement: a child's update block into its parent front.
//!
//! Runs after [`FrontTree::compute_comm_meta`] with receive indices. Every
//! member of the parent team packs the lower triangle of the update block of
//! the child it holds, in the same order the plan was counted in, and sends
//! each entry to the owner of its destination in the parent. Receivers add
//! the values at the positions recorded in `child_recv_inds`, into `L` for
//! columns of the diagonal block and into the parent's own update block
//! beyond it.

use std::mem::size_of;
use std::time::Instant;

use crate::algs::comm_meta::check_update_shape;
use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::exchange::all_to_all_payloads;
use crate::algs::traversal::for_each_update_entry;
use crate::algs::wire::{Phase, read_records};
use crate::data::dense::DenseMatrix;
use crate::data::dist_matrix::DistMatrix;
use crate::data::scalar::Scalar;
use crate::debug_invariants::check_cursor;
use crate::front::{DistFront, FrontNode, FrontTree};
use crate::front_error::FrontError;
use crate::topology::tree::{NodeId, NodeKind, SymbolicTree};

/// Default tag of [`FrontTree::exchange_child_update`].
pub const CHILD_UPDATE_TAG: CommTag = CommTag::new(0x4355);

impl<F: Scalar> FrontTree<F> {
    /// Allocate a zeroed update block for `node`, `lower_size × lower_size`,
    /// distributed like the bottom-right block of the full front.
    pub fn init_work(&mut self, tree: &SymbolicTree, node: NodeId) -> Result<(), FrontError> {
        let info = tree.info(node);
        let (size, lower) = (info.size, info.lower_size());
        match self.node_mut(node) {
            FrontNode::Local(f) => f.work = Some(DenseMatrix::zeros(lower, lower)),
            FrontNode::Dist(f) => {
                let grid = f.l2d.grid().clone();
                f.work = Some(DistMatrix::zeros_aligned(grid, lower, lower, size, size));
            }
        }
        Ok(())
    }

    /// Add the update block of `node`'s child into `node`, then release it.
    ///
    /// Collective over the team of `node`. Requires the child's update block
    /// and a plan with receive indices; the parent's own update block is only
    /// required when entries land beyond its diagonal block.
    pub fn exchange_child_update<C: Communicator>(
        &mut self,
        tree: &SymbolicTree,
        node: NodeId,
        comm: &C,
    ) -> Result<(), FrontError> {
        self.exchange_child_update_with_tag(tree, node, comm, CHILD_UPDATE_TAG)
    }

    pub fn exchange_child_update_with_tag<C: Communicator>(
        &mut self,
        tree: &SymbolicTree,
        node: NodeId,
        comm: &C,
        tag: CommTag,
    ) -> Result<(), FrontError> {
        #[cfg(feature = "strict-invariants")]
        crate::debug_invariants::DebugInvariants::validate_invariants(tree)?;
        let link = match &tree.node(node).kind {
            NodeKind::Distributed(link) => link,
            NodeKind::Local { .. } => {
                log::warn!("child update of local node {node}: nothing to exchange");
                return Ok(());
            }
        };
        let team = link.grid.team();
        let not_dist = || FrontError::TreeShapeMismatch {
            node: node.index(),
            reason: "distributed node without a distributed front",
        };

        // pack in planning order
        let t0 = Instant::now();
        let parent = self.dist_front(node).ok_or_else(not_dist)?;
        let meta = &parent.comm_meta;
        if meta.num_child_send_inds.len() != team.size() || meta.child_recv_inds.len() != team.size() {
            return Err(FrontError::MissingRecvInds {
                node: node.index(),
            });
        }
        let rel = link.my_child_rel_inds();
        let child_front = self.node(link.child);
        check_update_shape(link.child, child_front, rel.len())?;

        let send_sizes = meta.num_child_send_inds.clone();
        let mut payloads: Vec<Vec<u8>> = send_sizes
            .iter()
            .map(|&k| Vec::with_capacity(k * size_of::<F>()))
            .collect();
        let l2d = &parent.l2d;
        for_each_update_entry(link.child, child_front, |i_child, j_child, value| {
            let q = l2d.owner(rel[i_child], rel[j_child]);
            payloads[q].extend_from_slice(bytemuck::bytes_of(&value));
        })?;
        for (q, payload) in payloads.iter().enumerate() {
            check_cursor("child update pack", q, send_sizes[q], payload.len() / size_of::<F>())?;
        }

        let frames = all_to_all_payloads(comm, team, tag, Phase::ChildUpdate, payloads, &send_sizes)?;
        log::debug!(
            "child update of node {node}: exchanged {} entries in {:?}",
            frames.iter().map(|(count, _)| count).sum::<usize>(),
            t0.elapsed()
        );

        let parent = self.dist_front_mut(node).ok_or_else(not_dist)?;
        accumulate(node, tree.info(node).size, parent, team.members(), frames)?;

        match self.node_mut(link.child) {
            FrontNode::Local(f) => f.work = None,
            FrontNode::Dist(f) => f.work = None,
        }
        Ok(())
    }
}

/// Validate every received frame against the plan, then add the values.
fn accumulate<F: Scalar>(
    node: NodeId,
    size: usize,
    parent: &mut DistFront<F>,
    members: &[usize],
    frames: Vec<(usize, Vec<u8>)>,
) -> Result<(), FrontError> {
    let DistFront {
        l2d,
        work,
        comm_meta,
        ..
    } = parent;

    let mut values = Vec::with_capacity(frames.len());
    for (q, (count, bytes)) in frames.into_iter().enumerate() {
        let expected = comm_meta.num_recv_from(q);
        if count != expected {
            return Err(FrontError::AccountingMismatch {
                stage: "child update receive",
                rank: members[q],
                expected,
                got: count,
            });
        }
        if bytes.len() != count * size_of::<F>() {
            return Err(FrontError::BufferSizeMismatch {
                neighbor: members[q],
                expected: count * size_of::<F>(),
                got: bytes.len(),
            });
        }
        values.push(read_records::<F>(&bytes));
    }

    let local_width = l2d.local_width();
    let lands_in_work = comm_meta
        .child_recv_inds
        .iter()
        .any(|inds| inds.chunks_exact(2).any(|p| p[1] >= local_width));
    if lands_in_work && work.is_none() {
        return Err(FrontError::MissingUpdate {
            node: node.index(),
        });
    }

    for (inds, vals) in comm_meta.child_recv_inds.iter().zip(values) {
        for (pair, value) in inds.chunks_exact(2).zip(vals) {
            let (i_loc, j_loc) = (pair[0], pair[1]);
            if j_loc < local_width {
                l2d.update_local(i_loc, j_loc, value);
            } else if let Some(work) = work.as_mut() {
                let i = work.local_row(l2d.global_row(i_loc) - size);
                let j = work.local_col(l2d.global_col(j_loc) - size);
                work.update_local(i, j, value);
            }
        }
    }
    Ok(())
}
