//! Planning the child update exchange of a distributed front.
//!
//! Before a child's update block can be added into its parent, every process
//! of the parent team needs two things: how many update entries it sends to
//! each member (`num_child_send_inds`), and where in its local part of the
//! parent front the entries it receives from each member land
//! (`child_recv_inds`). Both are derived locally, without communication, from
//! the relative indices and grid shapes of the two children.

use crate::algs::traversal::for_each_update_entry;
use crate::data::dist_matrix::DistMatrix;
use crate::data::scalar::Scalar;
use crate::front::{CommMeta, FrontNode, FrontTree};
use crate::front_error::FrontError;
use crate::topology::grid::Grid;
use crate::topology::tree::{DistLink, NodeId, NodeKind, SymbolicTree};

/// Check that `front` carries an update block of `lower × lower`.
pub(crate) fn check_update_shape<F: Scalar>(
    child: NodeId,
    front: &FrontNode<F>,
    lower: usize,
) -> Result<(), FrontError> {
    let dims = match front {
        FrontNode::Local(f) => f.work.as_ref().map(|w| (w.height(), w.width())),
        FrontNode::Dist(f) => f.work.as_ref().map(|w| (w.height(), w.width())),
    };
    match dims {
        None => Err(FrontError::MissingUpdate {
            node: child.index(),
        }),
        Some(d) if d == (lower, lower) => Ok(()),
        Some(_) => Err(FrontError::TreeShapeMismatch {
            node: child.index(),
            reason: "update block does not match the lower structure",
        }),
    }
}

/// Rank of this process inside the team of the child it holds.
fn child_team_rank(tree: &SymbolicTree, link: &DistLink) -> usize {
    tree.node(link.child)
        .dist_link()
        .map_or(0, |child| child.grid.team().rank())
}

/// Sizes and parent-team offsets of the `[left, right]` child teams.
///
/// The team holding this process starts at offset zero exactly when this
/// process has the same rank in the child team as in the parent team.
fn child_team_layout(link: &DistLink, child_team_rank: usize) -> ([usize; 2], [usize; 2]) {
    let team_size = link.grid.size();
    let team_rank = link.grid.team().rank();
    let child_team_size = link.child_team_sizes[link.side()];
    let left = if link.child_on_left {
        child_team_size
    } else {
        team_size - child_team_size
    };
    let sizes = [left, team_size - left];
    let in_first_team = child_team_rank == team_rank;
    let left_is_first = link.child_on_left == in_first_team;
    let offs = if left_is_first {
        [0, sizes[0]]
    } else {
        [sizes[1], 0]
    };
    (sizes, offs)
}

/// Number of update entries this process sends to each member of the parent
/// team, walking the child's update block in packing order.
fn child_send_counts<F: Scalar>(
    l2d: &DistMatrix<F>,
    rel: &[usize],
    child: NodeId,
    child_front: &FrontNode<F>,
) -> Result<Vec<usize>, FrontError> {
    check_update_shape(child, child_front, rel.len())?;
    let mut counts = vec![0usize; l2d.dist_size()];
    for_each_update_entry(child, child_front, |i_child, j_child, _| {
        counts[l2d.owner(rel[i_child], rel[j_child])] += 1;
    })?;
    Ok(counts)
}

/// Interleaved `(local row, local col)` destinations of the entries each
/// parent-team member sends to this process, in the sender's packing order.
///
/// Local columns at or beyond `l2d.local_width()` address the update block of
/// the parent.
fn child_recv_inds<F: Scalar>(
    node: NodeId,
    l2d: &DistMatrix<F>,
    link: &DistLink,
    child_team_rank: usize,
) -> Result<Vec<Vec<usize>>, FrontError> {
    let (team_sizes, team_offs) = child_team_layout(link, child_team_rank);
    let mut recv = vec![Vec::new(); l2d.dist_size()];
    for c in 0..2 {
        let rel = &link.child_rel_inds[c];
        let child_size = link.child_sizes[c];
        let (h, w) = Grid::default_shape(team_sizes[c]);

        #[cfg(any(debug_assertions, feature = "check-invariants"))]
        if h * w != team_sizes[c] {
            return Err(FrontError::GridMismatch {
                side: if c == 0 { "left" } else { "right" },
                expected: team_sizes[c],
                got: h * w,
            });
        }

        let row_inds: Vec<usize> = (0..rel.len())
            .filter(|&i| l2d.is_local_row(rel[i]))
            .collect();
        let col_inds = (0..rel.len()).filter(|&j| l2d.is_local_col(rel[j]));
        for j_child in col_inds {
            let j_loc = l2d.local_col(rel[j_child]);
            let child_col = (j_child + child_size) % w;
            let start = row_inds.partition_point(|&i| i < j_child);
            for &i_child in &row_inds[start..] {
                let i_loc = l2d.local_row(rel[i_child]);
                let child_row = (i_child + child_size) % h;
                let q = team_offs[c] + child_row + child_col * h;
                recv[q].extend([i_loc, j_loc]);
            }
        }
    }
    log::trace!(
        "comm meta of node {node}: receiving {:?}",
        recv.iter().map(|v| v.len() / 2).collect::<Vec<_>>()
    );
    Ok(recv)
}

impl<F: Scalar> FrontTree<F> {
    /// Recompute the update exchange plan of distributed node `node`.
    ///
    /// The child's update block must be allocated (see
    /// [`FrontTree::init_work`]). Receive indices are only computed on
    /// request. Local nodes carry no plan and are left untouched.
    pub fn compute_comm_meta(
        &mut self,
        tree: &SymbolicTree,
        node: NodeId,
        compute_recv_inds: bool,
    ) -> Result<(), FrontError> {
        let link = match &tree.node(node).kind {
            NodeKind::Local { .. } => return Ok(()),
            NodeKind::Distributed(link) => link,
        };
        let not_dist = || FrontError::TreeShapeMismatch {
            node: node.index(),
            reason: "distributed node without a distributed front",
        };
        self.dist_front_mut(node).ok_or_else(not_dist)?.comm_meta.clear();

        let parent = self.dist_front(node).ok_or_else(not_dist)?;
        let num_child_send_inds = child_send_counts(
            &parent.l2d,
            link.my_child_rel_inds(),
            link.child,
            self.node(link.child),
        )?;
        let child_recv_inds = if compute_recv_inds {
            child_recv_inds(node, &parent.l2d, link, child_team_rank(tree, link))?
        } else {
            Vec::new()
        };
        log::trace!("comm meta of node {node}: sending {num_child_send_inds:?}");

        self.dist_front_mut(node).ok_or_else(not_dist)?.comm_meta = CommMeta {
            num_child_send_inds,
            child_recv_inds,
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::analysis::{Dissection, DissectionNode, adjacency_from_entries, analyze};

    fn path() -> (Dissection, Vec<Vec<usize>>) {
        let d = Dissection {
            nodes: vec![
                DissectionNode {
                    inds: vec![2],
                    children: vec![1, 2],
                },
                DissectionNode {
                    inds: vec![0, 1],
                    children: vec![],
                },
                DissectionNode {
                    inds: vec![3, 4],
                    children: vec![],
                },
            ],
            root: 0,
        };
        (d, adjacency_from_entries(5, (0..4).map(|i| (i, i + 1))))
    }

    #[test]
    fn local_node_has_no_plan() {
        let tree = SymbolicTree::single(vec![0, 1]);
        let mut fronts = FrontTree::<f64>::zeros(&tree);
        let root = fronts.root();
        fronts.compute_comm_meta(&tree, root, true).unwrap();
    }

    #[test]
    fn missing_child_update_is_reported() {
        let (d, adj) = path();
        let an = analyze(&d, &adj, 0, 2).unwrap();
        let mut fronts = FrontTree::<f64>::zeros(&an.tree);
        let root = an.tree.root();
        let child = an.tree.node(root).children()[0];
        assert_eq!(
            fronts.compute_comm_meta(&an.tree, root, false),
            Err(FrontError::MissingUpdate {
                node: child.index()
            })
        );
    }

    #[test]
    fn send_counts_match_receive_plans() {
        let (d, adj) = path();
        let metas: Vec<CommMeta> = (0..2)
            .map(|rank| {
                let an = analyze(&d, &adj, rank, 2).unwrap();
                let mut fronts = FrontTree::<f64>::zeros(&an.tree);
                let root = an.tree.root();
                let child = an.tree.node(root).children()[0];
                fronts.init_work(&an.tree, child).unwrap();
                fronts.compute_comm_meta(&an.tree, root, true).unwrap();
                fronts.dist_front(root).unwrap().comm_meta.clone()
            })
            .collect();
        // the 1 × 1 root lives on rank 0; both leaves send it their one entry
        assert_eq!(metas[0].num_child_send_inds, vec![1, 0]);
        assert_eq!(metas[1].num_child_send_inds, vec![1, 0]);
        assert_eq!(metas[0].child_recv_inds, vec![vec![0, 0], vec![0, 0]]);
        for (r, meta) in metas.iter().enumerate() {
            for (q, other) in metas.iter().enumerate() {
                assert_eq!(meta.num_child_send_inds[q], other.num_recv_from(r));
            }
        }
    }
}
