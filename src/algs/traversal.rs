//! Tree walks shared by the exchange routines.
//!
//! Sender and receiver never exchange offsets: both sides derive them by
//! walking the tree in the same order. The walks live here, once, so that a
//! counting pass and the packing or unpacking pass that follows cannot drift
//! apart. All walks are postorder: children before parents.

use crate::data::scalar::Scalar;
use crate::debug_invariants::check_cursor;
use crate::front::{FrontNode, FrontTree};
use crate::front_error::FrontError;
use crate::topology::tree::{NodeId, NodeKind, SymbolicTree};

/// Per-rank write positions into a buffer packed by destination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RankCursor {
    start: Vec<usize>,
    pos: Vec<usize>,
}

impl RankCursor {
    /// Cursor at the given per-rank offsets.
    pub fn new(offs: Vec<usize>) -> Self {
        Self {
            start: offs.clone(),
            pos: offs,
        }
    }

    /// Current position for rank `q`, then advance it by one.
    #[inline]
    pub fn next(&mut self, q: usize) -> usize {
        let at = self.pos[q];
        self.pos[q] += 1;
        at
    }

    /// Current position for rank `q`, then advance it by `n`.
    #[inline]
    pub fn advance(&mut self, q: usize, n: usize) -> usize {
        let at = self.pos[q];
        self.pos[q] += n;
        at
    }

    #[inline]
    pub fn position(&self, q: usize) -> usize {
        self.pos[q]
    }

    /// Every rank must have consumed exactly `sizes[q]` slots.
    pub fn check_consumed(&self, stage: &'static str, sizes: &[usize]) -> Result<(), FrontError> {
        for (q, &size) in sizes.iter().enumerate() {
            check_cursor(stage, q, self.start[q] + size, self.pos[q])?;
        }
        Ok(())
    }
}

/// One separator column this process is responsible for filling.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OwnedColumn {
    pub node: NodeId,
    /// Column of the front.
    pub t: usize,
    /// Original index of the matrix row feeding that column.
    pub orig: usize,
}

/// Columns this process fills, in postorder.
///
/// A local node owns all of its columns. A distributed node owns the columns
/// of its grid column, `t = grid.col() + k * grid.width()`: every process of a
/// grid column asks for the same rows, and each keeps the entries it stores.
pub fn owned_columns(tree: &SymbolicTree) -> Vec<OwnedColumn> {
    let mut out = Vec::new();
    for id in tree.postorder() {
        let node = tree.node(id);
        match &node.kind {
            NodeKind::Local { .. } => {
                out.extend(node.inds.iter().enumerate().map(|(t, &orig)| OwnedColumn {
                    node: id,
                    t,
                    orig,
                }));
            }
            NodeKind::Distributed(link) => {
                let (shift, stride) = (link.grid.col(), link.grid.width());
                out.extend(
                    (shift..node.inds.len())
                        .step_by(stride)
                        .map(|t| OwnedColumn {
                            node: id,
                            t,
                            orig: node.inds[t],
                        }),
                );
            }
        }
    }
    out
}

/// Visit every factor entry stored on this process as `(row, col, value)` in
/// reordered numbering: the lower triangle of each diagonal block, then the
/// full fill-in block.
pub fn for_each_factor_entry<F, V>(tree: &SymbolicTree, fronts: &FrontTree<F>, mut visit: V)
where
    F: Scalar,
    V: FnMut(usize, usize, F),
{
    for id in tree.postorder() {
        let info = tree.info(id);
        let (off, size) = (info.off, info.size);
        match fronts.node(id) {
            FrontNode::Local(front) => {
                for s in 0..size {
                    for t in 0..=s {
                        visit(off + s, off + t, front.l.get(s, t));
                    }
                }
                for (s, &i) in info.lower_struct.iter().enumerate() {
                    for t in 0..size {
                        visit(i, off + t, front.l.get(size + s, t));
                    }
                }
            }
            FrontNode::Dist(front) => {
                let l = &front.l2d;
                let top = l.local_rows_before(size);
                for s_loc in 0..l.local_height() {
                    let s = l.global_row(s_loc);
                    let i = if s_loc < top {
                        off + s
                    } else {
                        info.lower_struct[s - size]
                    };
                    for t_loc in 0..l.local_width() {
                        let t = l.global_col(t_loc);
                        if s_loc >= top || t <= s {
                            visit(i, off + t, l.get_local(s_loc, t_loc));
                        }
                    }
                }
            }
        }
    }
}

/// Visit the lower triangle of the update block of `child` as
/// `(i_child, j_child, value)` in update-block coordinates: local columns
/// outer, local rows inner.
///
/// This is the order in which update entries are counted and packed for the
/// parent; the receiver reconstructs it independently.
pub fn for_each_update_entry<F, V>(child: NodeId, front: &FrontNode<F>, mut visit: V) -> Result<(), FrontError>
where
    F: Scalar,
    V: FnMut(usize, usize, F),
{
    let missing = || FrontError::MissingUpdate {
        node: child.index(),
    };
    match front {
        FrontNode::Local(f) => {
            let work = f.work.as_ref().ok_or_else(missing)?;
            for j in 0..work.width() {
                for i in j..work.height() {
                    visit(i, j, work.get(i, j));
                }
            }
        }
        FrontNode::Dist(f) => {
            let work = f.work.as_ref().ok_or_else(missing)?;
            for j_loc in 0..work.local_width() {
                let j = work.global_col(j_loc);
                for i_loc in work.local_rows_before(j)..work.local_height() {
                    visit(work.global_row(i_loc), j, work.get_local(i_loc, j_loc));
                }
            }
        }
    }
    Ok(())
}
