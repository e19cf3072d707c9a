//! Symbolic elimination tree, as seen from one process.
//!
//! The tree is an arena of [`SymbolicNode`]s addressed by [`NodeId`]. Its top
//! part is *distributed*: every node there is shared by a team of processes
//! arranged on a [`Grid`] and has exactly one child in this process' view,
//! the half of the team this process went to. Once a team shrinks to a single
//! process the remaining subtree is *local* and may branch freely. The first
//! local node below a distributed one is the **duplicate** root.
//!
//! All indices stored here except `inds` are in elimination (reordered)
//! numbering. `inds` keeps the original row indices of the separator so that
//! matrix rows can be requested from their owners.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::debug_invariants::DebugInvariants;
use crate::front_error::FrontError;
use crate::topology::grid::Grid;

/// Handle of a node in a [`SymbolicTree`] (and in the frontal tree pulled from it).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct NodeId(usize);

impl NodeId {
    #[inline]
    pub const fn new(raw: usize) -> Self {
        NodeId(raw)
    }

    /// Position in the arena.
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeId").field(&self.0).finish()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Symbolic factorization data of one node.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Dimension of the diagonal block.
    pub size: usize,
    /// First reordered index of the separator.
    pub off: usize,
    /// Rows of the front below the diagonal block, sorted ascending.
    pub lower_struct: Vec<usize>,
    /// The part of `lower_struct` coming directly from the matrix pattern,
    /// sorted ascending.
    pub orig_lower_struct: Vec<usize>,
    /// Front row of every `orig_lower_struct` entry.
    pub orig_lower_rel_inds: Vec<usize>,
}

impl NodeInfo {
    #[inline]
    pub fn lower_size(&self) -> usize {
        self.lower_struct.len()
    }

    /// Height of the front: diagonal block plus lower structure.
    #[inline]
    pub fn front_height(&self) -> usize {
        self.size + self.lower_struct.len()
    }

    /// Front row holding reordered index `target`, or `None` when the target
    /// lies before the diagonal block or outside the original lower structure.
    pub fn orig_front_row(&self, target: usize) -> Option<usize> {
        if target < self.off {
            None
        } else if target < self.off + self.size {
            Some(target - self.off)
        } else {
            self.orig_lower_struct
                .binary_search(&target)
                .ok()
                .map(|k| self.orig_lower_rel_inds[k])
        }
    }
}

/// Linkage of a distributed node to its two (symbolic) children.
///
/// Arrays indexed by `[left, right]`; this process only holds the child on
/// the side given by `child_on_left`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistLink {
    pub grid: Grid,
    pub child: NodeId,
    pub child_on_left: bool,
    /// Front row of this node for each lower-structure entry of each child.
    pub child_rel_inds: [Vec<usize>; 2],
    /// Diagonal block sizes of the children.
    pub child_sizes: [usize; 2],
    /// Team sizes of the children; they add up to this node's team size.
    pub child_team_sizes: [usize; 2],
}

impl DistLink {
    /// Index into the `[left, right]` arrays of the child held by this process.
    #[inline]
    pub fn side(&self) -> usize {
        if self.child_on_left { 0 } else { 1 }
    }

    /// `child_rel_inds` of the child held by this process.
    #[inline]
    pub fn my_child_rel_inds(&self) -> &[usize] {
        &self.child_rel_inds[self.side()]
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Node of a process-local subtree.
    Local { children: Vec<NodeId> },
    /// Node shared by a team of processes.
    Distributed(DistLink),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolicNode {
    pub parent: Option<NodeId>,
    /// Original indices of the separator, in elimination order.
    pub inds: Vec<usize>,
    pub info: NodeInfo,
    pub kind: NodeKind,
}

impl SymbolicNode {
    #[inline]
    pub fn is_distributed(&self) -> bool {
        matches!(self.kind, NodeKind::Distributed(_))
    }

    /// Children held by this process, in elimination order.
    pub fn children(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Local { children } => children,
            NodeKind::Distributed(link) => std::slice::from_ref(&link.child),
        }
    }

    pub fn dist_link(&self) -> Option<&DistLink> {
        match &self.kind {
            NodeKind::Distributed(link) => Some(link),
            NodeKind::Local { .. } => None,
        }
    }
}

/// Arena-backed elimination tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolicTree {
    nodes: Vec<SymbolicNode>,
    root: NodeId,
}

impl SymbolicTree {
    /// Assemble a tree from an arena; the structure is validated.
    pub fn from_nodes(nodes: Vec<SymbolicNode>, root: NodeId) -> Result<Self, FrontError> {
        let tree = Self { nodes, root };
        tree.validate_invariants()?;
        Ok(tree)
    }

    /// A single local node covering `inds` with no lower structure.
    pub fn single(inds: Vec<usize>) -> Self {
        let size = inds.len();
        Self {
            nodes: vec![SymbolicNode {
                parent: None,
                inds,
                info: NodeInfo {
                    size,
                    ..NodeInfo::default()
                },
                kind: NodeKind::Local {
                    children: Vec::new(),
                },
            }],
            root: NodeId(0),
        }
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &SymbolicNode {
        &self.nodes[id.0]
    }

    #[inline]
    pub fn info(&self, id: NodeId) -> &NodeInfo {
        &self.nodes[id.0].info
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &SymbolicNode)> {
        self.nodes.iter().enumerate().map(|(k, n)| (NodeId(k), n))
    }

    /// Total dimension covered by the tree: `root.off + root.size`.
    pub fn dimension(&self) -> usize {
        let info = self.info(self.root);
        info.off + info.size
    }

    /// Children before parents, siblings in elimination order.
    pub fn postorder(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![(self.root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                out.push(id);
                continue;
            }
            if id.0 >= seen.len() || std::mem::replace(&mut seen[id.0], true) {
                continue;
            }
            stack.push((id, true));
            for &c in self.node(id).children().iter().rev() {
                stack.push((c, false));
            }
        }
        out
    }

    fn check_node(&self, id: NodeId) -> Result<(), FrontError> {
        let node = self.node(id);
        let info = &node.info;
        let fail = |reason| Err(FrontError::TreeShapeMismatch {
            node: id.0,
            reason,
        });

        if node.inds.len() != info.size {
            return fail("separator length differs from node size");
        }
        if info.lower_struct.windows(2).any(|w| w[0] >= w[1]) {
            return fail("lower structure is not strictly increasing");
        }
        if info.lower_struct.first().is_some_and(|&x| x < info.off + info.size) {
            return fail("lower structure overlaps the diagonal block");
        }
        if info.orig_lower_struct.windows(2).any(|w| w[0] >= w[1]) {
            return fail("original lower structure is not strictly increasing");
        }
        if info.orig_lower_rel_inds.len() != info.orig_lower_struct.len() {
            return fail("original relative indices do not match original lower structure");
        }
        for (&x, &rel) in info.orig_lower_struct.iter().zip(&info.orig_lower_rel_inds) {
            match info.lower_struct.binary_search(&x) {
                Ok(pos) if rel == info.size + pos => {}
                Ok(_) => return fail("original relative index points at the wrong row"),
                Err(_) => return fail("original lower structure is not a subset of the lower structure"),
            }
        }

        for &c in node.children() {
            if c.0 >= self.nodes.len() {
                return fail("child handle out of range");
            }
            if self.node(c).parent != Some(id) {
                return fail("child does not point back to its parent");
            }
        }

        if let NodeKind::Distributed(link) = &node.kind {
            let child = self.info(link.child);
            let rel = link.my_child_rel_inds();
            if rel.len() != child.lower_size() {
                return fail("child relative indices do not cover the child lower structure");
            }
            if rel.iter().any(|&r| r >= info.front_height()) {
                return fail("child relative index outside of the front");
            }
            if link.child_sizes[link.side()] != child.size {
                return fail("recorded child size differs from the child");
            }
            if link.child_team_sizes[0] + link.child_team_sizes[1] != link.grid.size() {
                return fail("child teams do not tile the node team");
            }
        }
        Ok(())
    }
}

impl DebugInvariants for SymbolicTree {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "SymbolicTree");
    }

    fn validate_invariants(&self) -> Result<(), FrontError> {
        if self.root.0 >= self.nodes.len() {
            return Err(FrontError::TreeShapeMismatch {
                node: self.root.0,
                reason: "root handle out of range",
            });
        }
        if self.node(self.root).parent.is_some() {
            return Err(FrontError::TreeShapeMismatch {
                node: self.root.0,
                reason: "root has a parent",
            });
        }
        let order = self.postorder();
        if order.len() != self.nodes.len() {
            return Err(FrontError::TreeShapeMismatch {
                node: self.root.0,
                reason: "arena holds nodes unreachable from the root",
            });
        }
        for id in order {
            self.check_node(id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Vec<SymbolicNode> {
        // leaf {0,1} below root {2}; index 0 couples with 2
        vec![
            SymbolicNode {
                parent: Some(NodeId(1)),
                inds: vec![0, 1],
                info: NodeInfo {
                    size: 2,
                    off: 0,
                    lower_struct: vec![2],
                    orig_lower_struct: vec![2],
                    orig_lower_rel_inds: vec![2],
                },
                kind: NodeKind::Local { children: vec![] },
            },
            SymbolicNode {
                parent: None,
                inds: vec![2],
                info: NodeInfo {
                    size: 1,
                    off: 2,
                    ..NodeInfo::default()
                },
                kind: NodeKind::Local {
                    children: vec![NodeId(0)],
                },
            },
        ]
    }

    #[test]
    fn postorder_visits_children_first() {
        let tree = SymbolicTree::from_nodes(chain(), NodeId(1)).unwrap();
        assert_eq!(tree.postorder(), vec![NodeId(0), NodeId(1)]);
        assert_eq!(tree.dimension(), 3);
        assert_eq!(tree.info(NodeId(0)).orig_front_row(2), Some(2));
        assert_eq!(tree.info(NodeId(0)).orig_front_row(1), Some(1));
    }

    #[test]
    fn broken_back_pointer_is_rejected() {
        let mut nodes = chain();
        nodes[0].parent = None;
        let err = SymbolicTree::from_nodes(nodes, NodeId(1)).unwrap_err();
        assert!(matches!(err, FrontError::TreeShapeMismatch { node: 1, .. }));
    }

    #[test]
    fn bad_relative_index_is_rejected() {
        let mut nodes = chain();
        nodes[0].info.orig_lower_rel_inds = vec![0];
        assert!(SymbolicTree::from_nodes(nodes, NodeId(1)).is_err());
    }
}
