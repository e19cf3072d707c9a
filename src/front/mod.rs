//! Frontal tree: the dense blocks that mirror a [`SymbolicTree`].
//!
//! A [`FrontTree`] is an arena sharing its [`NodeId`]s with the symbolic tree it
//! was pulled from. Local nodes hold a [`Front`] with a plain column-major
//! block; distributed nodes hold a [`DistFront`] whose block is spread over the
//! node's process grid.
//!
//! Both kinds store `L`, the `(size + lower_size) × size` trapezoid whose top
//! square is the diagonal block and whose bottom rows are the fill-in block,
//! plus an optional `work` block: the Schur-complement update handed to the
//! parent. `work` and [`CommMeta`] are scratch state for one factorization
//! pass.

pub mod stats;

use crate::data::dense::DenseMatrix;
use crate::data::dist_matrix::DistMatrix;
use crate::data::scalar::Scalar;
use crate::front_error::FrontError;
use crate::topology::tree::{NodeId, NodeKind, SymbolicTree};

/// Storage convention of a front.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum FrontType {
    /// Lower trapezoid of a symmetric or Hermitian front, 2D distributed.
    #[default]
    Symm2d,
    /// No symmetry assumed.
    Generic,
}

/// Dense front of a process-local node.
#[derive(Clone, Debug, PartialEq)]
pub struct Front<F> {
    pub l: DenseMatrix<F>,
    pub work: Option<DenseMatrix<F>>,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
    pub ty: FrontType,
    pub is_hermitian: bool,
}

/// What hangs below a distributed front.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrontLink {
    /// Another distributed front, on half of this team.
    Child(NodeId),
    /// The root of this process' local subtree.
    Duplicate(NodeId),
}

impl FrontLink {
    #[inline]
    pub fn node(self) -> NodeId {
        match self {
            FrontLink::Child(id) | FrontLink::Duplicate(id) => id,
        }
    }
}

/// Plan for moving a child's update into this front.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommMeta {
    /// Number of update entries this process sends to each member of the team.
    pub num_child_send_inds: Vec<usize>,
    /// Per source team member, interleaved `(local row, local col)` pairs of
    /// this front receiving its entries. Empty unless requested.
    pub child_recv_inds: Vec<Vec<usize>>,
}

impl CommMeta {
    pub fn clear(&mut self) {
        self.num_child_send_inds.clear();
        self.child_recv_inds.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.num_child_send_inds.is_empty() && self.child_recv_inds.is_empty()
    }

    /// Entries expected from team member `q`.
    pub fn num_recv_from(&self, q: usize) -> usize {
        self.child_recv_inds.get(q).map_or(0, |v| v.len() / 2)
    }
}

/// Front of a node shared by a team of processes.
#[derive(Clone, Debug, PartialEq)]
pub struct DistFront<F> {
    pub l2d: DistMatrix<F>,
    pub link: FrontLink,
    pub parent: Option<NodeId>,
    /// Update block, aligned as the bottom-right block of the full front.
    pub work: Option<DistMatrix<F>>,
    pub comm_meta: CommMeta,
    pub ty: FrontType,
    pub is_hermitian: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FrontNode<F> {
    Local(Front<F>),
    Dist(DistFront<F>),
}

impl<F: Scalar> FrontNode<F> {
    /// Entry `(i, j)` of `L`, if stored on this process.
    pub fn get(&self, i: usize, j: usize) -> Option<F> {
        match self {
            FrontNode::Local(f) => (i < f.l.height() && j < f.l.width()).then(|| f.l.get(i, j)),
            FrontNode::Dist(f) => (i < f.l2d.height() && j < f.l2d.width())
                .then(|| f.l2d.get(i, j))
                .flatten(),
        }
    }

    /// `(height, width)` of `L`.
    pub fn shape(&self) -> (usize, usize) {
        match self {
            FrontNode::Local(f) => (f.l.height(), f.l.width()),
            FrontNode::Dist(f) => (f.l2d.height(), f.l2d.width()),
        }
    }

    pub fn is_hermitian(&self) -> bool {
        match self {
            FrontNode::Local(f) => f.is_hermitian,
            FrontNode::Dist(f) => f.is_hermitian,
        }
    }

    fn set_flags(&mut self, ty: FrontType, is_hermitian: bool) {
        match self {
            FrontNode::Local(f) => {
                f.ty = ty;
                f.is_hermitian = is_hermitian;
            }
            FrontNode::Dist(f) => {
                f.ty = ty;
                f.is_hermitian = is_hermitian;
            }
        }
    }

    /// Zero `L`, keeping its shape and distribution.
    pub fn fill_zero(&mut self) {
        match self {
            FrontNode::Local(f) => f.l.fill_zero(),
            FrontNode::Dist(f) => f.l2d.fill_zero(),
        }
    }
}

/// Arena of fronts, indexed like the symbolic tree it mirrors.
#[derive(Clone, Debug, PartialEq)]
pub struct FrontTree<F> {
    nodes: Vec<FrontNode<F>>,
    root: NodeId,
}

impl<F: Scalar> FrontTree<F> {
    /// Zero fronts with the shapes and distributions of `tree`.
    pub fn zeros(tree: &SymbolicTree) -> Self {
        let nodes = tree
            .nodes()
            .map(|(_, node)| {
                let info = &node.info;
                match &node.kind {
                    NodeKind::Local { children } => FrontNode::Local(Front {
                        l: DenseMatrix::zeros(info.front_height(), info.size),
                        work: None,
                        children: children.clone(),
                        parent: node.parent,
                        ty: FrontType::default(),
                        is_hermitian: false,
                    }),
                    NodeKind::Distributed(link) => {
                        let child_is_dist = tree.node(link.child).is_distributed();
                        FrontNode::Dist(DistFront {
                            l2d: DistMatrix::zeros(link.grid.clone(), info.front_height(), info.size),
                            link: if child_is_dist {
                                FrontLink::Child(link.child)
                            } else {
                                FrontLink::Duplicate(link.child)
                            },
                            parent: node.parent,
                            work: None,
                            comm_meta: CommMeta::default(),
                            ty: FrontType::default(),
                            is_hermitian: false,
                        })
                    }
                }
            })
            .collect();
        Self {
            nodes,
            root: tree.root(),
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
    pub fn node(&self, id: NodeId) -> &FrontNode<F> {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> &mut FrontNode<F> {
        &mut self.nodes[id.index()]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &FrontNode<F>)> {
        self.nodes.iter().enumerate().map(|(k, n)| (NodeId::new(k), n))
    }

    pub fn front(&self, id: NodeId) -> Option<&Front<F>> {
        match self.node(id) {
            FrontNode::Local(f) => Some(f),
            FrontNode::Dist(_) => None,
        }
    }

    pub fn front_mut(&mut self, id: NodeId) -> Option<&mut Front<F>> {
        match self.node_mut(id) {
            FrontNode::Local(f) => Some(f),
            FrontNode::Dist(_) => None,
        }
    }

    pub fn dist_front(&self, id: NodeId) -> Option<&DistFront<F>> {
        match self.node(id) {
            FrontNode::Dist(f) => Some(f),
            FrontNode::Local(_) => None,
        }
    }

    pub fn dist_front_mut(&mut self, id: NodeId) -> Option<&mut DistFront<F>> {
        match self.node_mut(id) {
            FrontNode::Dist(f) => Some(f),
            FrontNode::Local(_) => None,
        }
    }

    /// Conjugation convention of the tree, taken from the root front.
    pub fn is_hermitian(&self) -> bool {
        self.nodes
            .get(self.root.index())
            .is_some_and(FrontNode::is_hermitian)
    }

    /// Tag every front with a storage convention.
    pub fn set_flags(&mut self, ty: FrontType, is_hermitian: bool) {
        for node in &mut self.nodes {
            node.set_flags(ty, is_hermitian);
        }
    }

    /// Zero every `L`, keeping shapes.
    pub fn fill_zero(&mut self) {
        for node in &mut self.nodes {
            node.fill_zero();
        }
    }

    /// Check that this tree mirrors `tree` node for node.
    pub fn check_shape(&self, tree: &SymbolicTree) -> Result<(), FrontError> {
        if self.nodes.len() != tree.len() || self.root != tree.root() {
            return Err(FrontError::TreeShapeMismatch {
                node: self.root.index(),
                reason: "different number of nodes or root",
            });
        }
        for (id, sym) in tree.nodes() {
            let fail = |reason| FrontError::TreeShapeMismatch {
                node: id.index(),
                reason,
            };
            let front = self.node(id);
            if front.shape() != (sym.info.front_height(), sym.info.size) {
                return Err(fail("front shape differs from node info"));
            }
            match (front, &sym.kind) {
                (FrontNode::Local(f), NodeKind::Local { children }) => {
                    if &f.children != children || f.parent != sym.parent {
                        return Err(fail("local front linkage differs"));
                    }
                }
                (FrontNode::Dist(f), NodeKind::Distributed(link)) => {
                    if f.link.node() != link.child || f.parent != sym.parent {
                        return Err(fail("distributed front linkage differs"));
                    }
                    if f.l2d.grid() != &link.grid {
                        return Err(fail("distributed front lives on another grid"));
                    }
                }
                _ => return Err(fail("local and distributed nodes swapped")),
            }
        }
        Ok(())
    }
}
