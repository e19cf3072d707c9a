//! Symbolic analysis: from a separator tree to the per-process elimination tree.
//!
//! Choosing separators is left to the caller, who hands in a replicated
//! [`Dissection`]: a tree whose nodes list the original indices they eliminate.
//! [`analyze`] numbers the indices in postorder, computes every node's lower
//! structure from the matrix pattern, and distributes the top of the tree over
//! teams by recursive halving: the left child gets the first `p / 2` processes,
//! the right child the rest, until a team has one process and the remaining
//! subtree becomes local.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::data::dist_map::DistMap;
use crate::front_error::FrontError;
use crate::topology::grid::{Grid, Team};
use crate::topology::tree::{DistLink, NodeId, NodeInfo, NodeKind, SymbolicNode, SymbolicTree};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DissectionNode {
    /// Original indices eliminated at this node, in elimination order.
    pub inds: Vec<usize>,
    /// Child nodes; a node that is split across processes needs exactly two.
    pub children: Vec<usize>,
}

/// Replicated separator tree over original indices `0..n`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dissection {
    pub nodes: Vec<DissectionNode>,
    pub root: usize,
}

impl Dissection {
    /// The trivial dissection: one node eliminating `0..n` in order.
    pub fn single(n: usize) -> Self {
        Self {
            nodes: vec![DissectionNode {
                inds: (0..n).collect(),
                children: Vec::new(),
            }],
            root: 0,
        }
    }

    /// Children before parents.
    pub fn postorder(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![(self.root, false)];
        while let Some((d, expanded)) = stack.pop() {
            if expanded {
                out.push(d);
                continue;
            }
            if d >= seen.len() || std::mem::replace(&mut seen[d], true) {
                continue;
            }
            stack.push((d, true));
            for &c in self.nodes[d].children.iter().rev() {
                stack.push((c, false));
            }
        }
        out
    }
}

/// Result of [`analyze`] on one process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolicAnalysis {
    pub tree: SymbolicTree,
    /// `perm[i]` is the elimination position of original index `i`.
    pub perm: Vec<usize>,
    rank: usize,
    comm_size: usize,
}

impl SymbolicAnalysis {
    /// The reordering as a distributed map over the world it was analysed for.
    pub fn reordering(&self) -> DistMap {
        DistMap::from_global(&self.perm, self.rank, self.comm_size)
    }
}

/// Symmetrised row pattern of an `n × n` matrix from its nonzero coordinates.
pub fn adjacency_from_entries(
    n: usize,
    entries: impl IntoIterator<Item = (usize, usize)>,
) -> Vec<Vec<usize>> {
    let mut adj = vec![Vec::new(); n];
    for (i, j) in entries {
        if i < n && j < n {
            adj[i].push(j);
            adj[j].push(i);
        }
    }
    for row in &mut adj {
        row.sort_unstable();
        row.dedup();
    }
    adj
}

/// Per-node data computed once over the whole replicated dissection.
struct Replicated {
    infos: Vec<NodeInfo>,
    /// `child_rel_inds` of every child, indexed by dissection node.
    rel_inds: Vec<Vec<usize>>,
}

fn replicated_infos(
    dissection: &Dissection,
    order: &[usize],
    adjacency: &[Vec<usize>],
    perm: &[usize],
) -> Result<Replicated, FrontError> {
    let mut infos = vec![NodeInfo::default(); dissection.nodes.len()];
    let mut rel_inds = vec![Vec::new(); dissection.nodes.len()];
    let mut off = 0;
    for &d in order {
        let node = &dissection.nodes[d];
        let size = node.inds.len();
        let end = off + size;

        let orig: Vec<usize> = node
            .inds
            .iter()
            .flat_map(|&i| adjacency[i].iter().map(|&j| perm[j]))
            .filter(|&x| x >= end)
            .sorted_unstable()
            .dedup()
            .collect();

        let mut lower = orig.clone();
        for &c in &node.children {
            for &x in &infos[c].lower_struct {
                if x < off {
                    return Err(FrontError::TreeShapeMismatch {
                        node: c,
                        reason: "dissection couples sibling subtrees",
                    });
                }
                if x >= end {
                    lower.push(x);
                }
            }
        }
        lower.sort_unstable();
        lower.dedup();

        let row_of = |x: usize| -> usize {
            if x < end {
                x - off
            } else {
                size + lower.partition_point(|&y| y < x)
            }
        };
        for &c in &node.children {
            rel_inds[c] = infos[c].lower_struct.iter().map(|&x| row_of(x)).collect();
        }
        let orig_rel = orig.iter().map(|&x| row_of(x)).collect();

        infos[d] = NodeInfo {
            size,
            off,
            lower_struct: lower,
            orig_lower_struct: orig,
            orig_lower_rel_inds: orig_rel,
        };
        off = end;
    }
    Ok(Replicated { infos, rel_inds })
}

struct Builder<'a> {
    dissection: &'a Dissection,
    rep: &'a Replicated,
    nodes: Vec<SymbolicNode>,
}

impl Builder<'_> {
    fn push(&mut self, d: usize, parent: Option<NodeId>) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(SymbolicNode {
            parent,
            inds: self.dissection.nodes[d].inds.clone(),
            info: self.rep.infos[d].clone(),
            kind: NodeKind::Local {
                children: Vec::new(),
            },
        });
        id
    }

    fn local(&mut self, d: usize, parent: Option<NodeId>) -> NodeId {
        let id = self.push(d, parent);
        let dissection = self.dissection;
        let children = dissection.nodes[d]
            .children
            .iter()
            .map(|&c| self.local(c, Some(id)))
            .collect();
        self.nodes[id.index()].kind = NodeKind::Local { children };
        id
    }

    fn distributed(&mut self, d: usize, team: Team, parent: Option<NodeId>) -> Result<NodeId, FrontError> {
        if team.size() == 1 {
            return Ok(self.local(d, parent));
        }
        let [left, right] = match self.dissection.nodes[d].children.as_slice() {
            &[l, r] => [l, r],
            _ => {
                return Err(FrontError::TreeShapeMismatch {
                    node: d,
                    reason: "a node shared by several processes needs exactly two children",
                });
            }
        };
        let id = self.push(d, parent);
        let left_size = team.size() / 2;
        let child_team_sizes = [left_size, team.size() - left_size];
        let grid = Grid::new(team);
        let (child_team, child_on_left) = grid.team().split(left_size);
        let child_d = if child_on_left { left } else { right };
        let child = self.distributed(child_d, child_team, Some(id))?;
        self.nodes[id.index()].kind = NodeKind::Distributed(DistLink {
            grid,
            child,
            child_on_left,
            child_rel_inds: [self.rep.rel_inds[left].clone(), self.rep.rel_inds[right].clone()],
            child_sizes: [self.rep.infos[left].size, self.rep.infos[right].size],
            child_team_sizes,
        });
        Ok(id)
    }
}

/// Build the elimination tree seen by `rank` of `comm_size` processes.
///
/// `adjacency[i]` lists the columns of row `i` of the matrix pattern; it should
/// be symmetric (see [`adjacency_from_entries`]). Every index `0..n` must be
/// eliminated by exactly one dissection node.
pub fn analyze(
    dissection: &Dissection,
    adjacency: &[Vec<usize>],
    rank: usize,
    comm_size: usize,
) -> Result<SymbolicAnalysis, FrontError> {
    let t0 = Instant::now();
    let n = adjacency.len();
    let order = dissection.postorder();
    if order.len() != dissection.nodes.len() {
        return Err(FrontError::TreeShapeMismatch {
            node: dissection.root,
            reason: "dissection has unreachable or shared nodes",
        });
    }

    let mut perm = vec![usize::MAX; n];
    let mut next = 0;
    for &d in &order {
        for &i in &dissection.nodes[d].inds {
            if i >= n {
                return Err(FrontError::IndexOutOfRange { index: i, len: n });
            }
            if perm[i] != usize::MAX {
                return Err(FrontError::TreeShapeMismatch {
                    node: d,
                    reason: "index eliminated twice",
                });
            }
            perm[i] = next;
            next += 1;
        }
    }
    if next != n {
        return Err(FrontError::TreeShapeMismatch {
            node: dissection.root,
            reason: "dissection does not cover every index",
        });
    }

    if let Some(&bad) = adjacency.iter().flatten().find(|&&j| j >= n) {
        return Err(FrontError::IndexOutOfRange { index: bad, len: n });
    }
    let rep = replicated_infos(dissection, &order, adjacency, &perm)?;
    let mut builder = Builder {
        dissection,
        rep: &rep,
        nodes: Vec::new(),
    };
    let root = builder.distributed(dissection.root, Team::world(comm_size.max(1), rank), None)?;
    let tree = SymbolicTree::from_nodes(builder.nodes, root)?;

    let fill: usize = rep.infos.iter().map(NodeInfo::lower_size).sum();
    log::debug!(
        "analyze: rank {rank} holds {} of {} nodes, total lower structure {fill}, took {:?}",
        tree.len(),
        dissection.nodes.len(),
        t0.elapsed()
    );
    Ok(SymbolicAnalysis {
        tree,
        perm,
        rank,
        comm_size: comm_size.max(1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Path 0-1-2-3-4 split at 2.
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
        let adj = adjacency_from_entries(5, (0..4).map(|i| (i, i + 1)));
        (d, adj)
    }

    #[test]
    fn serial_structure() {
        let (d, adj) = path();
        let an = analyze(&d, &adj, 0, 1).unwrap();
        assert_eq!(an.perm, vec![0, 1, 4, 2, 3]);
        let tree = &an.tree;
        let root = tree.node(tree.root());
        assert!(!root.is_distributed());
        assert_eq!(root.info.off, 4);
        let kids = root.children();
        assert_eq!(kids.len(), 2);
        // {0,1}: index 1 couples with 2, whose position is 4
        let left = tree.info(kids[0]);
        assert_eq!(left.lower_struct, vec![4]);
        assert_eq!(left.orig_lower_rel_inds, vec![2]);
        // {3,4}: index 3 couples with 2
        let right = tree.info(kids[1]);
        assert_eq!((right.off, right.lower_struct.clone()), (2, vec![4]));
    }

    #[test]
    fn two_ranks_split_the_root() {
        let (d, adj) = path();
        for rank in 0..2 {
            let an = analyze(&d, &adj, rank, 2).unwrap();
            let root = an.tree.node(an.tree.root());
            let link = root.dist_link().unwrap();
            assert_eq!(link.child_on_left, rank == 0);
            assert_eq!(link.child_team_sizes, [1, 1]);
            assert_eq!(link.child_sizes, [2, 2]);
            assert_eq!(link.child_rel_inds, [vec![0], vec![0]]);
            assert_eq!(an.tree.len(), 2);
            assert!(!an.tree.node(link.child).is_distributed());
        }
    }

    #[test]
    fn leaf_on_a_team_is_rejected() {
        let d = Dissection::single(3);
        let adj = vec![Vec::new(); 3];
        assert!(matches!(
            analyze(&d, &adj, 0, 2),
            Err(FrontError::TreeShapeMismatch { .. })
        ));
        assert!(analyze(&d, &adj, 0, 1).is_ok());
    }
}
