//! Top-level module for elimination-tree topology.
//!
//! This module provides the symbolic side of the multifrontal engine:
//! - Process teams and 2D grids
//! - The per-process elimination tree with its local and distributed nodes
//! - Symbolic analysis turning a separator tree into that elimination tree
//!
//! Most users will call [`analysis::analyze`] once and hand the resulting
//! [`tree::SymbolicTree`] to the frontal algorithms.

pub mod analysis;
pub mod grid;
pub mod tree;

pub use analysis::{Dissection, DissectionNode, SymbolicAnalysis, analyze};
pub use grid::{Grid, Team};
pub use tree::{DistLink, NodeId, NodeInfo, NodeKind, SymbolicNode, SymbolicTree};
