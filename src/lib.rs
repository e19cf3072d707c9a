#![cfg_attr(docsrs, feature(doc_cfg))]
//! # multifront
//!
//! multifront moves data between a distributed sparse matrix and the frontal
//! tree of a multifrontal LDLᵀ / LDLᴴ factorization. It covers the plumbing
//! around the numeric kernels: filling dense fronts from sparse rows, planning
//! and executing the extend-add of update blocks between process teams, and
//! reassembling the factor back into sparse form.
//!
//! ## Features
//! - [`pull`](algs::pull::pull) and [`FrontTree::pull_update`](front::FrontTree::pull_update)
//!   scatter matrix entries into local and 2D-distributed fronts
//! - [`FrontTree::unpack`](front::FrontTree::unpack) gathers factor entries back
//!   into a [`DistSparseMatrix`](data::sparse::DistSparseMatrix)
//! - [`FrontTree::compute_comm_meta`](front::FrontTree::compute_comm_meta) and
//!   [`FrontTree::exchange_child_update`](front::FrontTree::exchange_child_update)
//!   for the child-to-parent update exchange
//! - Storage and flop accounting for performance reporting
//! - Pluggable communication backends (serial, in-process threads, MPI)
//! - A symbolic analysis that turns a caller-supplied dissection into the
//!   per-process elimination tree
//!
//! ## Usage
//! Add `multifront` as a dependency in your `Cargo.toml` and enable features as needed:
//!
//! ```toml
//! [dependencies]
//! multifront = "0.3"
//! # Optional features:
//! # features = ["mpi-support", "rayon", "check-invariants"]
//! ```
//!
//! ## Collectives
//! Every operation taking a communicator is collective: all processes of the
//! world (or of the node's team, for the update exchange) must call it in the
//! same order with the same tag. Each operation has a `_with_tag` variant for
//! callers that interleave exchanges of their own.
//!
//! ## Invariants
//! Internal consistency checks (per-rank cursors, grid shapes) run in debug
//! builds or with `check-invariants`. `strict-invariants` additionally
//! validates the symbolic tree on every entry point.

pub mod algs;
pub mod data;
pub mod debug_invariants;
pub mod front;
pub mod front_error;
pub mod topology;

pub use debug_invariants::DebugInvariants;
pub use front_error::FrontError;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::communicator::{CommTag, Communicator, NoComm, ThreadComm};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::pull::{pull, pull_with_tag};
    pub use crate::data::dense::DenseMatrix;
    pub use crate::data::dist_map::DistMap;
    pub use crate::data::dist_matrix::DistMatrix;
    pub use crate::data::scalar::Scalar;
    pub use crate::data::sparse::DistSparseMatrix;
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::front::{CommMeta, DistFront, Front, FrontLink, FrontNode, FrontTree, FrontType};
    pub use crate::front_error::FrontError;
    pub use crate::topology::analysis::{Dissection, DissectionNode, SymbolicAnalysis, analyze};
    pub use crate::topology::grid::{Grid, Team};
    pub use crate::topology::tree::{NodeId, NodeInfo, SymbolicTree};
}
