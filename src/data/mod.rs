//! Data module: scalars, dense and distributed matrices, reordering maps
#![warn(missing_docs)]

#[allow(missing_docs)]
pub mod dense;
#[allow(missing_docs)]
pub mod dist_map;
#[allow(missing_docs)]
pub mod dist_matrix;
pub mod scalar;
#[allow(missing_docs)]
pub mod sparse;

pub use crate::debug_invariants::DebugInvariants;

pub use dense::DenseMatrix;
pub use dist_map::DistMap;
pub use dist_matrix::DistMatrix;
pub use scalar::Scalar;
pub use sparse::DistSparseMatrix;
