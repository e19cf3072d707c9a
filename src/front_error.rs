//! FrontError: Unified error type for multifront public APIs
//!
//! Every condition reported here is fatal for the distributed run: a
//! multifrontal factorization has no meaningful partial result, so callers are
//! expected to abort (e.g. `MPI_Abort`) on `Err` rather than retry.

use thiserror::Error;

/// Unified error type for frontal-tree data movement.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrontError {
    /// The local part of the reordering map does not cover the local rows of the matrix.
    #[error("local mapping was not the right size: {sources} sources for {local_height} local rows")]
    StructuralMismatch { local_height: usize, sources: usize },
    /// A row was requested from (or queued on) a rank that does not own it.
    #[error("row {row} is not owned by rank {rank}")]
    NonLocalRow { row: usize, rank: usize },
    /// A team was built for a rank that is not one of its members.
    #[error("rank {rank} is not a member of the team")]
    NotInTeam { rank: usize },
    /// An index fell outside of the global dimension it addresses.
    #[error("index {index} out of range for dimension {len}")]
    IndexOutOfRange { index: usize, len: usize },
    /// A reordered target was neither in the diagonal block nor in `orig_lower_struct`.
    #[error("target {target} of node {node} not found in its original lower structure")]
    MissingLowerIndex { node: usize, target: usize },
    /// The frontal tree does not mirror the symbolic tree it is used with.
    #[error("frontal tree does not match symbolic tree at node {node}: {reason}")]
    TreeShapeMismatch { node: usize, reason: &'static str },
    /// Packed/unpacked entry counts disagree with precomputed offsets.
    #[error("accounting mismatch in {stage} for rank {rank}: expected {expected}, got {got}")]
    AccountingMismatch {
        stage: &'static str,
        rank: usize,
        expected: usize,
        got: usize,
    },
    /// A received buffer did not have the byte length announced by the size exchange.
    #[error("buffer size mismatch from rank {neighbor}: expected {expected} bytes, got {got}")]
    BufferSizeMismatch {
        neighbor: usize,
        expected: usize,
        got: usize,
    },
    /// The child grids derived from team sizes do not tile the parent team.
    #[error("computed {side} child grid incorrectly: {got} processes for a team of {expected}")]
    GridMismatch {
        side: &'static str,
        expected: usize,
        got: usize,
    },
    /// A child's Schur-complement update was not allocated before planning the exchange.
    #[error("child of node {node} has no update block")]
    MissingUpdate { node: usize },
    /// The update exchange needs receive indices that were not computed.
    #[error("node {node} has no receive indices; call compute_comm_meta with recv indices first")]
    MissingRecvInds { node: usize },
    /// A peer participated in a different collective phase than this rank.
    #[error("collective mismatch with rank {neighbor}: expected phase {expected}, got {got}")]
    CollectiveMismatch {
        neighbor: usize,
        expected: u16,
        got: u16,
    },
    /// A peer sent a message with an incompatible wire version.
    #[error("wire version mismatch with rank {neighbor}: got {got}")]
    WireVersion { neighbor: usize, got: u16 },
    /// Transport-level failure.
    #[error("communication error with neighbor {neighbor}: {reason}")]
    CommError { neighbor: usize, reason: String },
    /// The operation exists for API completeness but has not been written.
    #[error("unimplemented: {0}")]
    Unimplemented(&'static str),
}
