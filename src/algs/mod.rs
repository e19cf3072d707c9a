//! Communication primitives and the data-movement algorithms over frontal trees.

pub mod child_update;
pub mod comm_meta;
pub mod communicator;
pub mod exchange;
pub mod pull;
pub mod traversal;
pub mod unpack;
pub mod wire;

pub use exchange::{all_to_all_counts, all_to_all_v, scan};
pub use pull::{pull, pull_with_tag};
