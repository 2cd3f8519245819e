//! Module: distributed
//! Responsibility: two-phase COLLECT over sharded input.
//! Does not own: single-node grouping (collect does) or method choice.
//! Boundary: shard partial streams in, merged finalized rows out.

mod coordinator;
mod split;


pub use coordinator::{DistributedMergeCoordinator, ShardStream};
pub use split::{DistributedPlan, PARTIAL_SUFFIX, partial_name, split_for_shards};
