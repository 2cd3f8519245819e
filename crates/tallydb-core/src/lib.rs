//! Core runtime for TallyDB: the COLLECT stage of a document query engine.
//!
//! Rows arrive from an upstream producer, are grouped by key, folded through
//! aggregate accumulators, and leave as finalized rows. Sharded inputs run a
//! two-phase plan that merges shard partials on a coordinator.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod aggregate;
pub mod collect;
pub mod distributed;
pub mod error;
pub mod obs;
pub mod plan;
pub mod row;
pub mod scalar;
pub mod selector;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_support;

///
/// Prelude
///
/// Prelude contains the vocabulary needed to describe and run one COLLECT.
/// Metrics plumbing and internal hashing helpers are not re-exported here.
///

pub mod prelude {
    pub use crate::{
        aggregate::AggregateFunction,
        collect::{CollectExecutor, ExecutionConfig},
        distributed::DistributedMergeCoordinator,
        error::InternalError,
        plan::{CollectMethod, CollectPlan, Expr, PlanError},
        row::Row,
        selector::{InputProperties, MethodHint, MethodSelector},
        value::Value,
    };
}
