//! Module: collect
//! Responsibility: single-node COLLECT execution (hash, sorted, count, distinct).
//! Does not own: method selection or distributed merge.
//! Boundary: row stream in, finalized row stream out.

mod context;
mod executor;
mod group;
mod key;
mod pipeline;
mod sort;
mod table;


pub use context::{CancellationToken, ExecutionBudget, ExecutionConfig};
pub use executor::{CollectExecutor, CollectStream};
pub use key::{EncodedGroupKey, GroupKey, GroupKeyExtractor};
pub use pipeline::CollectPipeline;
pub use sort::SortStage;
