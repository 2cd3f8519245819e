//! Module: distributed::coordinator
//! Responsibility: fan a split plan out over shard streams and merge partials.
//! Does not own: plan splitting or per-group fold semantics.
//! Boundary: shards run in parallel; the merge is single-threaded.

use crate::{
    collect::{CancellationToken, CollectExecutor, ExecutionConfig},
    distributed::split::DistributedPlan,
    error::InternalError,
    obs::sink::{self, MetricsEvent},
    plan::PlanError,
    row::Row,
};
use rayon::prelude::*;
use std::iter;

/// One shard's raw input stream.
pub type ShardStream = Box<dyn Iterator<Item = Result<Row, InternalError>> + Send>;

///
/// DistributedMergeCoordinator
///
/// Runs the shard half of a split plan on every shard stream, then regroups
/// the partial rows under the coordinator half. A failing shard cancels the
/// others and its error aborts the whole run.
///

#[derive(Clone, Debug)]
pub struct DistributedMergeCoordinator {
    shard: CollectExecutor,
    coordinator: CollectExecutor,
    plan: DistributedPlan,
    config: ExecutionConfig,
    cancel: CancellationToken,
}

impl DistributedMergeCoordinator {
    pub fn new(plan: DistributedPlan, config: ExecutionConfig) -> Result<Self, PlanError> {
        let shard = CollectExecutor::new(plan.shard.clone(), config)?;
        let coordinator = CollectExecutor::new(plan.coordinator.clone(), config)?;

        Ok(Self {
            shard,
            coordinator,
            plan,
            config,
            cancel: CancellationToken::new(),
        })
    }

    /// Share a caller-owned token. Shard failures trip it too.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    #[must_use]
    pub const fn plan(&self) -> &DistributedPlan {
        &self.plan
    }

    /// Run every shard, merge, and return the finalized rows.
    pub fn execute(&self, shards: Vec<ShardStream>) -> Result<Vec<Row>, InternalError> {
        // With no shards at all, one empty shard still owes its implicit
        // no-key partial row.
        let shards = if shards.is_empty() {
            vec![Box::new(iter::empty()) as ShardStream]
        } else {
            shards
        };
        let shard_count = u64::try_from(shards.len()).unwrap_or(u64::MAX);

        // Phase 1: shard fan-out.
        let results = match self.config.shard_threads() {
            Some(threads) => rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|err| {
                    InternalError::executor_internal(format!("shard pool unavailable: {err}"))
                })?
                .install(|| self.run_shards(shards)),
            None => self.run_shards(shards),
        };

        let mut partials = Vec::new();
        let mut first_cancelled = None;
        for result in results {
            match result {
                Ok(rows) => partials.extend(rows),
                Err(err) if err.is_cancelled() => {
                    first_cancelled.get_or_insert(err);
                }
                Err(err) => return Err(err),
            }
        }
        if let Some(err) = first_cancelled {
            return Err(err);
        }

        // Phase 2: single-threaded merge.
        for row in &partials {
            if let Some(missing) = self
                .plan
                .shard
                .output_variables()
                .find(|name| !row.contains_key(*name))
            {
                return Err(InternalError::merge_invariant(format!(
                    "shard partial row is missing '{missing}'"
                )));
            }
        }
        sink::record(MetricsEvent::ShardMerge {
            shards: shard_count,
            partial_rows: u64::try_from(partials.len()).unwrap_or(u64::MAX),
        });

        let merged = self
            .coordinator
            .clone()
            .with_cancellation(self.cancel.clone())
            .collect_rows(partials.into_iter().map(Ok))?;

        match &self.plan.post_sort {
            Some(sort) => sort.sort(merged.into_iter().map(Ok)),
            None => Ok(merged),
        }
    }

    fn run_shards(&self, shards: Vec<ShardStream>) -> Vec<Result<Vec<Row>, InternalError>> {
        shards
            .into_par_iter()
            .map(|stream| {
                let result = self
                    .shard
                    .clone()
                    .with_cancellation(self.cancel.clone())
                    .collect_rows(stream);
                if result.is_err() {
                    self.cancel.cancel();
                }

                result
            })
            .collect()
    }
}
