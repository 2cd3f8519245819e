//! Module: collect::context
//! Responsibility: execution limits, budget accounting, and cancellation.
//! Does not own: grouping state or fold algorithms.
//! Boundary: executors charge every new group against this context.

use crate::error::{ErrorOrigin, InternalError};
use serde::{Deserialize, Serialize};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use thiserror::Error as ThisError;

const DEFAULT_MAX_GROUPS: u64 = 1_000_000;
const DEFAULT_MAX_GROUP_BYTES: u64 = 512 * 1024 * 1024;

///
/// GroupError
///
/// GroupError is the typed grouped-execution error surface.
/// This taxonomy keeps memory-limit failures explicit instead of letting
/// them degrade into generic internal errors.
///

#[derive(Debug, ThisError)]
pub(crate) enum GroupError {
    #[error(
        "grouped execution memory limit exceeded ({resource}): attempted={attempted}, limit={limit}"
    )]
    MemoryLimitExceeded {
        resource: &'static str,
        attempted: u64,
        limit: u64,
    },

    #[error("{0}")]
    Internal(#[from] InternalError),
}

impl GroupError {
    pub(crate) fn into_internal_error(self) -> InternalError {
        match self {
            Self::MemoryLimitExceeded { .. } => InternalError::resource_exhausted(self.to_string()),
            Self::Internal(err) => err,
        }
    }
}

///
/// ExecutionConfig
///
/// Hard limits for hash-mode grouping plus the shard fan-out width.
/// Sorted and count modes hold O(1) groups and are never limited.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct ExecutionConfig {
    max_groups: u64,
    max_group_bytes: u64,
    shard_threads: Option<usize>,
}

impl ExecutionConfig {
    /// Build one hard-limit configuration.
    #[must_use]
    pub const fn with_hard_limits(max_groups: u64, max_group_bytes: u64) -> Self {
        Self {
            max_groups,
            max_group_bytes,
            shard_threads: None,
        }
    }

    /// Build one configuration with no grouping limits.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self::with_hard_limits(u64::MAX, u64::MAX)
    }

    /// Run shard executors on a dedicated pool of `threads` workers instead
    /// of the global rayon pool.
    #[must_use]
    pub const fn with_shard_threads(mut self, threads: usize) -> Self {
        self.shard_threads = Some(threads);
        self
    }

    #[must_use]
    pub const fn max_groups(&self) -> u64 {
        self.max_groups
    }

    #[must_use]
    pub const fn max_group_bytes(&self) -> u64 {
        self.max_group_bytes
    }

    #[must_use]
    pub const fn shard_threads(&self) -> Option<usize> {
        self.shard_threads
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self::with_hard_limits(DEFAULT_MAX_GROUPS, DEFAULT_MAX_GROUP_BYTES)
    }
}

///
/// ExecutionBudget
///
/// ExecutionBudget tracks grouped-execution resource usage counters.
/// `groups` is structural; `estimated_bytes` is a conservative allocation
/// estimate used for memory guardrails.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ExecutionBudget {
    groups: u64,
    estimated_bytes: u64,
}

impl ExecutionBudget {
    #[must_use]
    pub const fn groups(&self) -> u64 {
        self.groups
    }

    #[must_use]
    pub const fn estimated_bytes(&self) -> u64 {
        self.estimated_bytes
    }

    fn record_new_group(
        &mut self,
        config: &ExecutionConfig,
        bytes_delta: u64,
    ) -> Result<(), GroupError> {
        let next_groups = self.groups.saturating_add(1);
        if next_groups > config.max_groups() {
            return Err(GroupError::MemoryLimitExceeded {
                resource: "groups",
                attempted: next_groups,
                limit: config.max_groups(),
            });
        }

        let next_bytes = self.estimated_bytes.saturating_add(bytes_delta);
        if next_bytes > config.max_group_bytes() {
            return Err(GroupError::MemoryLimitExceeded {
                resource: "estimated_bytes",
                attempted: next_bytes,
                limit: config.max_group_bytes(),
            });
        }

        self.groups = next_groups;
        self.estimated_bytes = next_bytes;

        Ok(())
    }
}

///
/// CancellationToken
///
/// Shared cooperative cancellation flag. Executors poll it once per pulled
/// row; the distributed coordinator trips it when any shard fails.
///

#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

///
/// ExecutionContext
///
/// ExecutionContext carries execution policy plus mutable budget usage for
/// one executor run.
///

#[derive(Clone, Debug, Default)]
pub(crate) struct ExecutionContext {
    config: ExecutionConfig,
    budget: ExecutionBudget,
    cancel: Option<CancellationToken>,
}

impl ExecutionContext {
    #[must_use]
    pub(crate) const fn new(config: ExecutionConfig, cancel: Option<CancellationToken>) -> Self {
        Self {
            config,
            budget: ExecutionBudget {
                groups: 0,
                estimated_bytes: 0,
            },
            cancel,
        }
    }

    #[must_use]
    pub(crate) const fn budget(&self) -> &ExecutionBudget {
        &self.budget
    }

    pub(crate) fn record_new_group(&mut self, bytes_delta: u64) -> Result<(), GroupError> {
        self.budget.record_new_group(&self.config, bytes_delta)
    }

    pub(crate) fn check_cancelled(&self, origin: ErrorOrigin) -> Result<(), InternalError> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(InternalError::cancelled(origin)),
            _ => Ok(()),
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;

    #[test]
    fn group_limit_rejects_the_first_group_over_budget() {
        let mut ctx = ExecutionContext::new(ExecutionConfig::with_hard_limits(2, u64::MAX), None);
        ctx.record_new_group(10).expect("first group");
        ctx.record_new_group(10).expect("second group");

        let err = ctx
            .record_new_group(10)
            .expect_err("third group must exceed the limit")
            .into_internal_error();

        assert_eq!(err.class, ErrorClass::ResourceExhausted);
        assert!(err.message.contains("(groups): attempted=3, limit=2"));
        assert_eq!(ctx.budget().groups(), 2);
    }

    #[test]
    fn byte_limit_leaves_budget_untouched_on_rejection() {
        let mut ctx = ExecutionContext::new(ExecutionConfig::with_hard_limits(10, 100), None);
        ctx.record_new_group(60).expect("fits");

        assert!(ctx.record_new_group(60).is_err());
        assert_eq!(ctx.budget().estimated_bytes(), 60);
        assert_eq!(ctx.budget().groups(), 1);
    }

    #[test]
    fn cancellation_is_observed_through_the_context() {
        let token = CancellationToken::new();
        let ctx = ExecutionContext::new(ExecutionConfig::unbounded(), Some(token.clone()));

        ctx.check_cancelled(ErrorOrigin::Executor).expect("not cancelled yet");
        token.cancel();
        let err = ctx
            .check_cancelled(ErrorOrigin::Executor)
            .expect_err("cancelled token must abort");
        assert!(err.is_cancelled());
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: ExecutionConfig =
            serde_json::from_str(r#"{ "max_groups": 5 }"#).expect("deserialize");

        assert_eq!(config.max_groups(), 5);
        assert_eq!(
            config.max_group_bytes(),
            ExecutionConfig::default().max_group_bytes()
        );
        assert_eq!(config.shard_threads(), None);
    }
}
