use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    sync::{LazyLock, Mutex, PoisonError},
};

///
/// EventState
/// Ephemeral, in-memory counters for COLLECT planning and execution.
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventState {
    pub ops: EventOps,
    pub functions: BTreeMap<String, FunctionCounters>,
}

///
/// EventOps
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventOps {
    // Executor entrypoints
    pub hash_calls: u64,
    pub sorted_calls: u64,
    pub count_calls: u64,

    // Planner decisions
    pub plan_hash: u64,
    pub plan_sorted: u64,
    pub plan_count: u64,
    pub sorts_inserted: u64,
    pub plan_splits: u64,

    // Rows touched
    pub rows_in: u64,
    pub groups_out: u64,

    // Distributed merge
    pub shard_runs: u64,
    pub partial_rows: u64,

    // Guardrails
    pub budget_rejections: u64,
    pub cancellations: u64,
}

///
/// FunctionCounters
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct FunctionCounters {
    pub poisoned_groups: u64,
}

static EVENT_STATE: LazyLock<Mutex<EventState>> =
    LazyLock::new(|| Mutex::new(EventState::default()));

/// Borrow metrics immutably.
pub(crate) fn with_state<R>(f: impl FnOnce(&EventState) -> R) -> R {
    let state = EVENT_STATE.lock().unwrap_or_else(PoisonError::into_inner);
    f(&state)
}

/// Borrow metrics mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventState) -> R) -> R {
    let mut state = EVENT_STATE.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut state)
}

/// Reset all counters.
pub(crate) fn reset_all() {
    with_state_mut(|m| *m = EventState::default());
}
