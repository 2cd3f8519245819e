//! Metrics sink boundary.
//!
//! Core execution logic MUST NOT depend on obs::metrics directly.
//! All instrumentation flows through MetricsEvent and MetricsSink.
//!
//! This module is the only allowed bridge between execution logic
//! and the global metrics state.
use crate::{aggregate::AggregateFunction, obs::metrics, plan::CollectMethod};
use std::cell::RefCell;

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<*const dyn MetricsSink>> = RefCell::new(None);
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MetricsEvent {
    ExecStart {
        method: CollectMethod,
    },
    ExecFinish {
        method: CollectMethod,
        rows_in: u64,
        groups_out: u64,
    },
    GroupPoisoned {
        function: AggregateFunction,
    },
    BudgetRejected {
        resource: &'static str,
    },
    Cancelled,
    Plan {
        method: CollectMethod,
        sort_inserted: bool,
        split: bool,
    },
    ShardMerge {
        shards: u64,
        partial_rows: u64,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent);
}

/// GlobalMetricsSink
/// Default process-wide sink that writes into global metrics state.
/// Acts as the concrete sink when no scoped override is installed.

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent) {
        match event {
            MetricsEvent::ExecStart { method } => {
                metrics::with_state_mut(|m| match method {
                    CollectMethod::Hash => m.ops.hash_calls = m.ops.hash_calls.saturating_add(1),
                    CollectMethod::Sorted => {
                        m.ops.sorted_calls = m.ops.sorted_calls.saturating_add(1);
                    }
                    CollectMethod::Count => {
                        m.ops.count_calls = m.ops.count_calls.saturating_add(1);
                    }
                });
            }

            MetricsEvent::ExecFinish {
                method: _,
                rows_in,
                groups_out,
            } => {
                metrics::with_state_mut(|m| {
                    m.ops.rows_in = m.ops.rows_in.saturating_add(rows_in);
                    m.ops.groups_out = m.ops.groups_out.saturating_add(groups_out);
                });
            }

            MetricsEvent::GroupPoisoned { function } => {
                metrics::with_state_mut(|m| {
                    let entry = m.functions.entry(function.name().to_string()).or_default();
                    entry.poisoned_groups = entry.poisoned_groups.saturating_add(1);
                });
            }

            MetricsEvent::BudgetRejected { resource: _ } => {
                metrics::with_state_mut(|m| {
                    m.ops.budget_rejections = m.ops.budget_rejections.saturating_add(1);
                });
            }

            MetricsEvent::Cancelled => {
                metrics::with_state_mut(|m| {
                    m.ops.cancellations = m.ops.cancellations.saturating_add(1);
                });
            }

            MetricsEvent::Plan {
                method,
                sort_inserted,
                split,
            } => {
                metrics::with_state_mut(|m| {
                    match method {
                        CollectMethod::Hash => m.ops.plan_hash = m.ops.plan_hash.saturating_add(1),
                        CollectMethod::Sorted => {
                            m.ops.plan_sorted = m.ops.plan_sorted.saturating_add(1);
                        }
                        CollectMethod::Count => {
                            m.ops.plan_count = m.ops.plan_count.saturating_add(1);
                        }
                    }
                    if sort_inserted {
                        m.ops.sorts_inserted = m.ops.sorts_inserted.saturating_add(1);
                    }
                    if split {
                        m.ops.plan_splits = m.ops.plan_splits.saturating_add(1);
                    }
                });
            }

            MetricsEvent::ShardMerge {
                shards,
                partial_rows,
            } => {
                metrics::with_state_mut(|m| {
                    m.ops.shard_runs = m.ops.shard_runs.saturating_add(shards);
                    m.ops.partial_rows = m.ops.partial_rows.saturating_add(partial_rows);
                });
            }
        }
    }
}

pub(crate) const GLOBAL_METRICS_SINK: GlobalMetricsSink = GlobalMetricsSink;

pub(crate) fn record(event: MetricsEvent) {
    let override_ptr = SINK_OVERRIDE.with(|cell| *cell.borrow());
    if let Some(ptr) = override_ptr {
        // SAFETY:
        // Preconditions:
        // - `ptr` was produced from a valid `&dyn MetricsSink` in `with_metrics_sink`.
        // - `with_metrics_sink` always restores the previous pointer before returning,
        //   including unwind paths via `Guard::drop`.
        // - `record` is synchronous and never stores `ptr` beyond this call.
        //
        // Aliasing:
        // - We materialize only a shared reference (`&dyn MetricsSink`), matching the
        //   original shared borrow used to install the override.
        //
        // What would break this:
        // - If `with_metrics_sink` failed to restore on all exits (normal + panic),
        //   `ptr` could outlive the borrowed sink and become dangling.
        unsafe { (&*ptr).record(event) };
    } else {
        GLOBAL_METRICS_SINK.record(event);
    }
}

/// Snapshot the current process-wide metrics state.
#[must_use]
pub fn metrics_report() -> metrics::EventState {
    metrics::with_state(Clone::clone)
}

/// Reset all process-wide metrics state.
pub fn metrics_reset_all() {
    metrics::reset_all();
}

/// Run a closure with a temporary metrics sink override.
///
/// The override is thread-scoped: events recorded on other threads (for
/// example rayon shard workers) still reach the global sink.
pub fn with_metrics_sink<T>(sink: &dyn MetricsSink, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<*const dyn MetricsSink>);

    impl Drop for Guard {
        fn drop(&mut self) {
            SINK_OVERRIDE.with(|cell| {
                *cell.borrow_mut() = self.0;
            });
        }
    }

    // SAFETY:
    // Preconditions:
    // - `sink_ptr` is installed only for this dynamic scope.
    // - `Guard` always restores the previous slot on all exits, including panic.
    // - `record` only dereferences synchronously and never persists `sink_ptr`.
    //
    // What would break this:
    // - Any async/deferred use of `sink_ptr` beyond this scope.
    // - Any path that bypasses Guard restoration.
    let sink_ptr = unsafe { std::mem::transmute::<&dyn MetricsSink, *const dyn MetricsSink>(sink) };
    let prev = SINK_OVERRIDE.with(|cell| {
        let mut slot = cell.borrow_mut();
        slot.replace(sink_ptr)
    });
    let _guard = Guard(prev);

    f()
}

///
/// CollectSpan
/// RAII span for one COLLECT execution.
/// Emits ExecStart on creation and ExecFinish on drop, so abandoned or
/// failed executions still close their span.
///

pub(crate) struct CollectSpan {
    method: CollectMethod,
    rows_in: u64,
    groups_out: u64,
}

impl CollectSpan {
    #[must_use]
    pub(crate) fn new(method: CollectMethod) -> Self {
        record(MetricsEvent::ExecStart { method });

        Self {
            method,
            rows_in: 0,
            groups_out: 0,
        }
    }

    pub(crate) const fn add_row(&mut self) {
        self.rows_in = self.rows_in.saturating_add(1);
    }

    pub(crate) const fn add_group(&mut self) {
        self.groups_out = self.groups_out.saturating_add(1);
    }

    #[must_use]
    pub(crate) const fn rows_in(&self) -> u64 {
        self.rows_in
    }
}

impl Drop for CollectSpan {
    fn drop(&mut self) {
        record(MetricsEvent::ExecFinish {
            method: self.method,
            rows_in: self.rows_in,
            groups_out: self.groups_out,
        });
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::CaptureSink;

    #[test]
    fn override_captures_events_and_restores_after_scope() {
        let sink = CaptureSink::default();

        with_metrics_sink(&sink, || {
            record(MetricsEvent::Cancelled);
        });

        assert_eq!(sink.events(), vec![MetricsEvent::Cancelled]);
    }

    #[test]
    fn span_emits_finish_with_counts_on_drop() {
        let sink = CaptureSink::default();

        with_metrics_sink(&sink, || {
            let mut span = CollectSpan::new(CollectMethod::Sorted);
            span.add_row();
            span.add_row();
            span.add_row();
            span.add_group();
        });

        assert_eq!(
            sink.events(),
            vec![
                MetricsEvent::ExecStart {
                    method: CollectMethod::Sorted,
                },
                MetricsEvent::ExecFinish {
                    method: CollectMethod::Sorted,
                    rows_in: 3,
                    groups_out: 1,
                },
            ]
        );
    }

    #[test]
    fn global_sink_counts_poisoned_groups_per_function() {
        GLOBAL_METRICS_SINK.record(MetricsEvent::GroupPoisoned {
            function: AggregateFunction::BitXor,
        });

        let report = metrics_report();
        let counters = report
            .functions
            .get("BIT_XOR")
            .expect("poisoned function must have counters");
        assert!(counters.poisoned_groups >= 1);
    }
}
