//! Observability: typed execution events and the counters they feed.
//!
//! Execution code records through `sink::record`; nothing outside this
//! module touches `metrics` state directly.

pub(crate) mod metrics;
pub mod sink;

pub use metrics::{EventOps, EventState, FunctionCounters};
pub use sink::{MetricsEvent, MetricsSink, metrics_report, metrics_reset_all, with_metrics_sink};
