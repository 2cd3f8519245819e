//! Shared fixtures for in-crate tests.

use crate::{
    error::InternalError,
    obs::sink::{MetricsEvent, MetricsSink},
    row::Row,
    value::Value,
};
use std::cell::RefCell;

///
/// CaptureSink
/// Records every metrics event in arrival order.
///

#[derive(Default)]
pub(crate) struct CaptureSink {
    events: RefCell<Vec<MetricsEvent>>,
}

impl CaptureSink {
    pub(crate) fn events(&self) -> Vec<MetricsEvent> {
        self.events.borrow().clone()
    }
}

impl MetricsSink for CaptureSink {
    fn record(&self, event: MetricsEvent) {
        self.events.borrow_mut().push(event);
    }
}

/// Decode a JSON literal into a value.
pub(crate) fn v(json: serde_json::Value) -> Value {
    serde_json::from_value(json).expect("json literal must deserialize into a value")
}

/// Wrap each document as `{ i: doc }` and make it an input row.
pub(crate) fn doc_rows(docs: serde_json::Value) -> Vec<Result<Row, InternalError>> {
    let Value::List(docs) = v(docs) else {
        panic!("document fixture must be an array");
    };

    docs.into_iter()
        .map(|doc| Ok(Row::new().with("i", doc)))
        .collect()
}
