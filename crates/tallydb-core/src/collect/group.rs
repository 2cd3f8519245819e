//! Module: collect::group
//! Responsibility: one group's fold state and its finalization into a row.
//! Does not own: key lookup or strategy control flow.
//! Boundary: strategies create, fold and finalize groups only through here.

use crate::{
    aggregate::Accumulator,
    collect::key::GroupKey,
    error::InternalError,
    obs::sink::{self, MetricsEvent},
    plan::{AggregateSpec, CollectPlan},
    row::Row,
    value::Value,
};

///
/// Group
///
/// Key plus one accumulator per aggregate. The key never changes once the
/// group exists; `finalize` consumes the group so it runs exactly once.
///

#[derive(Clone, Debug)]
pub(crate) struct Group {
    key: GroupKey,
    accumulators: Vec<Accumulator>,
}

impl Group {
    #[must_use]
    pub(crate) const fn key(&self) -> &GroupKey {
        &self.key
    }

    #[must_use]
    pub(crate) fn accumulator_count(&self) -> usize {
        self.accumulators.len()
    }
}

///
/// GroupProgram
///
/// Compiled output layout of one plan: which variables the key components
/// land in, and which aggregate feeds which output variable.
///

#[derive(Clone, Debug)]
pub(crate) struct GroupProgram {
    key_outputs: Vec<String>,
    aggregates: Vec<AggregateSpec>,
    partial: bool,
}

impl GroupProgram {
    #[must_use]
    pub(crate) fn new(plan: &CollectPlan) -> Self {
        Self {
            key_outputs: plan.group_keys.iter().map(|k| k.output.clone()).collect(),
            aggregates: plan.aggregates.clone(),
            partial: plan.partial,
        }
    }

    #[must_use]
    pub(crate) fn new_group(&self, key: GroupKey) -> Group {
        Group {
            key,
            accumulators: self
                .aggregates
                .iter()
                .map(|agg| Accumulator::new(agg.function))
                .collect(),
        }
    }

    /// Output variable of the single LENGTH aggregate of a count plan.
    #[must_use]
    pub(crate) fn count_output(&self) -> Option<&str> {
        match self.aggregates.as_slice() {
            [spec] if self.key_outputs.is_empty() => Some(spec.output.as_str()),
            _ => None,
        }
    }

    /// Fold one row into a group.
    pub(crate) fn fold_row(&self, group: &mut Group, row: &Row) -> Result<(), InternalError> {
        for (accumulator, spec) in group.accumulators.iter_mut().zip(&self.aggregates) {
            if spec.function.reads_input() {
                let value = spec.input.evaluate(row)?;
                accumulator.update(&value);
            } else {
                accumulator.update(&Value::Null);
            }
        }

        Ok(())
    }

    /// Finalize a group into its output row. Partial-emitting programs
    /// write each accumulator's wire partial instead.
    #[must_use]
    pub(crate) fn finalize(&self, group: Group) -> Row {
        let mut row = Row::new();
        for (name, value) in self.key_outputs.iter().zip(group.key) {
            row.insert(name.clone(), value);
        }
        for (accumulator, spec) in group.accumulators.into_iter().zip(&self.aggregates) {
            if accumulator.is_poisoned() {
                sink::record(MetricsEvent::GroupPoisoned {
                    function: spec.function,
                });
            }
            let value = if self.partial {
                accumulator.serialize_partial()
            } else {
                accumulator.finalize()
            };
            row.insert(spec.output.clone(), value);
        }

        row
    }
}
