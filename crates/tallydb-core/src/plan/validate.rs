//! Module: plan::validate
//! Responsibility: reject malformed COLLECT plans before any row is read.
//! Does not own: method selection or runtime guardrails.
//! Boundary: every executor and coordinator entrypoint validates first.

use crate::{aggregate::AggregateFunction, plan::CollectPlan};
use std::collections::BTreeSet;
use thiserror::Error as ThisError;

///
/// PlanError
///
/// Executor-visible plan validation failures. All of them are fatal and are
/// raised before the first input row is pulled.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum PlanError {
    #[error("'{name}' is not an aggregate function")]
    UnknownAggregateFunction { name: String },

    #[error("unknown collect method '{method}'")]
    UnknownMethod { method: String },

    #[error("expression for '{output}' references variable '{variable}' introduced by the same COLLECT")]
    SelfReference { output: String, variable: String },

    #[error("output variable '{name}' is declared more than once")]
    DuplicateOutputVariable { name: String },

    #[error("COLLECT needs at least one group key or aggregate")]
    EmptyCollect,

    #[error("count method requires no group keys and exactly one LENGTH aggregate")]
    CountMethodShape,

    #[error("distinct COLLECT cannot carry aggregates")]
    DistinctWithAggregates,

    #[error("distinct COLLECT needs at least one group key")]
    DistinctWithoutGroupKeys,

    #[error("aggregate {function} belongs to one side of a split plan and cannot be split again")]
    NotSplittable { function: AggregateFunction },
}

/// Validate one plan's structure.
pub(crate) fn validate_collect_plan(plan: &CollectPlan) -> Result<(), PlanError> {
    if plan.group_keys.is_empty() && plan.aggregates.is_empty() {
        return Err(PlanError::EmptyCollect);
    }

    // Phase 1: output names are unique.
    let mut outputs = BTreeSet::new();
    for name in plan.output_variables() {
        if !outputs.insert(name) {
            return Err(PlanError::DuplicateOutputVariable {
                name: name.to_string(),
            });
        }
    }

    // Phase 2: no expression reads a variable this COLLECT introduces.
    let inputs = plan
        .group_keys
        .iter()
        .map(|key| (key.output.as_str(), &key.expr))
        .chain(
            plan.aggregates
                .iter()
                .map(|agg| (agg.output.as_str(), &agg.input)),
        );
    for (output, expr) in inputs {
        let mut referenced = BTreeSet::new();
        expr.referenced_variables(&mut referenced);
        if let Some(variable) = referenced.intersection(&outputs).next() {
            return Err(PlanError::SelfReference {
                output: output.to_string(),
                variable: (*variable).to_string(),
            });
        }
    }

    // Phase 3: shape constraints for distinct and count.
    if plan.distinct {
        if !plan.aggregates.is_empty() {
            return Err(PlanError::DistinctWithAggregates);
        }
        if plan.group_keys.is_empty() {
            return Err(PlanError::DistinctWithoutGroupKeys);
        }
    }
    if plan.method == crate::plan::CollectMethod::Count && !plan.is_count_shape() {
        return Err(PlanError::CountMethodShape);
    }

    Ok(())
}

///
/// TESTS
///
