//! Module: plan::collect
//! Responsibility: the plan description that configures one COLLECT.
//! Does not own: method selection policy or execution.
//! Boundary: planner → executor contract; serde-serializable.

use crate::{
    aggregate::AggregateFunction,
    plan::{Expr, PlanError},
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

///
/// CollectMethod
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectMethod {
    #[default]
    Hash,
    Sorted,
    Count,
}

impl CollectMethod {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Hash => "hash",
            Self::Sorted => "sorted",
            Self::Count => "count",
        }
    }
}

impl fmt::Display for CollectMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CollectMethod {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hash" => Ok(Self::Hash),
            "sorted" => Ok(Self::Sorted),
            "count" => Ok(Self::Count),
            other => Err(PlanError::UnknownMethod {
                method: other.to_string(),
            }),
        }
    }
}

///
/// GroupKeySpec
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct GroupKeySpec {
    pub output: String,
    pub expr: Expr,
}

///
/// AggregateSpec
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct AggregateSpec {
    pub output: String,
    pub function: AggregateFunction,
    pub input: Expr,
}

///
/// CollectPlan
///
/// Group keys, aggregates, grouping method and the distinct flag for one
/// COLLECT stage. Built with the chaining helpers below and checked with
/// `validate` before execution.
///
/// A plan with `partial` set emits the wire partial of every aggregate
/// instead of its final value; shard halves of split plans carry it.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct CollectPlan {
    pub group_keys: Vec<GroupKeySpec>,
    pub aggregates: Vec<AggregateSpec>,
    pub method: CollectMethod,
    #[serde(default)]
    pub distinct: bool,
    #[serde(default)]
    pub partial: bool,
}

impl CollectPlan {
    #[must_use]
    pub fn new(method: CollectMethod) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn group_by(mut self, output: impl Into<String>, expr: Expr) -> Self {
        self.group_keys.push(GroupKeySpec {
            output: output.into(),
            expr,
        });
        self
    }

    #[must_use]
    pub fn aggregate(
        mut self,
        output: impl Into<String>,
        function: AggregateFunction,
        input: Expr,
    ) -> Self {
        self.aggregates.push(AggregateSpec {
            output: output.into(),
            function,
            input,
        });
        self
    }

    /// Add an aggregate by function name, accepting aliases.
    pub fn aggregate_named(
        self,
        output: impl Into<String>,
        function: &str,
        input: Expr,
    ) -> Result<Self, PlanError> {
        let function = function.parse()?;

        Ok(self.aggregate(output, function, input))
    }

    #[must_use]
    pub const fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    #[must_use]
    pub const fn emit_partials(mut self) -> Self {
        self.partial = true;
        self
    }

    #[must_use]
    pub const fn with_method(mut self, method: CollectMethod) -> Self {
        self.method = method;
        self
    }

    /// Distinct command: group keys only, one row per distinct key.
    #[must_use]
    pub const fn is_distinct_command(&self) -> bool {
        self.distinct && self.aggregates.is_empty()
    }

    /// Whether the plan has the one shape the count method can serve.
    #[must_use]
    pub fn is_count_shape(&self) -> bool {
        self.group_keys.is_empty()
            && !self.distinct
            && matches!(
                self.aggregates.as_slice(),
                [AggregateSpec {
                    function: AggregateFunction::Length,
                    ..
                }]
            )
    }

    /// Output variable names in emission order: group keys, then aggregates.
    pub fn output_variables(&self) -> impl Iterator<Item = &str> {
        self.group_keys
            .iter()
            .map(|key| key.output.as_str())
            .chain(self.aggregates.iter().map(|agg| agg.output.as_str()))
    }

    pub fn validate(&self) -> Result<(), PlanError> {
        crate::plan::validate::validate_collect_plan(self)
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_chains_keys_and_aggregates() {
        let plan = CollectPlan::new(CollectMethod::Sorted)
            .group_by("g", Expr::attr("i", ["group"]))
            .aggregate_named("n", "COUNT", Expr::constant(1))
            .expect("COUNT is an aggregate");

        assert_eq!(plan.method, CollectMethod::Sorted);
        assert_eq!(plan.aggregates[0].function, AggregateFunction::Length);
        assert_eq!(plan.output_variables().collect::<Vec<_>>(), vec!["g", "n"]);
        assert!(!plan.is_distinct_command());
        assert!(!plan.is_count_shape());
    }

    #[test]
    fn count_shape_needs_exactly_one_length_and_no_keys() {
        let count = CollectPlan::new(CollectMethod::Count).aggregate(
            "n",
            AggregateFunction::Length,
            Expr::constant(1),
        );
        assert!(count.is_count_shape());

        let summed = count
            .clone()
            .aggregate("s", AggregateFunction::Sum, Expr::var("x"));
        assert!(!summed.is_count_shape());
        assert!(!count.group_by("g", Expr::var("x")).is_count_shape());
    }

    #[test]
    fn plans_round_trip_through_json() {
        let plan = CollectPlan::new(CollectMethod::Hash)
            .group_by("g", Expr::attr("i", ["group"]))
            .aggregate("avg", AggregateFunction::Average, Expr::attr("i", ["v"]));
        let json = serde_json::to_string(&plan).expect("serialize");

        assert!(json.contains(r#""method":"hash""#));
        assert!(json.contains(r#""AVERAGE""#));
        assert_eq!(
            serde_json::from_str::<CollectPlan>(&json).expect("deserialize"),
            plan
        );
    }

    #[test]
    fn methods_parse_from_labels() {
        assert_eq!("count".parse::<CollectMethod>(), Ok(CollectMethod::Count));
        assert!("index".parse::<CollectMethod>().is_err());
    }
}
