//! Module: aggregate::function
//! Responsibility: closed vocabulary of aggregate function tags.
//! Does not own: accumulator state or fold semantics.
//! Boundary: names are the wire contract between planner, shards, and coordinator.

use crate::plan::PlanError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

///
/// AggregateFunction
///
/// One aggregate function tag. Base tags are what a query names; `*_STEP1`
/// and `*_STEP2` tags only appear in split plans produced for sharded input.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(try_from = "String", into = "String")]
pub enum AggregateFunction {
    Length,
    Min,
    Max,
    Sum,
    Average,
    AverageStep1,
    AverageStep2,
    VariancePopulation,
    VariancePopulationStep1,
    VariancePopulationStep2,
    VarianceSample,
    VarianceSampleStep1,
    VarianceSampleStep2,
    StddevPopulation,
    StddevPopulationStep1,
    StddevPopulationStep2,
    StddevSample,
    StddevSampleStep1,
    StddevSampleStep2,
    Unique,
    UniqueStep2,
    SortedUnique,
    SortedUniqueStep2,
    CountDistinct,
    CountDistinctStep2,
    BitAnd,
    BitOr,
    BitXor,
}

///
/// FunctionPhase
///
/// Which side of a two-phase plan a tag belongs to. `Any` tags are valid
/// in single-node plans and on either side of a split plan.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FunctionPhase {
    Any,
    Step1,
    Step2,
}

///
/// AggregateSplit
///
/// Shard-side and coordinator-side tags for one base function.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AggregateSplit {
    pub shard: AggregateFunction,
    pub coordinator: AggregateFunction,
}

impl AggregateFunction {
    /// Every tag, in declaration order.
    pub const ALL: [Self; 28] = [
        Self::Length,
        Self::Min,
        Self::Max,
        Self::Sum,
        Self::Average,
        Self::AverageStep1,
        Self::AverageStep2,
        Self::VariancePopulation,
        Self::VariancePopulationStep1,
        Self::VariancePopulationStep2,
        Self::VarianceSample,
        Self::VarianceSampleStep1,
        Self::VarianceSampleStep2,
        Self::StddevPopulation,
        Self::StddevPopulationStep1,
        Self::StddevPopulationStep2,
        Self::StddevSample,
        Self::StddevSampleStep1,
        Self::StddevSampleStep2,
        Self::Unique,
        Self::UniqueStep2,
        Self::SortedUnique,
        Self::SortedUniqueStep2,
        Self::CountDistinct,
        Self::CountDistinctStep2,
        Self::BitAnd,
        Self::BitOr,
        Self::BitXor,
    ];

    /// Canonical upper-case name used on the wire and in diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Length => "LENGTH",
            Self::Min => "MIN",
            Self::Max => "MAX",
            Self::Sum => "SUM",
            Self::Average => "AVERAGE",
            Self::AverageStep1 => "AVERAGE_STEP1",
            Self::AverageStep2 => "AVERAGE_STEP2",
            Self::VariancePopulation => "VARIANCE_POPULATION",
            Self::VariancePopulationStep1 => "VARIANCE_POPULATION_STEP1",
            Self::VariancePopulationStep2 => "VARIANCE_POPULATION_STEP2",
            Self::VarianceSample => "VARIANCE_SAMPLE",
            Self::VarianceSampleStep1 => "VARIANCE_SAMPLE_STEP1",
            Self::VarianceSampleStep2 => "VARIANCE_SAMPLE_STEP2",
            Self::StddevPopulation => "STDDEV_POPULATION",
            Self::StddevPopulationStep1 => "STDDEV_POPULATION_STEP1",
            Self::StddevPopulationStep2 => "STDDEV_POPULATION_STEP2",
            Self::StddevSample => "STDDEV_SAMPLE",
            Self::StddevSampleStep1 => "STDDEV_SAMPLE_STEP1",
            Self::StddevSampleStep2 => "STDDEV_SAMPLE_STEP2",
            Self::Unique => "UNIQUE",
            Self::UniqueStep2 => "UNIQUE_STEP2",
            Self::SortedUnique => "SORTED_UNIQUE",
            Self::SortedUniqueStep2 => "SORTED_UNIQUE_STEP2",
            Self::CountDistinct => "COUNT_DISTINCT",
            Self::CountDistinctStep2 => "COUNT_DISTINCT_STEP2",
            Self::BitAnd => "BIT_AND",
            Self::BitOr => "BIT_OR",
            Self::BitXor => "BIT_XOR",
        }
    }

    /// Resolve a function name, accepting aliases. Matching ignores case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.to_ascii_uppercase();
        let alias = match upper.as_str() {
            "COUNT" => Some(Self::Length),
            "AVG" => Some(Self::Average),
            "VARIANCE" => Some(Self::VariancePopulation),
            "STDDEV" => Some(Self::StddevPopulation),
            "COUNT_UNIQUE" => Some(Self::CountDistinct),
            _ => None,
        };

        alias.or_else(|| Self::ALL.into_iter().find(|f| f.name() == upper))
    }

    #[must_use]
    pub const fn phase(self) -> FunctionPhase {
        match self {
            Self::AverageStep1
            | Self::VariancePopulationStep1
            | Self::VarianceSampleStep1
            | Self::StddevPopulationStep1
            | Self::StddevSampleStep1 => FunctionPhase::Step1,
            Self::AverageStep2
            | Self::VariancePopulationStep2
            | Self::VarianceSampleStep2
            | Self::StddevPopulationStep2
            | Self::StddevSampleStep2
            | Self::UniqueStep2
            | Self::SortedUniqueStep2
            | Self::CountDistinctStep2 => FunctionPhase::Step2,
            _ => FunctionPhase::Any,
        }
    }

    /// Shard and coordinator tags for this function.
    ///
    /// Returns `None` for tags that already belong to one side of a split.
    #[must_use]
    pub const fn split(self) -> Option<AggregateSplit> {
        let (shard, coordinator) = match self {
            Self::Length => (Self::Length, Self::Sum),
            Self::Min => (Self::Min, Self::Min),
            Self::Max => (Self::Max, Self::Max),
            Self::Sum => (Self::Sum, Self::Sum),
            Self::Average => (Self::AverageStep1, Self::AverageStep2),
            Self::VariancePopulation => {
                (Self::VariancePopulationStep1, Self::VariancePopulationStep2)
            }
            Self::VarianceSample => (Self::VarianceSampleStep1, Self::VarianceSampleStep2),
            Self::StddevPopulation => (Self::StddevPopulationStep1, Self::StddevPopulationStep2),
            Self::StddevSample => (Self::StddevSampleStep1, Self::StddevSampleStep2),
            Self::Unique => (Self::Unique, Self::UniqueStep2),
            Self::SortedUnique => (Self::SortedUnique, Self::SortedUniqueStep2),
            // COUNT_DISTINCT shares the UNIQUE operator on shards.
            Self::CountDistinct => (Self::Unique, Self::CountDistinctStep2),
            Self::BitAnd => (Self::BitAnd, Self::BitAnd),
            Self::BitOr => (Self::BitOr, Self::BitOr),
            Self::BitXor => (Self::BitXor, Self::BitXor),
            _ => return None,
        };

        Some(AggregateSplit { shard, coordinator })
    }

    /// Whether the fold needs the evaluated input expression at all.
    #[must_use]
    pub const fn reads_input(self) -> bool {
        !matches!(self, Self::Length)
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AggregateFunction {
    type Err = PlanError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::from_name(name).ok_or_else(|| PlanError::UnknownAggregateFunction {
            name: name.to_string(),
        })
    }
}

impl TryFrom<String> for AggregateFunction {
    type Error = PlanError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        name.parse()
    }
}

impl From<AggregateFunction> for String {
    fn from(function: AggregateFunction) -> Self {
        function.name().to_string()
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_for_every_tag() {
        for function in AggregateFunction::ALL {
            assert_eq!(AggregateFunction::from_name(function.name()), Some(function));
        }
    }

    #[test]
    fn aliases_resolve_to_base_tags() {
        let cases = [
            ("COUNT", AggregateFunction::Length),
            ("avg", AggregateFunction::Average),
            ("Variance", AggregateFunction::VariancePopulation),
            ("STDDEV", AggregateFunction::StddevPopulation),
            ("count_unique", AggregateFunction::CountDistinct),
            ("length", AggregateFunction::Length),
        ];

        for (name, expected) in cases {
            assert_eq!(AggregateFunction::from_name(name), Some(expected), "{name}");
        }
    }

    #[test]
    fn non_aggregate_names_are_rejected() {
        for name in ["IS_NUMBER", "FIRST", "CONCAT", ""] {
            let err = name
                .parse::<AggregateFunction>()
                .expect_err("non-aggregate function must be rejected");
            assert!(matches!(err, PlanError::UnknownAggregateFunction { .. }));
        }
    }

    #[test]
    fn split_mapping_contract_is_frozen() {
        let split = |f: AggregateFunction| {
            let split = f.split().expect("base function must split");
            (split.shard.name(), split.coordinator.name())
        };

        assert_eq!(split(AggregateFunction::Length), ("LENGTH", "SUM"));
        assert_eq!(split(AggregateFunction::Min), ("MIN", "MIN"));
        assert_eq!(split(AggregateFunction::Sum), ("SUM", "SUM"));
        assert_eq!(
            split(AggregateFunction::Average),
            ("AVERAGE_STEP1", "AVERAGE_STEP2")
        );
        assert_eq!(
            split(AggregateFunction::CountDistinct),
            ("UNIQUE", "COUNT_DISTINCT_STEP2")
        );
        assert_eq!(
            split(AggregateFunction::SortedUnique),
            ("SORTED_UNIQUE", "SORTED_UNIQUE_STEP2")
        );
        assert_eq!(
            split(AggregateFunction::StddevSample),
            ("STDDEV_SAMPLE_STEP1", "STDDEV_SAMPLE_STEP2")
        );
        assert_eq!(split(AggregateFunction::BitXor), ("BIT_XOR", "BIT_XOR"));
    }

    #[test]
    fn step_tags_cannot_split_again() {
        for function in AggregateFunction::ALL {
            if function.phase() != FunctionPhase::Any {
                assert!(function.split().is_none(), "{function} must not split");
            } else {
                assert!(function.split().is_some(), "{function} must split");
            }
        }
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&AggregateFunction::AverageStep1).expect("serialize");
        assert_eq!(json, r#""AVERAGE_STEP1""#);

        let parsed: AggregateFunction = serde_json::from_str(r#""count""#).expect("deserialize");
        assert_eq!(parsed, AggregateFunction::Length);

        assert!(serde_json::from_str::<AggregateFunction>(r#""IS_NUMBER""#).is_err());
    }
}
