//! Module: selector
//! Responsibility: choose the physical COLLECT method and place sorts.
//! Does not own: execution of the chosen plan.
//! Boundary: logical plan plus input properties in, physical plan out.

use crate::{
    collect::{CollectExecutor, CollectPipeline, ExecutionConfig, SortStage},
    distributed::{DistributedMergeCoordinator, DistributedPlan, split_for_shards},
    obs::sink::{self, MetricsEvent},
    plan::{CollectMethod, CollectPlan, Expr, PlanError},
};
use serde::{Deserialize, Serialize};

///
/// MethodHint
///
/// Caller preference for keyed plans whose input is not already ordered.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodHint {
    #[default]
    Auto,
    Hash,
    Sorted,
}

///
/// InputProperties
///
/// What the planner knows about the upstream row stream.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct InputProperties {
    ordered_by: Vec<Expr>,
    sharded: bool,
}

impl InputProperties {
    #[must_use]
    pub fn unordered() -> Self {
        Self::default()
    }

    /// Upstream rows arrive ascending by these expressions.
    #[must_use]
    pub fn ordered_by(mut self, exprs: Vec<Expr>) -> Self {
        self.ordered_by = exprs;
        self
    }

    #[must_use]
    pub const fn sharded(mut self) -> Self {
        self.sharded = true;
        self
    }

    #[must_use]
    pub const fn is_sharded(&self) -> bool {
        self.sharded
    }

    // Ordering satisfies a plan when it starts with exactly its key tuple.
    fn satisfies(&self, plan: &CollectPlan) -> bool {
        self.ordered_by.len() >= plan.group_keys.len()
            && plan
                .group_keys
                .iter()
                .zip(&self.ordered_by)
                .all(|(key, expr)| key.expr == *expr)
    }
}

///
/// LocalCollect
///
/// Single-node physical COLLECT: optional pre-sort, the plan with its method
/// fixed, optional post-sort.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LocalCollect {
    pub pre_sort: Option<SortStage>,
    pub plan: CollectPlan,
    pub post_sort: Option<SortStage>,
}

impl LocalCollect {
    pub fn into_pipeline(self, config: ExecutionConfig) -> Result<CollectPipeline, PlanError> {
        let executor = CollectExecutor::new(self.plan, config)?;

        Ok(CollectPipeline::new(self.pre_sort, executor, self.post_sort))
    }
}

///
/// PhysicalCollect
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PhysicalCollect {
    Local(LocalCollect),
    Distributed(DistributedPlan),
}

impl PhysicalCollect {
    /// Method of the stage that sees raw input rows.
    #[must_use]
    pub const fn method(&self) -> CollectMethod {
        match self {
            Self::Local(local) => local.plan.method,
            Self::Distributed(split) => split.shard.method,
        }
    }

    /// Build a coordinator for a distributed plan.
    pub fn into_coordinator(
        self,
        config: ExecutionConfig,
    ) -> Result<Option<DistributedMergeCoordinator>, PlanError> {
        match self {
            Self::Local(_) => Ok(None),
            Self::Distributed(split) => DistributedMergeCoordinator::new(split, config).map(Some),
        }
    }
}

///
/// MethodSelector
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MethodSelector {
    hint: MethodHint,
}

impl MethodSelector {
    #[must_use]
    pub const fn new(hint: MethodHint) -> Self {
        Self { hint }
    }

    #[must_use]
    pub const fn hint(&self) -> MethodHint {
        self.hint
    }

    /// Pick the physical form of `plan` for input with `input` properties.
    ///
    /// The method already written into `plan` is ignored; the selector
    /// decides it.
    pub fn select(
        &self,
        plan: &CollectPlan,
        input: &InputProperties,
    ) -> Result<PhysicalCollect, PlanError> {
        let physical = if input.is_sharded() {
            PhysicalCollect::Distributed(split_for_shards(plan)?)
        } else {
            PhysicalCollect::Local(self.select_local(plan, input)?)
        };

        let sort_inserted = match &physical {
            PhysicalCollect::Local(local) => local.pre_sort.is_some() || local.post_sort.is_some(),
            PhysicalCollect::Distributed(split) => split.post_sort.is_some(),
        };
        sink::record(MetricsEvent::Plan {
            method: physical.method(),
            sort_inserted,
            split: input.is_sharded(),
        });

        Ok(physical)
    }

    fn select_local(
        &self,
        plan: &CollectPlan,
        input: &InputProperties,
    ) -> Result<LocalCollect, PlanError> {
        // Phase 1: count shape always wins.
        if plan.is_count_shape() {
            let plan = plan.clone().with_method(CollectMethod::Count);
            plan.validate()?;
            return Ok(LocalCollect {
                pre_sort: None,
                plan,
                post_sort: None,
            });
        }

        // Phase 2: already-ordered input streams through sorted mode.
        if plan.group_keys.is_empty() || input.satisfies(plan) {
            let plan = plan.clone().with_method(CollectMethod::Sorted);
            plan.validate()?;
            return Ok(LocalCollect {
                pre_sort: None,
                plan,
                post_sort: None,
            });
        }

        // Phase 3: unordered keyed input.
        let key_exprs = plan.group_keys.iter().map(|key| key.expr.clone()).collect();
        let selected = match self.hint {
            MethodHint::Sorted => LocalCollect {
                pre_sort: Some(SortStage::by_exprs(key_exprs)),
                plan: plan.clone().with_method(CollectMethod::Sorted),
                post_sort: None,
            },
            MethodHint::Auto | MethodHint::Hash => LocalCollect {
                pre_sort: None,
                plan: plan.clone().with_method(CollectMethod::Hash),
                post_sort: (!plan.distinct).then(|| {
                    SortStage::by_variables(plan.group_keys.iter().map(|key| key.output.clone()))
                }),
            },
        };
        selected.plan.validate()?;

        Ok(selected)
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        aggregate::AggregateFunction, obs::sink::with_metrics_sink, test_support::CaptureSink,
    };

    fn keyed() -> CollectPlan {
        CollectPlan::new(CollectMethod::Hash)
            .group_by("g", Expr::attr("i", ["g"]))
            .aggregate("n", AggregateFunction::Length, Expr::constant(1))
    }

    fn local(physical: PhysicalCollect) -> LocalCollect {
        match physical {
            PhysicalCollect::Local(local) => local,
            PhysicalCollect::Distributed(_) => panic!("expected a local plan"),
        }
    }

    #[test]
    fn count_shape_selects_count() {
        let plan = CollectPlan::new(CollectMethod::Hash).aggregate(
            "n",
            AggregateFunction::Length,
            Expr::constant(1),
        );

        let selected = local(
            MethodSelector::default()
                .select(&plan, &InputProperties::unordered())
                .expect("select"),
        );

        assert_eq!(selected.plan.method, CollectMethod::Count);
        assert_eq!(selected.pre_sort, None);
        assert_eq!(selected.post_sort, None);
    }

    #[test]
    fn keyless_aggregation_selects_sorted() {
        let plan = CollectPlan::new(CollectMethod::Hash)
            .aggregate("n", AggregateFunction::Length, Expr::constant(1))
            .aggregate("s", AggregateFunction::Sum, Expr::var("x"));

        let selected = local(
            MethodSelector::default()
                .select(&plan, &InputProperties::unordered())
                .expect("select"),
        );

        assert_eq!(selected.plan.method, CollectMethod::Sorted);
    }

    #[test]
    fn ordered_input_selects_sorted_without_sorts() {
        let input = InputProperties::unordered()
            .ordered_by(vec![Expr::attr("i", ["g"]), Expr::attr("i", ["h"])]);

        let selected = local(
            MethodSelector::default()
                .select(&keyed(), &input)
                .expect("select"),
        );

        assert_eq!(selected.plan.method, CollectMethod::Sorted);
        assert_eq!(selected.pre_sort, None);
        assert_eq!(selected.post_sort, None);
    }

    #[test]
    fn ordering_on_other_expressions_does_not_count() {
        let input = InputProperties::unordered().ordered_by(vec![Expr::attr("i", ["h"])]);

        let selected = local(
            MethodSelector::default()
                .select(&keyed(), &input)
                .expect("select"),
        );

        assert_eq!(selected.plan.method, CollectMethod::Hash);
        assert_eq!(selected.post_sort, Some(SortStage::by_variables(["g"])));
    }

    #[test]
    fn sorted_hint_inserts_pre_sort() {
        let selected = local(
            MethodSelector::new(MethodHint::Sorted)
                .select(&keyed(), &InputProperties::unordered())
                .expect("select"),
        );

        assert_eq!(selected.plan.method, CollectMethod::Sorted);
        assert_eq!(
            selected.pre_sort,
            Some(SortStage::by_exprs(vec![Expr::attr("i", ["g"])]))
        );
        assert_eq!(selected.post_sort, None);
    }

    #[test]
    fn distinct_hash_skips_post_sort() {
        let plan = CollectPlan::new(CollectMethod::Hash)
            .group_by("v", Expr::attr("i", ["v"]))
            .distinct();

        let selected = local(
            MethodSelector::default()
                .select(&plan, &InputProperties::unordered())
                .expect("select"),
        );

        assert_eq!(selected.plan.method, CollectMethod::Hash);
        assert_eq!(selected.post_sort, None);
    }

    #[test]
    fn sharded_input_splits_and_reports_plan() {
        let sink = CaptureSink::default();

        let physical = with_metrics_sink(&sink, || {
            MethodSelector::default()
                .select(&keyed(), &InputProperties::unordered().sharded())
                .expect("select")
        });

        assert!(matches!(physical, PhysicalCollect::Distributed(_)));
        assert_eq!(physical.method(), CollectMethod::Hash);
        assert_eq!(
            sink.events(),
            vec![MetricsEvent::Plan {
                method: CollectMethod::Hash,
                sort_inserted: true,
                split: true,
            }]
        );
    }

    #[test]
    fn invalid_plans_are_rejected() {
        let plan = CollectPlan::new(CollectMethod::Hash)
            .group_by("g", Expr::var("g"))
            .aggregate("n", AggregateFunction::Length, Expr::constant(1));

        assert!(matches!(
            MethodSelector::default().select(&plan, &InputProperties::unordered()),
            Err(PlanError::SelfReference { .. })
        ));
    }
}
