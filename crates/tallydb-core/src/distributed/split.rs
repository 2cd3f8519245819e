//! Module: distributed::split
//! Responsibility: rewrite one logical plan into shard and coordinator halves.
//! Does not own: execution or sort placement beyond the coordinator post-sort.
//! Boundary: pure plan-to-plan transformation.

use crate::{
    collect::SortStage,
    plan::{AggregateSpec, CollectMethod, CollectPlan, Expr, GroupKeySpec, PlanError},
};

/// Suffix carried by every shard output variable.
pub const PARTIAL_SUFFIX: &str = "#partial";

/// Shard-side name of one output variable.
#[must_use]
pub fn partial_name(output: &str) -> String {
    format!("{output}{PARTIAL_SUFFIX}")
}

///
/// DistributedPlan
///
/// Shard half runs the STEP1 form of each aggregate on every shard; the
/// coordinator half regroups partial rows and applies the STEP2 forms under
/// the original output names.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DistributedPlan {
    pub shard: CollectPlan,
    pub coordinator: CollectPlan,
    pub post_sort: Option<SortStage>,
}

/// Split a logical plan for sharded execution.
pub fn split_for_shards(plan: &CollectPlan) -> Result<DistributedPlan, PlanError> {
    plan.validate()?;

    // Phase 1: shard plan with renamed outputs and STEP1 tags.
    let mut shard = CollectPlan {
        group_keys: Vec::with_capacity(plan.group_keys.len()),
        aggregates: Vec::with_capacity(plan.aggregates.len()),
        method: shard_method(plan),
        distinct: plan.distinct,
        partial: true,
    };
    let mut coordinator = CollectPlan {
        group_keys: Vec::with_capacity(plan.group_keys.len()),
        aggregates: Vec::with_capacity(plan.aggregates.len()),
        method: if plan.group_keys.is_empty() {
            CollectMethod::Sorted
        } else {
            CollectMethod::Hash
        },
        distinct: plan.distinct,
        partial: false,
    };

    for key in &plan.group_keys {
        let partial = partial_name(&key.output);
        shard.group_keys.push(GroupKeySpec {
            output: partial.clone(),
            expr: key.expr.clone(),
        });
        coordinator.group_keys.push(GroupKeySpec {
            output: key.output.clone(),
            expr: Expr::var(partial),
        });
    }

    // Phase 2: aggregate pairs from the fixed split table.
    for aggregate in &plan.aggregates {
        let split = aggregate
            .function
            .split()
            .ok_or(PlanError::NotSplittable {
                function: aggregate.function,
            })?;
        let partial = partial_name(&aggregate.output);

        shard.aggregates.push(AggregateSpec {
            output: partial.clone(),
            function: split.shard,
            input: aggregate.input.clone(),
        });
        coordinator.aggregates.push(AggregateSpec {
            output: aggregate.output.clone(),
            function: split.coordinator,
            input: Expr::var(partial),
        });
    }

    let post_sort = (!plan.group_keys.is_empty() && !plan.distinct).then(|| {
        SortStage::by_variables(plan.group_keys.iter().map(|key| key.output.clone()))
    });

    Ok(DistributedPlan {
        shard,
        coordinator,
        post_sort,
    })
}

// Shards never sort their input.
fn shard_method(plan: &CollectPlan) -> CollectMethod {
    if plan.is_count_shape() {
        CollectMethod::Count
    } else if plan.group_keys.is_empty() {
        CollectMethod::Sorted
    } else {
        CollectMethod::Hash
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::AggregateFunction;

    #[test]
    fn split_renames_outputs_and_maps_tags() {
        let plan = CollectPlan::new(CollectMethod::Hash)
            .group_by("g", Expr::attr("i", ["g"]))
            .aggregate("n", AggregateFunction::Length, Expr::constant(1))
            .aggregate("d", AggregateFunction::CountDistinct, Expr::attr("i", ["v"]));

        let split = split_for_shards(&plan).expect("plan must split");

        assert_eq!(
            split.shard,
            CollectPlan::new(CollectMethod::Hash)
                .group_by("g#partial", Expr::attr("i", ["g"]))
                .aggregate("n#partial", AggregateFunction::Length, Expr::constant(1))
                .aggregate("d#partial", AggregateFunction::Unique, Expr::attr("i", ["v"]))
                .emit_partials()
        );
        assert_eq!(
            split.coordinator,
            CollectPlan::new(CollectMethod::Hash)
                .group_by("g", Expr::var("g#partial"))
                .aggregate("n", AggregateFunction::Sum, Expr::var("n#partial"))
                .aggregate(
                    "d",
                    AggregateFunction::CountDistinctStep2,
                    Expr::var("d#partial")
                )
        );
        assert_eq!(split.post_sort, Some(SortStage::by_variables(["g"])));
    }

    #[test]
    fn count_shape_stays_count_on_shards() {
        let plan = CollectPlan::new(CollectMethod::Count).aggregate(
            "n",
            AggregateFunction::Length,
            Expr::constant(1),
        );

        let split = split_for_shards(&plan).expect("plan must split");

        assert_eq!(split.shard.method, CollectMethod::Count);
        assert!(split.shard.partial && !split.coordinator.partial);
        assert_eq!(split.coordinator.method, CollectMethod::Sorted);
        assert_eq!(split.post_sort, None);
    }

    #[test]
    fn step_tags_are_not_splittable() {
        let plan = CollectPlan::new(CollectMethod::Hash).aggregate(
            "a",
            AggregateFunction::AverageStep2,
            Expr::var("x"),
        );

        assert_eq!(
            split_for_shards(&plan),
            Err(PlanError::NotSplittable {
                function: AggregateFunction::AverageStep2,
            })
        );
    }

    #[test]
    fn distinct_command_splits_without_post_sort() {
        let plan = CollectPlan::new(CollectMethod::Hash)
            .group_by("v", Expr::attr("i", ["v"]))
            .distinct();

        let split = split_for_shards(&plan).expect("plan must split");

        assert!(split.shard.distinct && split.coordinator.distinct);
        assert_eq!(split.post_sort, None);
    }
}
