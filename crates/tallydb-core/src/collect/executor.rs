//! Module: collect::executor
//! Responsibility: run one validated COLLECT plan over a row stream.
//! Does not own: method selection, sorting, or shard fan-out.
//! Boundary: pull-based iterator in, pull-based iterator out.

use crate::{
    collect::{
        context::{CancellationToken, ExecutionConfig, ExecutionContext, GroupError},
        group::{Group, GroupProgram},
        key::{GroupKey, GroupKeyExtractor},
        table::GroupTable,
    },
    error::{ErrorOrigin, InternalError},
    obs::sink::{self, CollectSpan, MetricsEvent},
    plan::{CollectMethod, CollectPlan, PlanError},
    row::Row,
    value::Value,
};
use std::{cmp::Ordering, vec};

///
/// CollectExecutor
///
/// Validated, reusable executor for one plan. Each `execute` call starts an
/// independent run with fresh groups and budget.
///

#[derive(Clone, Debug)]
pub struct CollectExecutor {
    plan: CollectPlan,
    config: ExecutionConfig,
    cancel: Option<CancellationToken>,
}

impl CollectExecutor {
    /// Validate the plan and build an executor for it.
    pub fn new(plan: CollectPlan, config: ExecutionConfig) -> Result<Self, PlanError> {
        plan.validate()?;

        Ok(Self {
            plan,
            config,
            cancel: None,
        })
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    #[must_use]
    pub const fn plan(&self) -> &CollectPlan {
        &self.plan
    }

    /// Start one run over `input`. Nothing is pulled until the returned
    /// stream is polled.
    pub fn execute<I>(&self, input: I) -> CollectStream<I::IntoIter>
    where
        I: IntoIterator<Item = Result<Row, InternalError>>,
    {
        CollectStream {
            input: input.into_iter(),
            method: self.plan.method,
            extractor: GroupKeyExtractor::new(&self.plan.group_keys),
            program: GroupProgram::new(&self.plan),
            ctx: ExecutionContext::new(self.config, self.cancel.clone()),
            span: CollectSpan::new(self.plan.method),
            phase: Phase::Consuming,
            current: None,
        }
    }

    /// Run to completion, discarding every row if any error occurs.
    pub fn collect_rows<I>(&self, input: I) -> Result<Vec<Row>, InternalError>
    where
        I: IntoIterator<Item = Result<Row, InternalError>>,
    {
        self.execute(input).collect()
    }
}

enum Phase {
    Consuming,
    Emitting(vec::IntoIter<Group>),
    Done,
}

///
/// CollectStream
///
/// Lazy output of one run. Hash and count modes consume their whole input
/// on the first pull; sorted mode emits each group as soon as its key run
/// ends. The first error ends the stream.
///

pub struct CollectStream<I> {
    input: I,
    method: CollectMethod,
    extractor: GroupKeyExtractor,
    program: GroupProgram,
    ctx: ExecutionContext,
    span: CollectSpan,
    phase: Phase,
    // Sorted mode: the one live group and its encoded key.
    current: Option<(Vec<u8>, Group)>,
}

impl<I> CollectStream<I>
where
    I: Iterator<Item = Result<Row, InternalError>>,
{
    /// Groups currently charged against the execution budget.
    #[must_use]
    pub const fn budget_groups(&self) -> u64 {
        self.ctx.budget().groups()
    }

    // Pull one input row, honoring cancellation.
    fn pull(&mut self) -> Result<Option<Row>, InternalError> {
        self.ctx.check_cancelled(ErrorOrigin::Executor)?;
        match self.input.next() {
            Some(row) => {
                let row = row?;
                self.span.add_row();
                Ok(Some(row))
            }
            None => Ok(None),
        }
    }

    fn step(&mut self) -> Result<Option<Row>, InternalError> {
        match self.method {
            CollectMethod::Hash => self.step_hash(),
            CollectMethod::Sorted => self.step_sorted(),
            CollectMethod::Count => self.step_count(),
        }
    }

    fn step_hash(&mut self) -> Result<Option<Row>, InternalError> {
        if matches!(self.phase, Phase::Consuming) {
            let groups = self.drain_into_table()?;
            self.phase = Phase::Emitting(groups.into_iter());
        }

        match &mut self.phase {
            Phase::Emitting(groups) => Ok(groups.next().map(|group| self.program.finalize(group))),
            Phase::Consuming | Phase::Done => Ok(None),
        }
    }

    fn drain_into_table(&mut self) -> Result<Vec<Group>, InternalError> {
        let mut table = GroupTable::new();
        while let Some(row) = self.pull()? {
            let key = self.extractor.extract_encoded(&row)?;
            let index = table
                .find_or_insert(key, &self.program, &mut self.ctx)
                .map_err(budget_error)?;
            self.program.fold_row(table.group_mut(index), &row)?;
        }

        if table.len() == 0 && self.extractor.is_empty() {
            return Ok(vec![self.program.new_group(GroupKey::default())]);
        }

        Ok(table.into_groups())
    }

    fn step_sorted(&mut self) -> Result<Option<Row>, InternalError> {
        if matches!(self.phase, Phase::Done) {
            return Ok(None);
        }

        while let Some(row) = self.pull()? {
            let key = self.extractor.extract_encoded(&row)?;

            if let Some((bytes, group)) = &mut self.current {
                if bytes.as_slice() == key.bytes() {
                    self.program.fold_row(group, &row)?;
                    continue;
                }
                if key.key().cmp(group.key()) == Ordering::Less {
                    return Err(InternalError::executor_invariant(format!(
                        "sorted collect input is not ordered by its group keys: {:?} after {:?}",
                        key.key().as_slice(),
                        group.key().as_slice(),
                    )));
                }
            }

            let (group_key, bytes) = key.into_parts();
            let mut group = self.program.new_group(group_key);
            self.program.fold_row(&mut group, &row)?;

            if let Some((_, finished)) = self.current.replace((bytes, group)) {
                return Ok(Some(self.program.finalize(finished)));
            }
        }

        // Input exhausted: flush the live group, or the implicit group when
        // there are no keys and no rows arrived.
        let was_empty = self.span_rows_seen() == 0;
        self.phase = Phase::Done;
        match self.current.take() {
            Some((_, group)) => Ok(Some(self.program.finalize(group))),
            None if self.extractor.is_empty() && was_empty => Ok(Some(
                self.program.finalize(self.program.new_group(GroupKey::default())),
            )),
            None => Ok(None),
        }
    }

    fn step_count(&mut self) -> Result<Option<Row>, InternalError> {
        if matches!(self.phase, Phase::Done) {
            return Ok(None);
        }

        let mut count = 0u64;
        while self.pull()?.is_some() {
            count = count.saturating_add(1);
        }
        self.phase = Phase::Done;

        let output = self.program.count_output().ok_or_else(|| {
            InternalError::executor_invariant("count collect has no LENGTH output")
        })?;

        Ok(Some(Row::new().with(output, Value::from(count))))
    }

    const fn span_rows_seen(&self) -> u64 {
        self.span.rows_in()
    }
}

impl<I> Iterator for CollectStream<I>
where
    I: Iterator<Item = Result<Row, InternalError>>,
{
    type Item = Result<Row, InternalError>;

    fn next(&mut self) -> Option<Self::Item> {
        if matches!(self.phase, Phase::Done) && self.current.is_none() {
            return None;
        }

        match self.step() {
            Ok(Some(row)) => {
                self.span.add_group();
                Some(Ok(row))
            }
            Ok(None) => {
                self.phase = Phase::Done;
                None
            }
            Err(err) => {
                self.phase = Phase::Done;
                self.current = None;
                if err.is_cancelled() {
                    sink::record(MetricsEvent::Cancelled);
                }
                Some(Err(err))
            }
        }
    }
}

fn budget_error(err: GroupError) -> InternalError {
    if let GroupError::MemoryLimitExceeded { resource, .. } = &err {
        sink::record(MetricsEvent::BudgetRejected {
            resource: *resource,
        });
    }

    err.into_internal_error()
}
