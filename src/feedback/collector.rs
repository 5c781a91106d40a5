//! Applies completion results to replication records.

use std::sync::Arc;

use super::dispatch::ReportDispatcher;
use super::report::QuarantineReport;
use crate::config::InvalidCostAction;
use crate::domain::{CompletionEvent, FailureCause, ReplicationResult, TaskConfigId};
use crate::error::{ReplicatorError, Result};
use crate::replication::{OutcomeSignal, ReplicationRegistry};

/// What happened to one completion result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackOutcome {
    /// The cost was added to the option's history
    Recorded,
    /// The option is quarantined and a report was queued
    Quarantined { newly: bool, exhausted: bool },
    /// No record exists for the task, or the job was dispatched against a
    /// record that has since been forgotten
    Orphaned,
}

/// Routes results back to the owning record.
///
/// Never blocks on reporting: failure reports go through the dispatcher's
/// bounded queue.
pub struct FeedbackCollector {
    registry: Arc<ReplicationRegistry>,
    reports: ReportDispatcher,
    invalid_cost: InvalidCostAction,
}

impl FeedbackCollector {
    pub fn new(registry: Arc<ReplicationRegistry>, reports: ReportDispatcher, invalid_cost: InvalidCostAction) -> Self {
        Self {
            registry,
            reports,
            invalid_cost,
        }
    }

    pub fn reports(&self) -> &ReportDispatcher {
        &self.reports
    }

    /// Apply `result` for option `index` of task `task`.
    ///
    /// A success with a negative or non-finite cost is treated as an
    /// `InvalidCost` failure, or rejected with `InvalidOutcome` when the
    /// collector is configured to discard such results.
    pub fn on_completion(&self, task: &TaskConfigId, index: usize, result: &ReplicationResult) -> Result<FeedbackOutcome> {
        self.apply(task, index, result, None, None)
    }

    /// Apply a completion event from an executor.
    ///
    /// The event only reaches the record generation its job was chosen
    /// from; a record created after a `forget` never sees it.
    pub fn on_event(&self, event: &CompletionEvent) -> Result<FeedbackOutcome> {
        self.apply(
            &event.task,
            event.option_index,
            &event.result,
            Some(event.generation),
            Some(&event.job_id),
        )
    }

    fn apply(
        &self,
        task: &TaskConfigId,
        index: usize,
        result: &ReplicationResult,
        generation: Option<u64>,
        job_id: Option<&str>,
    ) -> Result<FeedbackOutcome> {
        let Some(record) = self.registry.get(task) else {
            tracing::warn!(task = %task, option = index, "Completion for unknown task configuration ignored");
            return Ok(FeedbackOutcome::Orphaned);
        };
        if let Some(generation) = generation
            && generation != record.generation()
        {
            tracing::warn!(
                task = %task,
                option = index,
                generation,
                current = record.generation(),
                "Completion for forgotten record ignored"
            );
            return Ok(FeedbackOutcome::Orphaned);
        }

        let cause = match result {
            ReplicationResult::Success { cost } if result.has_invalid_cost() => match self.invalid_cost {
                InvalidCostAction::Quarantine => FailureCause::InvalidCost(*cost),
                InvalidCostAction::Discard => {
                    tracing::warn!(task = %task, option = index, cost, "Discarding result with invalid cost");
                    return Err(ReplicatorError::InvalidOutcome(format!(
                        "cost {} for {} option {} discarded",
                        cost, task, index
                    )));
                }
            },
            ReplicationResult::Success { cost } => {
                record.register_outcome(index, *cost, false)?;
                return Ok(FeedbackOutcome::Recorded);
            }
            ReplicationResult::Failure { cause } => cause.clone(),
        };

        let signal = record.register_outcome(index, 0.0, true)?;
        let OutcomeSignal::Quarantined { newly, exhausted } = signal else {
            return Ok(FeedbackOutcome::Recorded);
        };

        let mut report = QuarantineReport::new(task, index, &record.options()[index], cause, newly, exhausted);
        if let Some(job_id) = job_id {
            report = report.with_job_id(job_id);
        }
        self.reports.dispatch(report);

        Ok(FeedbackOutcome::Quarantined { newly, exhausted })
    }
}
