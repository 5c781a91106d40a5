//! Replication manager.
//!
//! Wires the adaptive scheduler, the worker pool and feedback handling
//! together:
//! 1. `schedule_replication` prepares a job and submits it to the pool
//! 2. The pool runs the workload and calls back with a completion event
//! 3. The callback routes the event through the feedback collector
//! 4. Failures reach the reporter asynchronously
//!
//! `run_task` drives one task configuration through a number of
//! replications, keeping at most one pool's worth of jobs in flight so later
//! selections can learn from earlier results.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::domain::{CompletionEvent, TaskConfig, TaskConfigId};
use crate::error::{ReplicatorError, Result};
use crate::executor::{CompletionCallback, JobHandle, WorkerPool, Workload};
use crate::feedback::{FailureReporter, FeedbackCollector, FeedbackOutcome, ReportDispatcher};
use crate::options::OptionGenerator;
use crate::policy::{PolicyFactory, factory_for};
use crate::replication::{RecordSnapshot, ReplicationRegistry, min_replications_or};
use crate::scheduler::{AdaptiveScheduler, TaskState};

/// Result of driving one task configuration.
#[derive(Debug, Clone, Serialize)]
pub struct TaskSummary {
    pub task: TaskConfigId,
    /// Replications asked for
    pub requested: usize,
    /// Replications actually submitted
    pub dispatched: usize,
    pub state: TaskState,
    pub snapshot: Option<RecordSnapshot>,
}

impl TaskSummary {
    pub fn exhausted(&self) -> bool {
        self.state == TaskState::Exhausted
    }
}

/// Owns the scheduler, worker pool and feedback path.
pub struct ReplicationManager {
    scheduler: AdaptiveScheduler,
    feedback: Arc<FeedbackCollector>,
    pool: WorkerPool,
    report_task: JoinHandle<()>,
}

impl ReplicationManager {
    /// Create a manager using the policy selected in `config`.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(
        config: &Config,
        generator: Arc<dyn OptionGenerator>,
        workload: Arc<dyn Workload>,
        reporter: Arc<dyn FailureReporter>,
    ) -> Self {
        Self::with_policy(config, generator, workload, reporter, factory_for(&config.policy))
    }

    /// Create a manager with a custom policy factory.
    pub fn with_policy(
        config: &Config,
        generator: Arc<dyn OptionGenerator>,
        workload: Arc<dyn Workload>,
        reporter: Arc<dyn FailureReporter>,
        policy_factory: PolicyFactory,
    ) -> Self {
        let registry = Arc::new(ReplicationRegistry::new());
        let (dispatcher, report_task) = ReportDispatcher::spawn(reporter, config.feedback.report_queue);
        let feedback = Arc::new(FeedbackCollector::new(
            registry.clone(),
            dispatcher,
            config.feedback.invalid_cost,
        ));

        let collector = feedback.clone();
        let on_complete: CompletionCallback = Arc::new(move |event: CompletionEvent| {
            if let Err(e) = collector.on_event(&event) {
                tracing::warn!(task = %event.task, job = %event.job_id, error = %e, "Completion feedback rejected");
            }
        });
        let pool = WorkerPool::new(workload, config.scheduler.max_workers, on_complete);

        let scheduler = AdaptiveScheduler::new(
            registry,
            generator,
            min_replications_or(config.scheduler.default_min_replications),
            policy_factory,
        );

        Self {
            scheduler,
            feedback,
            pool,
            report_task,
        }
    }

    pub fn scheduler(&self) -> &AdaptiveScheduler {
        &self.scheduler
    }

    pub fn registry(&self) -> &Arc<ReplicationRegistry> {
        self.scheduler.registry()
    }

    /// Choose an option for `task` and submit one replication of it.
    pub async fn schedule_replication(&self, task: &TaskConfig) -> Result<JobHandle> {
        self.scheduler.schedule_job(task, &self.pool).await
    }

    /// Apply a completion event produced outside the worker pool.
    pub fn report_completion(&self, event: &CompletionEvent) -> Result<FeedbackOutcome> {
        self.feedback.on_event(event)
    }

    /// Run up to `replications` replications of `task`.
    ///
    /// Stops dispatching early once the task is exhausted; jobs already in
    /// flight still complete and are accounted for. Structural errors other
    /// than exhaustion are returned after in-flight jobs finish.
    pub async fn run_task(&self, task: &TaskConfig, replications: usize) -> Result<TaskSummary> {
        let window = self.pool.max_workers();
        let mut in_flight = FuturesUnordered::new();
        let mut dispatched = 0;
        let mut halted: Option<ReplicatorError> = None;

        tracing::info!(task = %task.id, replications, window, "Running task");

        loop {
            while halted.is_none() && dispatched < replications && in_flight.len() < window {
                match self.schedule_replication(task).await {
                    Ok(handle) => {
                        dispatched += 1;
                        in_flight.push(handle.wait());
                    }
                    Err(e) => halted = Some(e),
                }
            }
            if in_flight.next().await.is_none() {
                break;
            }
        }

        match halted {
            Some(ReplicatorError::Exhausted(_)) | None => {}
            Some(e) => return Err(e),
        }

        let summary = TaskSummary {
            task: task.id.clone(),
            requested: replications,
            dispatched,
            state: self.scheduler.state(&task.id),
            snapshot: self.registry().get(&task.id).map(|r| r.snapshot()),
        };
        tracing::info!(
            task = %task.id,
            dispatched,
            state = %summary.state,
            "Task finished"
        );
        Ok(summary)
    }

    pub fn state(&self, id: &TaskConfigId) -> TaskState {
        self.scheduler.state(id)
    }

    pub fn snapshot(&self, id: &TaskConfigId) -> Option<RecordSnapshot> {
        self.registry().get(id).map(|r| r.snapshot())
    }

    /// Drop the record for `id`. Feedback from its in-flight jobs is ignored,
    /// even once a new record exists for the same id.
    pub fn forget(&self, id: &TaskConfigId) -> bool {
        self.registry().forget(id).is_some()
    }

    /// Jobs submitted and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.pool.in_flight()
    }

    /// Failure reports dropped because the queue was full.
    pub fn dropped_reports(&self) -> u64 {
        self.feedback.reports().dropped()
    }

    /// Wait until queued failure reports have reached the reporter.
    pub async fn flush_reports(&self) {
        self.feedback.reports().flush().await;
    }

    /// Stop accepting jobs, drain reports and stop the report task.
    ///
    /// Jobs still queued in the pool are cancelled; they produce no feedback
    /// and their options keep their standing.
    pub async fn shutdown(self) {
        self.pool.close();
        self.feedback.reports().flush().await;
        self.report_task.abort();
    }
}
