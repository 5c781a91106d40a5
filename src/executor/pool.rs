//! Bounded tokio worker pool.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use tokio::sync::{Semaphore, oneshot};

use super::workload::{Workload, WorkloadOutput};
use super::{CompletionCallback, Executor, JobHandle};
use crate::domain::{CompletionEvent, FailureCause, ReplicationJob, ReplicationResult};
use crate::error::{ReplicatorError, Result};

/// Runs jobs on tokio tasks, at most `max_workers` at a time.
///
/// Submission never waits: jobs beyond the limit queue on the pool's
/// semaphore. Each finished job is passed to the completion callback, then
/// its handle resolves. Wall-clock cost counts from when a job gets its
/// worker, not from submission.
pub struct WorkerPool {
    workload: Arc<dyn Workload>,
    permits: Arc<Semaphore>,
    on_complete: CompletionCallback,
    in_flight: Arc<AtomicUsize>,
    max_workers: usize,
}

impl WorkerPool {
    pub fn new(workload: Arc<dyn Workload>, max_workers: usize, on_complete: CompletionCallback) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            workload,
            permits: Arc::new(Semaphore::new(max_workers)),
            on_complete,
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_workers,
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Jobs submitted and not yet finished, queued ones included.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Stop starting queued jobs.
    ///
    /// Queued jobs are dropped without reaching the completion callback and
    /// their handles resolve to `None`. Running jobs finish normally.
    pub fn close(&self) {
        self.permits.close();
    }
}

impl Executor for WorkerPool {
    fn submit(&self, job: ReplicationJob) -> Result<JobHandle> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ReplicatorError::Submit(format!("no tokio runtime for {}: {}", job.job_id, e)))?;
        if self.permits.is_closed() {
            return Err(ReplicatorError::Submit(format!("worker pool closed, rejecting {}", job.job_id)));
        }

        let (done_tx, done_rx) = oneshot::channel();
        let handle = JobHandle::new(&job, done_rx);

        let workload = self.workload.clone();
        let permits = self.permits.clone();
        let on_complete = self.on_complete.clone();
        let in_flight = self.in_flight.clone();
        in_flight.fetch_add(1, Ordering::SeqCst);

        runtime.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                // Closed before the job started: not an outcome of the option.
                tracing::debug!(task = %job.task, job = %job.job_id, "Queued replication cancelled");
                in_flight.fetch_sub(1, Ordering::SeqCst);
                return;
            };
            let started = Instant::now();
            let result = run_isolated(workload, &job, started).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            let event = CompletionEvent::for_job(&job, result, elapsed_ms);
            tracing::debug!(
                task = %event.task,
                job = %event.job_id,
                option = event.option_index,
                failed = event.result.is_failure(),
                elapsed_ms,
                "Replication finished"
            );
            on_complete(event.clone());
            in_flight.fetch_sub(1, Ordering::SeqCst);
            let _ = done_tx.send(event);
        });

        Ok(handle)
    }
}

/// Run the workload on its own task so a panic surfaces as a crashed
/// replication instead of taking the worker down.
async fn run_isolated(workload: Arc<dyn Workload>, job: &ReplicationJob, started: Instant) -> ReplicationResult {
    let run_job = job.clone();
    let joined = tokio::spawn(async move { workload.run(&run_job).await }).await;
    match joined {
        Ok(WorkloadOutput::Completed { cost }) => {
            ReplicationResult::success(cost.unwrap_or_else(|| started.elapsed().as_secs_f64()))
        }
        Ok(WorkloadOutput::Failed(cause)) => ReplicationResult::failure(cause),
        Err(e) => {
            tracing::warn!(job = %job.job_id, error = %e, "Workload crashed");
            ReplicationResult::failure(FailureCause::Crashed(e.to_string()))
        }
    }
}
