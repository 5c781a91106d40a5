//! Executing replication jobs.
//!
//! An [`Executor`] accepts adapted jobs and runs them somewhere; it must not
//! block the caller. The bundled [`WorkerPool`] runs a [`Workload`] on tokio
//! tasks with bounded concurrency and delivers each [`CompletionEvent`] to a
//! callback before the job's [`JobHandle`] resolves.

mod command;
mod pool;
mod workload;

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::domain::{CompletionEvent, ReplicationJob, TaskConfigId};
use crate::error::Result;

pub use command::{CommandWorkload, DEFAULT_TIMEOUT_MS, PARAMS_ENV};
pub use pool::WorkerPool;
pub use workload::{Workload, WorkloadOutput};

/// Invoked once per finished replication.
pub type CompletionCallback = Arc<dyn Fn(CompletionEvent) + Send + Sync>;

/// Runs replication jobs without blocking the submitter.
pub trait Executor: Send + Sync {
    /// Accept `job` for execution.
    fn submit(&self, job: ReplicationJob) -> Result<JobHandle>;
}

/// Handle on a submitted replication.
#[derive(Debug)]
pub struct JobHandle {
    pub job_id: String,
    pub task: TaskConfigId,
    pub option_index: usize,
    pub generation: u64,
    done: Option<oneshot::Receiver<CompletionEvent>>,
}

impl JobHandle {
    /// Handle whose completion is observable through `done`.
    pub fn new(job: &ReplicationJob, done: oneshot::Receiver<CompletionEvent>) -> Self {
        Self {
            job_id: job.job_id.clone(),
            task: job.task.clone(),
            option_index: job.option_index,
            generation: job.generation,
            done: Some(done),
        }
    }

    /// Handle for executors that report completion some other way.
    pub fn detached(job: &ReplicationJob) -> Self {
        Self {
            job_id: job.job_id.clone(),
            task: job.task.clone(),
            option_index: job.option_index,
            generation: job.generation,
            done: None,
        }
    }

    /// Wait for the replication to finish.
    ///
    /// Returns `None` for detached handles, or if the executor went away or
    /// was closed before running the job.
    pub async fn wait(self) -> Option<CompletionEvent> {
        self.done?.await.ok()
    }
}
