//! Replication jobs and their completion events.

use serde::{Deserialize, Serialize};

use super::outcome::ReplicationResult;
use super::params::Params;
use super::task::TaskConfigId;

/// A concrete, adapted execution unit ready for the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationJob {
    /// Unique job identifier
    pub job_id: String,
    /// Task configuration this replication belongs to
    pub task: TaskConfigId,
    /// Index of the chosen option; routes feedback back to the record
    pub option_index: usize,
    /// Generation of the record the option was chosen from
    #[serde(default)]
    pub generation: u64,
    /// Name of the chosen option
    pub option_name: String,
    /// Baseline merged with the option's overrides
    pub params: Params,
    /// Command for the command workload, copied from the task
    pub command: Option<String>,
    /// Timeout for the command workload, copied from the task
    pub timeout_ms: Option<u64>,
    /// Dispatch timestamp (ms since epoch)
    pub dispatched_at: u64,
}

/// Delivered by the executor when a replication finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub job_id: String,
    pub task: TaskConfigId,
    pub option_index: usize,
    /// Copied from the job; feedback for an older generation is ignored
    #[serde(default)]
    pub generation: u64,
    pub result: ReplicationResult,
    /// Wall-clock duration of the replication
    pub elapsed_ms: u64,
}

impl CompletionEvent {
    /// Build the completion event for a job.
    pub fn for_job(job: &ReplicationJob, result: ReplicationResult, elapsed_ms: u64) -> Self {
        Self {
            job_id: job.job_id.clone(),
            task: job.task.clone(),
            option_index: job.option_index,
            generation: job.generation,
            result,
            elapsed_ms,
        }
    }
}
