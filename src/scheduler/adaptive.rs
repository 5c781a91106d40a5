//! The adaptive scheduler.

use std::sync::Arc;

use serde::Serialize;

use super::adapter::ExecutionAdapter;
use crate::domain::{ReplicationJob, TaskConfig, TaskConfigId};
use crate::error::{ReplicatorError, Result};
use crate::executor::{Executor, JobHandle};
use crate::id::{generate_job_id, now_ms};
use crate::options::OptionGenerator;
use crate::policy::PolicyFactory;
use crate::replication::{MinReplicationsFn, ReplicationRecord, ReplicationRegistry};

/// Lifecycle of one task configuration as seen by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// No record yet; the next request generates options
    Uninitialized,
    /// Record exists and at least one option is eligible
    Active,
    /// Every option is quarantined; terminal until the record is forgotten
    Exhausted,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Uninitialized => "uninitialized",
            TaskState::Active => "active",
            TaskState::Exhausted => "exhausted",
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Turns scheduling requests into adapted replication jobs.
pub struct AdaptiveScheduler {
    registry: Arc<ReplicationRegistry>,
    generator: Arc<dyn OptionGenerator>,
    min_reps: MinReplicationsFn,
    policy_factory: PolicyFactory,
    adapter: ExecutionAdapter,
}

impl AdaptiveScheduler {
    pub fn new(
        registry: Arc<ReplicationRegistry>,
        generator: Arc<dyn OptionGenerator>,
        min_reps: MinReplicationsFn,
        policy_factory: PolicyFactory,
    ) -> Self {
        Self {
            registry,
            generator,
            min_reps,
            policy_factory,
            adapter: ExecutionAdapter::new(),
        }
    }

    pub fn registry(&self) -> &Arc<ReplicationRegistry> {
        &self.registry
    }

    /// Record for `task`, created on first use.
    pub async fn record_for(&self, task: &TaskConfig) -> Result<Arc<ReplicationRecord>> {
        self.registry
            .get_or_create(task, self.generator.as_ref(), &self.min_reps, &self.policy_factory)
            .await
    }

    /// Choose the next option for `task` and build its job.
    ///
    /// Errors:
    /// - `NoOptions` if the generator produced nothing (not cached)
    /// - `Exhausted` once every option is quarantined
    /// - `PolicyContract` if the policy returns an invalid index
    pub async fn prepare(&self, task: &TaskConfig) -> Result<ReplicationJob> {
        let record = self.record_for(task).await?;

        let (index, option) = match record.next_option() {
            Ok(choice) => choice,
            Err(e) => {
                if matches!(e, ReplicatorError::Exhausted(_)) {
                    tracing::error!(task = %task.id, "Replication request for exhausted task configuration");
                }
                return Err(e);
            }
        };

        let params = self.adapter.adapt(record.baseline(), option);
        Ok(ReplicationJob {
            job_id: generate_job_id(task.id.as_str(), index),
            task: task.id.clone(),
            option_index: index,
            generation: record.generation(),
            option_name: option.name.clone(),
            params,
            command: task.command.clone(),
            timeout_ms: task.timeout_ms,
            dispatched_at: now_ms(),
        })
    }

    /// Prepare a job for `task` and submit it to `executor`.
    pub async fn schedule_job(&self, task: &TaskConfig, executor: &dyn Executor) -> Result<JobHandle> {
        let job = self.prepare(task).await?;
        tracing::debug!(
            task = %job.task,
            job = %job.job_id,
            option = job.option_index,
            name = %job.option_name,
            "Submitting replication"
        );
        executor.submit(job)
    }

    pub fn state(&self, id: &TaskConfigId) -> TaskState {
        match self.registry.get(id) {
            None => TaskState::Uninitialized,
            Some(record) if record.is_exhausted() => TaskState::Exhausted,
            Some(_) => TaskState::Active,
        }
    }
}
