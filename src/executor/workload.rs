//! What a worker actually runs for a job.

use async_trait::async_trait;

use crate::domain::{FailureCause, ReplicationJob};

/// Outcome of running a workload once.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkloadOutput {
    /// Finished; `cost` overrides the measured wall-clock seconds when set
    Completed { cost: Option<f64> },
    /// The replication failed
    Failed(FailureCause),
}

impl WorkloadOutput {
    pub fn completed() -> Self {
        WorkloadOutput::Completed { cost: None }
    }

    pub fn with_cost(cost: f64) -> Self {
        WorkloadOutput::Completed { cost: Some(cost) }
    }
}

/// A runnable replication body.
#[async_trait]
pub trait Workload: Send + Sync {
    async fn run(&self, job: &ReplicationJob) -> WorkloadOutput;
}
