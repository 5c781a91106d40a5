//! Failure reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{CandidateOption, FailureCause, TaskConfigId};

/// Sent to the failure reporter whenever a replication fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarantineReport {
    pub task: TaskConfigId,
    pub option_index: usize,
    pub option_name: String,
    /// Sub-components the failing option involves
    pub involved_factories: Vec<String>,
    pub cause: FailureCause,
    /// False when the option was already quarantined by an earlier failure
    pub newly_quarantined: bool,
    /// Every option of the task is now quarantined
    pub exhausted: bool,
    pub job_id: Option<String>,
    pub reported_at: DateTime<Utc>,
}

impl QuarantineReport {
    pub fn new(
        task: &TaskConfigId,
        option_index: usize,
        option: &CandidateOption,
        cause: FailureCause,
        newly_quarantined: bool,
        exhausted: bool,
    ) -> Self {
        Self {
            task: task.clone(),
            option_index,
            option_name: option.name.clone(),
            involved_factories: option.factories.clone(),
            cause,
            newly_quarantined,
            exhausted,
            job_id: None,
            reported_at: Utc::now(),
        }
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }
}
