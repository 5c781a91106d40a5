//! Task configurations: the logical units of repeated work.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::params::Params;

/// Opaque identity of a task configuration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskConfigId(String);

impl TaskConfigId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskConfigId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TaskConfigId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A task configuration that must be executed some number of times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Stable identity used as the registry key.
    pub id: TaskConfigId,

    /// Baseline execution parameters every option is merged onto.
    pub baseline: Params,

    /// Advisory floor on replications per option, if the task sets one.
    pub min_replications: Option<usize>,

    /// Shell command executed by the command workload.
    pub command: Option<String>,

    /// Per-replication timeout for the command workload.
    pub timeout_ms: Option<u64>,
}

impl TaskConfig {
    /// Create a task configuration with the given baseline.
    pub fn new(id: impl Into<TaskConfigId>, baseline: Params) -> Self {
        Self {
            id: id.into(),
            baseline,
            min_replications: None,
            command: None,
            timeout_ms: None,
        }
    }

    pub fn with_min_replications(mut self, min: usize) -> Self {
        self.min_replications = Some(min);
        self
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}
