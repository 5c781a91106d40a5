//! Error types for Replicator
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

use crate::domain::TaskConfigId;

/// All error types that can occur in Replicator
#[derive(Debug, Error)]
pub enum ReplicatorError {
    /// The option generator produced no candidates for a task configuration
    #[error("No candidate options generated for task configuration {0}")]
    NoOptions(TaskConfigId),

    /// Every candidate option of a task configuration has been quarantined
    #[error("All options quarantined for task configuration {0}")]
    Exhausted(TaskConfigId),

    /// The bandit policy broke its contract (bad or quarantined index)
    #[error("Policy contract violation for {task}: {detail}")]
    PolicyContract { task: TaskConfigId, detail: String },

    /// The option generator itself failed
    #[error("Option generation failed for {task}: {reason}")]
    OptionGeneration { task: TaskConfigId, reason: String },

    /// Completion feedback that cannot be applied
    #[error("Invalid outcome: {0}")]
    InvalidOutcome(String),

    /// The executor refused a job
    #[error("Submit error: {0}")]
    Submit(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Plan file error
    #[error("Plan error: {0}")]
    Plan(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ReplicatorError {
    /// Structural errors end adaptive replication of a task configuration.
    ///
    /// They are surfaced to the caller and never retried by the scheduler.
    pub fn is_fatal_for_task(&self) -> bool {
        matches!(
            self,
            ReplicatorError::NoOptions(_) | ReplicatorError::Exhausted(_) | ReplicatorError::PolicyContract { .. }
        )
    }
}

/// Result type alias for Replicator operations
pub type Result<T> = std::result::Result<T, ReplicatorError>;
