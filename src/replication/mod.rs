//! Per-task replication state.
//!
//! - **ReplicationRecord**: options, cost history, quarantine set and the bound
//!   policy for one task configuration.
//! - **ReplicationRegistry**: thread-safe map from task configuration to its
//!   record, with at-most-once record construction per id.
//!
//! # Locking
//!
//! The registry map lock is held only to fetch or insert a per-id slot. Record
//! construction (option generation, policy init) runs outside it, serialized
//! per id by the slot itself. Each record then has its own lock covering its
//! history, quarantine set and the policy calls that must stay consistent
//! with them.

mod record;
mod registry;

use std::sync::Arc;

use crate::domain::TaskConfig;

pub use record::{OptionSnapshot, OutcomeSignal, RecordSnapshot, ReplicationRecord};
pub use registry::ReplicationRegistry;

/// Advisory replication floor for a task configuration.
pub type MinReplicationsFn = Arc<dyn Fn(&TaskConfig) -> usize + Send + Sync>;

/// Floor from the task itself, falling back to `default`.
pub fn min_replications_or(default: usize) -> MinReplicationsFn {
    Arc::new(move |task: &TaskConfig| task.min_replications.unwrap_or(default))
}
