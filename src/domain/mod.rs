//! Domain types for Replicator
//!
//! This module contains all core domain types:
//! - TaskConfigId / TaskConfig: a logical unit of work replicated many times
//! - Params: nested execution parameters (baseline and overrides)
//! - CandidateOption: one arm competing for selection
//! - ReplicationResult: outcome of one replication (cost or failure)
//! - ReplicationJob / CompletionEvent: what is dispatched and what comes back

pub mod job;
pub mod option;
pub mod outcome;
pub mod params;
pub mod task;

pub use job::{CompletionEvent, ReplicationJob};
pub use option::CandidateOption;
pub use outcome::{FailureCause, ReplicationResult};
pub use params::Params;
pub use task::{TaskConfig, TaskConfigId};
