//! Adaptive scheduling of replications.
//!
//! This module provides:
//! - **AdaptiveScheduler**: resolves the record for a task configuration,
//!   asks its policy for the next option and produces a ready-to-run job.
//! - **ExecutionAdapter**: merges an option's overrides onto the task's
//!   baseline parameters without touching either.
//!
//! # Flow
//!
//! 1. `prepare` gets or creates the task's record (exactly once per id)
//! 2. The record's policy picks an eligible option
//! 3. The adapter builds the replication's parameters
//! 4. `schedule_job` hands the job to an [`Executor`](crate::executor::Executor)
//!
//! Scheduling never waits on feedback from earlier replications.

mod adapter;
mod adaptive;

pub use adapter::ExecutionAdapter;
pub use adaptive::{AdaptiveScheduler, TaskState};
