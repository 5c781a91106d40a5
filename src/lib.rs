//! Replicator - adaptive replication scheduling
//!
//! Runs each task configuration many times, choosing for every replication
//! one of a finite set of candidate parameter overrides with a bandit
//! policy. Options that fail are quarantined and reported; a task
//! configuration whose options are all quarantined is exhausted.

pub mod config;
pub mod domain;
pub mod error;
pub mod executor;
pub mod feedback;
pub mod id;
pub mod manager;
pub mod options;
pub mod plan;
pub mod policy;
pub mod replication;
pub mod scheduler;

mod sync;

pub use error::{ReplicatorError, Result};
