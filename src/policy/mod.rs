//! Bandit policies for option selection.
//!
//! A [`BanditPolicy`] decides which option index a task configuration should
//! try next and learns from cost feedback. The scheduler treats it as a black
//! box that is safe to call concurrently; every bundled policy guards its own
//! state.
//!
//! Contract:
//! - `init` is called exactly once, before anything else, with `num_options > 0`.
//! - `next_choice` never returns a quarantined index; it returns `None` once
//!   every index is quarantined. Repeated calls without intervening feedback
//!   may return the same index.
//! - `receive_reward` takes a cost (lower is better, never negative).
//! - `quarantine` is idempotent.
//!
//! Bundled policies:
//! - [`RoundRobinPolicy`]: cycles through eligible options.
//! - [`EpsilonGreedyPolicy`]: warm-up, then exploit lowest mean cost with ε exploration.
//! - [`UcbPolicy`]: lower confidence bound on mean cost.

mod arms;
mod epsilon_greedy;
mod round_robin;
mod ucb;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::PolicyConfig;
use crate::id::derive_seed;

pub use arms::{ArmStats, ArmTable};
pub use epsilon_greedy::EpsilonGreedyPolicy;
pub use round_robin::RoundRobinPolicy;
pub use ucb::UcbPolicy;

/// Errors a policy may raise during initialization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("policy already initialized")]
    AlreadyInitialized,

    #[error("policy needs at least one option")]
    NoOptions,
}

/// Pluggable exploration/exploitation strategy over a fixed option set.
pub trait BanditPolicy: Send + Sync {
    /// Bind the policy to `num_options` options with an advisory replication floor.
    fn init(&mut self, num_options: usize, min_reps: usize) -> Result<(), PolicyError>;

    /// Index of the option to try next, or `None` if every option is quarantined.
    fn next_choice(&self) -> Option<usize>;

    /// Absorb the cost observed for one replication of `index`.
    fn receive_reward(&self, index: usize, cost: f64);

    /// Permanently exclude `index` from selection.
    fn quarantine(&self, index: usize);

    /// Policy name for logs.
    fn name(&self) -> &'static str {
        "custom"
    }
}

/// Produces a fresh policy instance per task configuration.
pub type PolicyFactory = Arc<dyn Fn() -> Box<dyn BanditPolicy> + Send + Sync>;

/// Which bundled policy to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    RoundRobin,
    #[default]
    EpsilonGreedy,
    Ucb,
}

impl PolicyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyKind::RoundRobin => "round-robin",
            PolicyKind::EpsilonGreedy => "epsilon-greedy",
            PolicyKind::Ucb => "ucb",
        }
    }
}

/// Build a policy factory from configuration.
///
/// Each produced policy gets its own seed derived from the configured one,
/// so task configurations never share a random stream.
pub fn factory_for(config: &PolicyConfig) -> PolicyFactory {
    let config = config.clone();
    let base_seed = config.seed.unwrap_or_else(rand::random);
    let sequence = Arc::new(AtomicU64::new(0));

    Arc::new(move || -> Box<dyn BanditPolicy> {
        let seed = derive_seed(base_seed, sequence.fetch_add(1, Ordering::Relaxed));
        match config.kind {
            PolicyKind::RoundRobin => Box::new(RoundRobinPolicy::new()),
            PolicyKind::EpsilonGreedy => Box::new(EpsilonGreedyPolicy::with_seed(config.epsilon, seed)),
            PolicyKind::Ucb => Box::new(UcbPolicy::new(config.exploration)),
        }
    })
}
