//! ε-greedy selection on mean cost.
//!
//! Selection order:
//! 1. Warm-up: any eligible option dispatched fewer than `min_reps` times,
//!    least-dispatched first. Dispatches count, not rewards, so a burst of
//!    concurrent scheduling spreads across options instead of piling onto one.
//! 2. With probability ε, a uniformly random eligible option.
//! 3. Otherwise the eligible option with the lowest mean cost. Options with
//!    no cost yet fall back to least-dispatched.
//!
//! Seedable so selection is reproducible in tests.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{ArmTable, BanditPolicy, PolicyError};
use crate::sync::lock;

#[derive(Debug)]
struct State {
    table: ArmTable,
    rng: StdRng,
}

/// ε-greedy bandit over costs (lower is better).
#[derive(Debug)]
pub struct EpsilonGreedyPolicy {
    epsilon: f64,
    state: Mutex<State>,
}

impl EpsilonGreedyPolicy {
    /// Create a policy with a deterministic fixed seed (0).
    pub fn new(epsilon: f64) -> Self {
        Self::with_seed(epsilon, 0)
    }

    /// Create a policy with a fixed seed (reproducible).
    pub fn with_seed(epsilon: f64, seed: u64) -> Self {
        Self {
            epsilon: if epsilon.is_finite() { epsilon.clamp(0.0, 1.0) } else { 0.0 },
            state: Mutex::new(State {
                table: ArmTable::default(),
                rng: StdRng::seed_from_u64(seed),
            }),
        }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Snapshot of the per-option statistics.
    pub fn table(&self) -> ArmTable {
        lock(&self.state).table.clone()
    }
}

impl BanditPolicy for EpsilonGreedyPolicy {
    fn init(&mut self, num_options: usize, min_reps: usize) -> Result<(), PolicyError> {
        lock(&self.state).table.init(num_options, min_reps)
    }

    fn next_choice(&self) -> Option<usize> {
        let mut guard = lock(&self.state);
        let state = &mut *guard;

        let choice = if let Some(i) = state.table.warm_up_candidate() {
            i
        } else {
            let eligible = state.table.eligible();
            if eligible.is_empty() {
                return None;
            }
            if state.rng.random_bool(self.epsilon) {
                eligible[state.rng.random_range(0..eligible.len())]
            } else {
                state
                    .table
                    .best_mean()
                    .or_else(|| state.table.least_dispatched())?
            }
        };

        state.table.record_dispatch(choice);
        Some(choice)
    }

    fn receive_reward(&self, index: usize, cost: f64) {
        lock(&self.state).table.record_reward(index, cost);
    }

    fn quarantine(&self, index: usize) {
        lock(&self.state).table.quarantine(index);
    }

    fn name(&self) -> &'static str {
        "epsilon-greedy"
    }
}
