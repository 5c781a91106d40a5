//! Round-robin selection over eligible options.

use std::sync::Mutex;

use super::{ArmTable, BanditPolicy, PolicyError};
use crate::sync::lock;

#[derive(Debug, Default)]
struct State {
    table: ArmTable,
    cursor: usize,
}

/// Cycles through non-quarantined options in index order, ignoring costs.
#[derive(Debug, Default)]
pub struct RoundRobinPolicy {
    state: Mutex<State>,
}

impl RoundRobinPolicy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BanditPolicy for RoundRobinPolicy {
    fn init(&mut self, num_options: usize, min_reps: usize) -> Result<(), PolicyError> {
        lock(&self.state).table.init(num_options, min_reps)
    }

    fn next_choice(&self) -> Option<usize> {
        let mut state = lock(&self.state);
        let n = state.table.len();
        for step in 0..n {
            let candidate = (state.cursor + step) % n;
            if state.table.get(candidate).is_some_and(|a| !a.quarantined) {
                state.cursor = (candidate + 1) % n;
                state.table.record_dispatch(candidate);
                return Some(candidate);
            }
        }
        None
    }

    fn receive_reward(&self, index: usize, cost: f64) {
        lock(&self.state).table.record_reward(index, cost);
    }

    fn quarantine(&self, index: usize) {
        lock(&self.state).table.quarantine(index);
    }

    fn name(&self) -> &'static str {
        "round-robin"
    }
}
