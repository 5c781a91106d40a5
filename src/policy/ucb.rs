//! Confidence-bound selection on costs.
//!
//! UCB1 turned around for costs: minimise `mean_i - c * sqrt(ln(n) / n_i)`,
//! where `n` is the total number of costs received and `n_i` those of option
//! `i`. Options below the warm-up floor, or without any cost yet, are
//! explored first (least-dispatched wins), so an untried option always gets
//! its turn before exploitation starts.

use std::sync::Mutex;

use super::{ArmTable, BanditPolicy, PolicyError};
use crate::sync::lock;

/// Default exploration constant (sqrt(2)).
pub const DEFAULT_EXPLORATION: f64 = std::f64::consts::SQRT_2;

/// Lower-confidence-bound bandit over costs.
#[derive(Debug)]
pub struct UcbPolicy {
    exploration: f64,
    table: Mutex<ArmTable>,
}

impl UcbPolicy {
    pub fn new(exploration: f64) -> Self {
        Self {
            exploration: if exploration.is_finite() && exploration >= 0.0 {
                exploration
            } else {
                DEFAULT_EXPLORATION
            },
            table: Mutex::new(ArmTable::default()),
        }
    }

    pub fn exploration(&self) -> f64 {
        self.exploration
    }

    fn score(&self, table: &ArmTable, index: usize) -> Option<f64> {
        let arm = table.get(index)?;
        let mean = arm.mean_cost()?;
        let ln_n = (table.total_rewards().max(1) as f64).ln();
        Some(mean - self.exploration * (ln_n / arm.rewards as f64).sqrt())
    }
}

impl Default for UcbPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_EXPLORATION)
    }
}

impl BanditPolicy for UcbPolicy {
    fn init(&mut self, num_options: usize, min_reps: usize) -> Result<(), PolicyError> {
        lock(&self.table).init(num_options, min_reps)
    }

    fn next_choice(&self) -> Option<usize> {
        let mut table = lock(&self.table);

        let choice = match table.warm_up_candidate() {
            Some(i) => i,
            None => {
                let eligible = table.eligible();
                let untried = eligible
                    .iter()
                    .copied()
                    .filter(|&i| table.get(i).is_some_and(|a| a.rewards == 0))
                    .min_by_key(|&i| (table.get(i).map(|a| a.dispatched).unwrap_or(0), i));

                match untried {
                    Some(i) => i,
                    None => {
                        let mut best: Option<(usize, f64)> = None;
                        for &i in &eligible {
                            let Some(score) = self.score(&table, i) else {
                                continue;
                            };
                            if best.is_none_or(|(_, b)| score < b) {
                                best = Some((i, score));
                            }
                        }
                        best?.0
                    }
                }
            }
        };

        table.record_dispatch(choice);
        Some(choice)
    }

    fn receive_reward(&self, index: usize, cost: f64) {
        lock(&self.table).record_reward(index, cost);
    }

    fn quarantine(&self, index: usize) {
        lock(&self.table).quarantine(index);
    }

    fn name(&self) -> &'static str {
        "ucb"
    }
}
