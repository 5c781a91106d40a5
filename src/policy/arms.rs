//! Per-option bookkeeping shared by the bundled policies.

use super::PolicyError;

/// Statistics for one option.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ArmStats {
    /// Times the option was handed out by `next_choice`
    pub dispatched: u64,
    /// Costs received
    pub rewards: u64,
    /// Sum of received costs
    pub cost_sum: f64,
    pub quarantined: bool,
}

impl ArmStats {
    /// Mean observed cost, `None` before the first reward.
    pub fn mean_cost(&self) -> Option<f64> {
        if self.rewards == 0 {
            None
        } else {
            Some(self.cost_sum / self.rewards as f64)
        }
    }
}

/// Option table a policy keeps behind its lock.
#[derive(Debug, Clone, Default)]
pub struct ArmTable {
    arms: Vec<ArmStats>,
    min_reps: usize,
}

impl ArmTable {
    /// Size the table; fails on a second call or an empty option set.
    pub fn init(&mut self, num_options: usize, min_reps: usize) -> Result<(), PolicyError> {
        if !self.arms.is_empty() {
            return Err(PolicyError::AlreadyInitialized);
        }
        if num_options == 0 {
            return Err(PolicyError::NoOptions);
        }
        self.arms = vec![ArmStats::default(); num_options];
        self.min_reps = min_reps;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.arms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arms.is_empty()
    }

    pub fn min_reps(&self) -> usize {
        self.min_reps
    }

    pub fn get(&self, index: usize) -> Option<&ArmStats> {
        self.arms.get(index)
    }

    /// Indices not quarantined, ascending.
    pub fn eligible(&self) -> Vec<usize> {
        self.arms
            .iter()
            .enumerate()
            .filter(|(_, a)| !a.quarantined)
            .map(|(i, _)| i)
            .collect()
    }

    /// Total costs received across options.
    pub fn total_rewards(&self) -> u64 {
        self.arms.iter().map(|a| a.rewards).sum()
    }

    /// First eligible option still below the warm-up floor, counting dispatches.
    pub fn warm_up_candidate(&self) -> Option<usize> {
        let floor = self.min_reps as u64;
        self.arms
            .iter()
            .enumerate()
            .filter(|(_, a)| !a.quarantined && a.dispatched < floor)
            .min_by_key(|(i, a)| (a.dispatched, *i))
            .map(|(i, _)| i)
    }

    /// Eligible option with the lowest mean cost; ties go to the lower index.
    pub fn best_mean(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, arm) in self.arms.iter().enumerate() {
            if arm.quarantined {
                continue;
            }
            let Some(mean) = arm.mean_cost() else {
                continue;
            };
            if best.is_none_or(|(_, b)| mean < b) {
                best = Some((i, mean));
            }
        }
        best.map(|(i, _)| i)
    }

    /// Eligible option dispatched the fewest times; ties go to the lower index.
    pub fn least_dispatched(&self) -> Option<usize> {
        self.arms
            .iter()
            .enumerate()
            .filter(|(_, a)| !a.quarantined)
            .min_by_key(|(i, a)| (a.dispatched, *i))
            .map(|(i, _)| i)
    }

    pub fn record_dispatch(&mut self, index: usize) {
        if let Some(arm) = self.arms.get_mut(index) {
            arm.dispatched += 1;
        }
    }

    pub fn record_reward(&mut self, index: usize, cost: f64) {
        if !cost.is_finite() || cost < 0.0 {
            tracing::debug!(option = index, cost, "Ignoring unusable cost");
            return;
        }
        if let Some(arm) = self.arms.get_mut(index) {
            arm.rewards += 1;
            arm.cost_sum += cost;
        }
    }

    pub fn quarantine(&mut self, index: usize) {
        if let Some(arm) = self.arms.get_mut(index) {
            arm.quarantined = true;
        }
    }
}
