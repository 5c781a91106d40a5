//! Replication record for a single task configuration.

use std::collections::BTreeSet;
use std::sync::Mutex;

use serde::Serialize;

use crate::domain::{CandidateOption, Params, TaskConfig, TaskConfigId};
use crate::error::{ReplicatorError, Result};
use crate::id::now_ms;
use crate::policy::BanditPolicy;
use crate::sync::lock;

/// What `register_outcome` tells the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeSignal {
    /// A cost was appended to the option's history
    Recorded,
    /// The option is quarantined; the failure must be reported
    Quarantined {
        /// False when an in-flight replication failed on an already quarantined option
        newly: bool,
        /// Every option of the record is now quarantined
        exhausted: bool,
    },
}

impl OutcomeSignal {
    pub fn requires_report(&self) -> bool {
        matches!(self, OutcomeSignal::Quarantined { .. })
    }
}

#[derive(Debug)]
struct RecordState {
    history: Vec<Vec<f64>>,
    failures: Vec<u64>,
    quarantined: BTreeSet<usize>,
    executed_reps: u64,
    min_remaining_reps: usize,
}

/// Options, cost history, quarantine set and policy for one task configuration.
pub struct ReplicationRecord {
    task: TaskConfigId,
    options: Vec<CandidateOption>,
    baseline: Params,
    policy: Box<dyn BanditPolicy>,
    state: Mutex<RecordState>,
    generation: u64,
    created_at: u64,
}

impl std::fmt::Debug for ReplicationRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicationRecord")
            .field("task", &self.task)
            .field("options", &self.options.len())
            .field("policy", &self.policy.name())
            .field("generation", &self.generation)
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl ReplicationRecord {
    /// Build a record and initialize its policy.
    ///
    /// Fails with `NoOptions` for an empty option list and with
    /// `PolicyContract` if the policy refuses initialization.
    pub fn new(
        task: &TaskConfig,
        options: Vec<CandidateOption>,
        mut policy: Box<dyn BanditPolicy>,
        min_reps: usize,
    ) -> Result<Self> {
        if options.is_empty() {
            return Err(ReplicatorError::NoOptions(task.id.clone()));
        }

        policy
            .init(options.len(), min_reps)
            .map_err(|e| ReplicatorError::PolicyContract {
                task: task.id.clone(),
                detail: e.to_string(),
            })?;

        let n = options.len();
        Ok(Self {
            task: task.id.clone(),
            baseline: task.baseline.clone(),
            options,
            policy,
            state: Mutex::new(RecordState {
                history: vec![Vec::new(); n],
                failures: vec![0; n],
                quarantined: BTreeSet::new(),
                executed_reps: 0,
                min_remaining_reps: min_reps.saturating_mul(n),
            }),
            generation: 0,
            created_at: now_ms(),
        })
    }

    /// Tag the record with the registry generation it was created in.
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    /// Distinguishes this record from earlier ones for the same task that
    /// were forgotten. Jobs carry it so late feedback can be matched.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn task(&self) -> &TaskConfigId {
        &self.task
    }

    pub fn options(&self) -> &[CandidateOption] {
        &self.options
    }

    /// The task's original parameters, shared by every replication.
    pub fn baseline(&self) -> &Params {
        &self.baseline
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Ask the policy for the next option and validate its answer.
    ///
    /// The record lock is held across the policy call so a concurrent
    /// quarantine cannot slip between the choice and its validation.
    pub fn next_option(&self) -> Result<(usize, &CandidateOption)> {
        let state = lock(&self.state);
        let n = self.options.len();

        if state.quarantined.len() >= n {
            return Err(ReplicatorError::Exhausted(self.task.clone()));
        }

        let Some(index) = self.policy.next_choice() else {
            tracing::error!(task = %self.task, policy = self.policy.name(), "Policy gave no choice with options eligible");
            return Err(ReplicatorError::PolicyContract {
                task: self.task.clone(),
                detail: format!(
                    "no choice returned while {} of {} options remain eligible",
                    n - state.quarantined.len(),
                    n
                ),
            });
        };

        if index >= n {
            tracing::error!(task = %self.task, option = index, "Policy returned out-of-range option");
            return Err(ReplicatorError::PolicyContract {
                task: self.task.clone(),
                detail: format!("option index {} out of range (0..{})", index, n),
            });
        }

        if state.quarantined.contains(&index) {
            tracing::error!(task = %self.task, option = index, "Policy returned quarantined option");
            return Err(ReplicatorError::PolicyContract {
                task: self.task.clone(),
                detail: format!("option index {} is quarantined", index),
            });
        }

        tracing::debug!(task = %self.task, option = index, "Option selected");
        Ok((index, &self.options[index]))
    }

    /// Apply the outcome of one replication of option `index`.
    ///
    /// A failure quarantines the option (idempotently) and asks the caller to
    /// report it; a success appends `cost` to the option's history. Both count
    /// as an executed replication.
    pub fn register_outcome(&self, index: usize, cost: f64, failed: bool) -> Result<OutcomeSignal> {
        let n = self.options.len();
        if index >= n {
            return Err(ReplicatorError::InvalidOutcome(format!(
                "option index {} out of range for {} (0..{})",
                index, self.task, n
            )));
        }
        if !failed && (!cost.is_finite() || cost < 0.0) {
            return Err(ReplicatorError::InvalidOutcome(format!(
                "cost {} for {} option {} is not a finite, non-negative number",
                cost, self.task, index
            )));
        }

        let mut state = lock(&self.state);
        state.executed_reps += 1;
        state.min_remaining_reps = state.min_remaining_reps.saturating_sub(1);

        if failed {
            state.failures[index] += 1;
            let newly = state.quarantined.insert(index);
            self.policy.quarantine(index);
            let exhausted = state.quarantined.len() >= n;
            if newly {
                tracing::warn!(
                    task = %self.task,
                    option = index,
                    name = %self.options[index].name,
                    remaining = n - state.quarantined.len(),
                    "Option quarantined"
                );
            }
            if newly && exhausted {
                tracing::error!(task = %self.task, "Every option quarantined");
            }
            Ok(OutcomeSignal::Quarantined { newly, exhausted })
        } else {
            state.history[index].push(cost);
            self.policy.receive_reward(index, cost);
            Ok(OutcomeSignal::Recorded)
        }
    }

    /// Costs observed for option `index`, in arrival order.
    pub fn history(&self, index: usize) -> Vec<f64> {
        lock(&self.state).history.get(index).cloned().unwrap_or_default()
    }

    pub fn history_len(&self, index: usize) -> usize {
        lock(&self.state).history.get(index).map(Vec::len).unwrap_or(0)
    }

    /// Mean observed cost for option `index`.
    pub fn mean_cost(&self, index: usize) -> Option<f64> {
        let state = lock(&self.state);
        mean(state.history.get(index)?)
    }

    pub fn executed_reps(&self) -> u64 {
        lock(&self.state).executed_reps
    }

    pub fn min_remaining_reps(&self) -> usize {
        lock(&self.state).min_remaining_reps
    }

    pub fn quarantined(&self) -> BTreeSet<usize> {
        lock(&self.state).quarantined.clone()
    }

    pub fn is_quarantined(&self, index: usize) -> bool {
        lock(&self.state).quarantined.contains(&index)
    }

    /// Every option has been quarantined.
    pub fn is_exhausted(&self) -> bool {
        lock(&self.state).quarantined.len() >= self.options.len()
    }

    /// Consistent view of the record for reporting.
    pub fn snapshot(&self) -> RecordSnapshot {
        let state = lock(&self.state);
        let options = self
            .options
            .iter()
            .enumerate()
            .map(|(i, option)| OptionSnapshot {
                index: i,
                name: option.name.clone(),
                replications: state.history[i].len(),
                failures: state.failures[i],
                mean_cost: mean(&state.history[i]),
                quarantined: state.quarantined.contains(&i),
            })
            .collect();

        RecordSnapshot {
            task: self.task.clone(),
            policy: self.policy.name().to_string(),
            options,
            executed_reps: state.executed_reps,
            min_remaining_reps: state.min_remaining_reps,
            exhausted: state.quarantined.len() >= self.options.len(),
        }
    }
}

fn mean(costs: &[f64]) -> Option<f64> {
    if costs.is_empty() {
        None
    } else {
        Some(costs.iter().sum::<f64>() / costs.len() as f64)
    }
}

/// Per-option summary inside a [`RecordSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionSnapshot {
    pub index: usize,
    pub name: String,
    /// Successful replications (history length)
    pub replications: usize,
    pub failures: u64,
    pub mean_cost: Option<f64>,
    pub quarantined: bool,
}

/// Point-in-time summary of a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordSnapshot {
    pub task: TaskConfigId,
    pub policy: String,
    pub options: Vec<OptionSnapshot>,
    pub executed_reps: u64,
    pub min_remaining_reps: usize,
    pub exhausted: bool,
}

impl RecordSnapshot {
    /// Non-quarantined option with the lowest mean cost.
    pub fn best_option(&self) -> Option<&OptionSnapshot> {
        self.options
            .iter()
            .filter(|o| !o.quarantined)
            .filter_map(|o| o.mean_cost.map(|m| (o, m)))
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(o, _)| o)
    }
}
