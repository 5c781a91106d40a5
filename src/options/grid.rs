//! Cartesian-product option grids.
//!
//! Each axis names a parameter path and its alternatives. The generated
//! options cover every combination, first axis varying slowest, so the same
//! grid always yields the same ordering.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::OptionGenerator;
use crate::domain::{CandidateOption, Params, TaskConfig};
use crate::error::{ReplicatorError, Result};

/// One dimension of a grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridAxis {
    /// Dotted parameter path, e.g. `solver.tolerance`.
    pub path: String,
    /// Alternatives for that path.
    pub values: Vec<Value>,
}

impl GridAxis {
    pub fn new(path: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            path: path.into(),
            values,
        }
    }
}

/// Generates one option per combination of axis values.
#[derive(Debug, Clone, Default)]
pub struct GridOptionGenerator {
    axes: Vec<GridAxis>,
}

impl GridOptionGenerator {
    pub fn new(axes: Vec<GridAxis>) -> Self {
        Self { axes }
    }

    /// Number of options the grid produces, `None` if it overflows `usize`.
    pub fn size(&self) -> Option<usize> {
        self.axes
            .iter()
            .try_fold(1usize, |acc, axis| acc.checked_mul(axis.values.len()))
    }

    /// Expand the grid without going through the async trait.
    pub fn expand(&self) -> Vec<CandidateOption> {
        let mut combos: Vec<Vec<(&str, &Value)>> = vec![Vec::new()];
        for axis in &self.axes {
            let mut next = Vec::with_capacity(combos.len() * axis.values.len());
            for combo in &combos {
                for value in &axis.values {
                    let mut extended = combo.clone();
                    extended.push((axis.path.as_str(), value));
                    next.push(extended);
                }
            }
            combos = next;
        }

        combos
            .into_iter()
            .map(|combo| {
                let mut overrides = Params::new();
                let mut labels = Vec::with_capacity(combo.len());
                for (path, value) in combo {
                    overrides.set_path(path, value.clone());
                    labels.push(format!("{}={}", path, render(value)));
                }
                let name = if labels.is_empty() {
                    "baseline".to_string()
                } else {
                    labels.join(",")
                };
                CandidateOption::new(name, overrides).with_factories(labels)
            })
            .collect()
    }
}

#[async_trait]
impl OptionGenerator for GridOptionGenerator {
    async fn generate(&self, task: &TaskConfig) -> Result<Vec<CandidateOption>> {
        if self.size().is_none() {
            return Err(ReplicatorError::OptionGeneration {
                task: task.id.clone(),
                reason: "grid has too many combinations".to_string(),
            });
        }
        Ok(self.expand())
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
