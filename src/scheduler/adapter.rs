//! Applies a candidate option to a task's baseline parameters.

use serde_json::{Map, Value};

use crate::domain::{CandidateOption, Params};

/// Produces the concrete parameters of one replication.
///
/// Overrides are deep-merged onto a copy of the baseline: nested objects
/// merge key by key, anything else in the option replaces the baseline
/// value. Neither input is modified.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionAdapter;

impl ExecutionAdapter {
    pub fn new() -> Self {
        Self
    }

    pub fn adapt(&self, baseline: &Params, option: &CandidateOption) -> Params {
        let mut merged = baseline.as_map().clone();
        merge_into(&mut merged, option.overrides.as_map());
        Params::from(merged)
    }
}

fn merge_into(target: &mut Map<String, Value>, overrides: &Map<String, Value>) {
    for (key, value) in overrides {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(nested)) => merge_into(existing, nested),
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}
