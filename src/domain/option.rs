//! Candidate options (arms).

use serde::{Deserialize, Serialize};

use super::params::Params;

/// One immutable parameter-override bundle competing for selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateOption {
    /// Human-readable label.
    pub name: String,

    /// Sub-components this option involves, named in failure reports.
    #[serde(default)]
    pub factories: Vec<String>,

    /// Overrides merged onto the task baseline.
    #[serde(default)]
    pub overrides: Params,
}

impl CandidateOption {
    pub fn new(name: impl Into<String>, overrides: Params) -> Self {
        Self {
            name: name.into(),
            factories: Vec::new(),
            overrides,
        }
    }

    pub fn with_factories(mut self, factories: Vec<String>) -> Self {
        self.factories = factories;
        self
    }
}
