//! Replication outcome types.
//!
//! This module defines the result of a single replication as observed by
//! the executor and fed back to the scheduler.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a replication failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureCause {
    /// The executed work reported an error
    Error(String),
    /// The work completed but reported an unusable cost
    InvalidCost(#[serde(with = "cost_repr")] f64),
    /// The work did not finish within its time limit (milliseconds)
    Timeout(u64),
    /// The work panicked or its task was aborted
    Crashed(String),
}

impl FailureCause {
    /// Short category name used in logs and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCause::Error(_) => "error",
            FailureCause::InvalidCost(_) => "invalid_cost",
            FailureCause::Timeout(_) => "timeout",
            FailureCause::Crashed(_) => "crashed",
        }
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::Error(msg) => write!(f, "error: {}", msg),
            FailureCause::InvalidCost(cost) => write!(f, "invalid cost: {}", cost),
            FailureCause::Timeout(ms) => write!(f, "timed out after {}ms", ms),
            FailureCause::Crashed(msg) => write!(f, "crashed: {}", msg),
        }
    }
}

/// JSON has no NaN or infinity, so non-finite costs travel as strings
/// (`"NaN"`, `"inf"`, `"-inf"`) and finite ones as plain numbers.
mod cost_repr {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(cost: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if cost.is_finite() {
            serializer.serialize_f64(*cost)
        } else {
            serializer.serialize_str(&cost.to_string())
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(cost) => Ok(cost),
            Repr::Text(text) => text
                .parse()
                .map_err(|_| D::Error::custom(format!("invalid cost {:?}", text))),
        }
    }
}

/// Outcome of one replication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReplicationResult {
    /// Completed with a cost (lower is better)
    Success { cost: f64 },
    /// Failed outright
    Failure { cause: FailureCause },
}

impl ReplicationResult {
    pub fn success(cost: f64) -> Self {
        ReplicationResult::Success { cost }
    }

    pub fn failure(cause: FailureCause) -> Self {
        ReplicationResult::Failure { cause }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ReplicationResult::Failure { .. })
    }

    /// The reported cost, if the replication succeeded.
    pub fn cost(&self) -> Option<f64> {
        match self {
            ReplicationResult::Success { cost } => Some(*cost),
            ReplicationResult::Failure { .. } => None,
        }
    }

    /// A success whose cost is negative or not finite.
    pub fn has_invalid_cost(&self) -> bool {
        self.cost().is_some_and(|c| !c.is_finite() || c < 0.0)
    }
}
