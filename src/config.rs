//! Replicator configuration.
//!
//! Loaded from `.replicator.yml` or `~/.config/replicator/replicator.yml`.

use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::policy::PolicyKind;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Worker pool and replication defaults.
    pub scheduler: SchedulerConfig,

    /// Bandit policy selection.
    pub policy: PolicyConfig,

    /// Completion feedback handling.
    pub feedback: FeedbackConfig,

    /// Failure report sink.
    pub reporter: ReporterConfig,
}

impl Config {
    /// Load configuration with fallback chain.
    ///
    /// Search order:
    /// 1. Explicit path if provided
    /// 2. .replicator.yml in current directory
    /// 3. ~/.config/replicator/replicator.yml
    /// 4. Defaults
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let project_config = PathBuf::from(".replicator.yml");
        if project_config.exists() {
            match Self::load_from_file(&project_config) {
                Ok(config) => {
                    log::info!("Loaded config from .replicator.yml");
                    return Ok(config);
                }
                Err(e) => {
                    log::warn!("Failed to load .replicator.yml: {}", e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("replicator").join("replicator.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", user_config.display());
                        return Ok(config);
                    }
                    Err(e) => {
                        log::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.max_workers == 0 {
            eyre::bail!("scheduler.max-workers must be > 0");
        }
        if !(0.0..=1.0).contains(&self.policy.epsilon) {
            eyre::bail!("policy.epsilon must be within [0, 1]");
        }
        if !self.policy.exploration.is_finite() || self.policy.exploration < 0.0 {
            eyre::bail!("policy.exploration must be a finite, non-negative number");
        }
        if self.feedback.report_queue == 0 {
            eyre::bail!("feedback.report-queue must be > 0");
        }
        if self.reporter.kind == ReporterKind::Jsonl && self.reporter.path.is_none() {
            eyre::bail!("reporter.path is required for the jsonl reporter");
        }
        Ok(())
    }
}

/// Worker pool and replication defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Concurrent replications in the worker pool.
    #[serde(rename = "max-workers")]
    pub max_workers: usize,

    /// Replication floor per option when a task sets none.
    #[serde(rename = "default-min-replications")]
    pub default_min_replications: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            default_min_replications: 2,
        }
    }
}

/// Bandit policy selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub kind: PolicyKind,

    /// Exploration probability for epsilon-greedy.
    pub epsilon: f64,

    /// Confidence-bound width for ucb, in cost units.
    pub exploration: f64,

    /// Base seed; random when unset.
    pub seed: Option<u64>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            kind: PolicyKind::default(),
            epsilon: 0.1,
            exploration: 1.0,
            seed: None,
        }
    }
}

/// What to do with a success that carries a negative or non-finite cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvalidCostAction {
    /// Treat it as a failed replication and quarantine the option
    #[default]
    Quarantine,
    /// Drop the feedback and leave the option eligible
    Discard,
}

/// Completion feedback handling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeedbackConfig {
    #[serde(rename = "invalid-cost")]
    pub invalid_cost: InvalidCostAction,

    /// Capacity of the asynchronous failure-report queue.
    #[serde(rename = "report-queue")]
    pub report_queue: usize,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            invalid_cost: InvalidCostAction::Quarantine,
            report_queue: 256,
        }
    }
}

/// Failure report sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReporterKind {
    #[default]
    Log,
    Jsonl,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ReporterConfig {
    pub kind: ReporterKind,

    /// JSONL file receiving quarantine reports.
    pub path: Option<PathBuf>,
}
