//! Shell command workload.
//!
//! Runs the task's command with `sh -c`. The adapted parameters are passed
//! as JSON in `REPLICATOR_PARAMS`; the task id, option index, option name and
//! job id are exported too. A non-zero exit or a timeout fails the
//! replication. If the last non-empty stdout line reads `cost=<number>`, that
//! number is the replication's cost; otherwise wall-clock seconds are used.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::workload::{Workload, WorkloadOutput};
use crate::domain::{FailureCause, ReplicationJob};

/// Environment variable holding the adapted parameters as JSON.
pub const PARAMS_ENV: &str = "REPLICATOR_PARAMS";

/// Timeout applied when the task sets none (10 minutes).
pub const DEFAULT_TIMEOUT_MS: u64 = 600_000;

const STDERR_TAIL: usize = 2_000;

/// Runs `job.command` in a shell.
#[derive(Debug, Clone)]
pub struct CommandWorkload {
    default_timeout_ms: u64,
}

impl Default for CommandWorkload {
    fn default() -> Self {
        Self {
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl CommandWorkload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the timeout used when a job carries none
    pub fn default_timeout_ms(mut self, ms: u64) -> Self {
        self.default_timeout_ms = ms;
        self
    }
}

#[async_trait]
impl Workload for CommandWorkload {
    async fn run(&self, job: &ReplicationJob) -> WorkloadOutput {
        let Some(command) = job.command.as_deref() else {
            return WorkloadOutput::Failed(FailureCause::Error(format!("task {} has no command", job.task)));
        };
        let params = match job.params.to_json() {
            Ok(json) => json,
            Err(e) => return WorkloadOutput::Failed(FailureCause::Error(e.to_string())),
        };
        let timeout_ms = job.timeout_ms.unwrap_or(self.default_timeout_ms);

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .env(PARAMS_ENV, params)
            .env("REPLICATOR_TASK", job.task.as_str())
            .env("REPLICATOR_OPTION", job.option_index.to_string())
            .env("REPLICATOR_OPTION_NAME", &job.option_name)
            .env("REPLICATOR_JOB", &job.job_id)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => return WorkloadOutput::Failed(FailureCause::Error(format!("spawn failed: {}", e))),
        };

        let output = match tokio::time::timeout(Duration::from_millis(timeout_ms), child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return WorkloadOutput::Failed(FailureCause::Error(e.to_string())),
            Err(_) => {
                tracing::warn!(job = %job.job_id, timeout_ms, "Command timed out");
                return WorkloadOutput::Failed(FailureCause::Timeout(timeout_ms));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return WorkloadOutput::Failed(FailureCause::Error(format!(
                "exit code {}: {}",
                output.status.code().unwrap_or(-1),
                tail(stderr.trim(), STDERR_TAIL)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        WorkloadOutput::Completed {
            cost: parse_cost(&stdout),
        }
    }
}

/// Cost reported on the last non-empty stdout line, if any.
fn parse_cost(stdout: &str) -> Option<f64> {
    let last = stdout.lines().rev().find(|line| !line.trim().is_empty())?;
    last.trim().strip_prefix("cost=")?.trim().parse().ok()
}

fn tail(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}
