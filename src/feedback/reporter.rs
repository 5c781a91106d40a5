//! Failure reporter trait and simple reporters.

use std::sync::Mutex;

use async_trait::async_trait;

use super::report::QuarantineReport;
use crate::error::Result;
use crate::sync::lock;

/// Receives failure reports off the feedback path.
///
/// Called from the dispatcher's background task, one report at a time. An
/// error is logged and otherwise ignored.
#[async_trait]
pub trait FailureReporter: Send + Sync {
    async fn report(&self, report: &QuarantineReport) -> Result<()>;
}

/// Writes each report to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

#[async_trait]
impl FailureReporter for LogReporter {
    async fn report(&self, report: &QuarantineReport) -> Result<()> {
        tracing::warn!(
            task = %report.task,
            option = report.option_index,
            name = %report.option_name,
            factories = %report.involved_factories.join(","),
            cause = %report.cause,
            newly = report.newly_quarantined,
            exhausted = report.exhausted,
            "Replication failure"
        );
        Ok(())
    }
}

/// Keeps reports in memory.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    reports: Mutex<Vec<QuarantineReport>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports received so far, in arrival order.
    pub fn reports(&self) -> Vec<QuarantineReport> {
        lock(&self.reports).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.reports).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl FailureReporter for MemoryReporter {
    async fn report(&self, report: &QuarantineReport) -> Result<()> {
        lock(&self.reports).push(report.clone());
        Ok(())
    }
}
