//! Feedback from finished replications.
//!
//! This module provides:
//! - **FeedbackCollector**: applies completion results to the owning record;
//!   failures quarantine the option and produce a [`QuarantineReport`].
//! - **ReportDispatcher**: a bounded queue drained by a background tokio task
//!   that hands reports to a [`FailureReporter`]. Reporting is fire-and-forget:
//!   a slow or failing reporter never delays or fails the feedback path.
//! - **Reporters**: [`LogReporter`] (tracing), [`JsonlReporter`] (append-only
//!   file) and [`MemoryReporter`] (in-process, for embedding and tests).

mod collector;
mod dispatch;
mod jsonl;
mod report;
mod reporter;

pub use collector::{FeedbackCollector, FeedbackOutcome};
pub use dispatch::ReportDispatcher;
pub use jsonl::JsonlReporter;
pub use report::QuarantineReport;
pub use reporter::{FailureReporter, LogReporter, MemoryReporter};

use std::sync::Arc;

use crate::config::{ReporterConfig, ReporterKind};
use crate::error::{ReplicatorError, Result};

/// Build the reporter selected by configuration.
pub fn reporter_for(config: &ReporterConfig) -> Result<Arc<dyn FailureReporter>> {
    match config.kind {
        ReporterKind::Log => Ok(Arc::new(LogReporter)),
        ReporterKind::Jsonl => {
            let path = config
                .path
                .as_ref()
                .ok_or_else(|| ReplicatorError::Config("reporter.path is required for the jsonl reporter".to_string()))?;
            Ok(Arc::new(JsonlReporter::new(path)?))
        }
    }
}
