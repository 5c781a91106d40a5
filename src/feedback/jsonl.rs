//! Append-only JSONL failure log.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::report::QuarantineReport;
use super::reporter::FailureReporter;
use crate::error::Result;

/// Appends one JSON line per report.
#[derive(Debug, Clone)]
pub struct JsonlReporter {
    path: PathBuf,
}

impl JsonlReporter {
    /// Create the reporter, making the parent directory if needed.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every report in a JSONL file; a missing file reads as empty.
    ///
    /// Lines that do not decode are skipped with a warning so one bad entry
    /// does not hide the rest of the log.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<QuarantineReport>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(path)?);
        let mut reports = Vec::new();
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(report) => reports.push(report),
                Err(e) => tracing::warn!(path = %path.display(), line = number + 1, error = %e, "Skipping undecodable report"),
            }
        }
        Ok(reports)
    }

    fn append(&self, report: &QuarantineReport) -> Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", serde_json::to_string(report)?)?;
        Ok(())
    }
}

#[async_trait]
impl FailureReporter for JsonlReporter {
    async fn report(&self, report: &QuarantineReport) -> Result<()> {
        self.append(report)
    }
}
