//! Asynchronous hand-off of failure reports.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::report::QuarantineReport;
use super::reporter::FailureReporter;

enum DispatchMsg {
    Report(Box<QuarantineReport>),
    Flush(oneshot::Sender<()>),
}

/// Sending side of the report queue.
///
/// `dispatch` never waits: a full queue drops the report with a warning.
#[derive(Clone)]
pub struct ReportDispatcher {
    tx: mpsc::Sender<DispatchMsg>,
    dropped: Arc<AtomicU64>,
}

impl ReportDispatcher {
    /// Start the background task feeding `reporter`.
    ///
    /// Must be called inside a tokio runtime. The task ends once every
    /// dispatcher clone is dropped and the queue is drained.
    pub fn spawn(reporter: Arc<dyn FailureReporter>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel(capacity.max(1));

        let handle = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                match msg {
                    DispatchMsg::Report(report) => {
                        if let Err(e) = reporter.report(&report).await {
                            tracing::warn!(
                                task = %report.task,
                                option = report.option_index,
                                error = %e,
                                "Failure reporter error"
                            );
                        }
                    }
                    DispatchMsg::Flush(ack) => {
                        let _ = ack.send(());
                    }
                }
            }
            tracing::debug!("Report dispatcher stopped");
        });

        (
            Self {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            handle,
        )
    }

    /// Queue `report` without waiting. Returns false if it was dropped.
    pub fn dispatch(&self, report: QuarantineReport) -> bool {
        match self.tx.try_send(DispatchMsg::Report(Box::new(report))) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(DispatchMsg::Report(report))) => {
                self.dropped.fetch_add(1, Ordering::SeqCst);
                tracing::warn!(task = %report.task, option = report.option_index, "Report queue full, dropping failure report");
                false
            }
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::SeqCst);
                tracing::warn!("Report dispatcher stopped, dropping failure report");
                false
            }
        }
    }

    /// Wait until every report queued before this call reached the reporter.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(DispatchMsg::Flush(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
    }

    /// Reports dropped because the queue was full or closed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::SeqCst)
    }
}
