//! Single consumer of the result channel.

use std::io::{self, Write};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::database::ResultSink;
use crate::monitoring::types::Observation;

/// Counters returned once the channel is closed and drained
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterReport {
    pub persisted: u64,
    pub dropped: u64,
}

/// Appends observations to the sink strictly in channel order.
///
/// A failed append is logged and the observation dropped; the next one is
/// handled as usual. There is no retry.
pub struct ResultWriter {
    sink: Arc<dyn ResultSink>,
    target: Arc<str>,
}

impl ResultWriter {
    pub fn new(sink: Arc<dyn ResultSink>, target: impl Into<Arc<str>>) -> Self {
        Self { sink, target: target.into() }
    }

    pub fn spawn(self, result_rx: mpsc::Receiver<Observation>) -> JoinHandle<WriterReport> {
        tokio::spawn(self.run(result_rx, io::stdout()))
    }

    /// Drain `result_rx` until every sender is gone, printing one status line
    /// per persisted observation to `out`.
    pub async fn run<W: Write>(
        self,
        mut result_rx: mpsc::Receiver<Observation>,
        mut out: W,
    ) -> WriterReport {
        let mut report = WriterReport::default();

        while let Some(observation) = result_rx.recv().await {
            match self.sink.append(&observation).await {
                Ok(id) => {
                    report.persisted += 1;
                    debug!(id, host = %self.target, "Observation persisted");

                    if let Err(e) = writeln!(out, "{}", observation.status_line()) {
                        error!("Failed to write status line: {}", e);
                    }
                }
                Err(e) => {
                    report.dropped += 1;
                    error!(
                        host = %self.target,
                        operation = "append observation",
                        timestamp = %observation.timestamp(),
                        success = observation.is_success(),
                        "Failed to persist observation, dropping it: {:#}",
                        e
                    );
                }
            }
        }

        info!(
            persisted = report.persisted,
            dropped = report.dropped,
            "Result channel closed, writer finished"
        );
        report
    }
}
