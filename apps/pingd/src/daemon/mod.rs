//! Daemon wiring: storage, prober, scheduler and writer.
//!
//! ```text
//! timer ─tick─▶ MonitoringScheduler ─spawn─▶ ProbeExecutor (≤ max_concurrent)
//!                                                   │ Observation
//!                                                   ▼
//!                                       mpsc (capacity 100)
//!                                                   │
//!                                                   ▼
//!                                   ResultWriter ─append─▶ ResultSink
//! ```

pub mod writer;

#[cfg(test)]
mod tests;

pub use writer::{ResultWriter, WriterReport};

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use crate::config::Config;
use crate::database::{PingStore, ResultSink};
use crate::lifecycle::ShutdownSignal;
use crate::lifecycle::privilege::ensure_privileged;
use crate::monitoring::checker::{Prober, build_prober};
use crate::monitoring::scheduler::SchedulerReport;
use crate::monitoring::types::Observation;
use crate::monitoring::{MonitoringScheduler, ProbeExecutor};

/// Slack between probe attempts and the writer. With one attempt in flight
/// at a time this is headroom, not backpressure.
pub const RESULT_CHANNEL_CAPACITY: usize = 100;

/// A fully initialized daemon, ready to start ticking
pub struct Daemon {
    config: Config,
    prober: Arc<dyn Prober>,
    sink: Arc<dyn ResultSink>,
}

impl Daemon {
    /// Assemble a daemon from already-built collaborators
    pub fn new(config: Config, prober: Arc<dyn Prober>, sink: Arc<dyn ResultSink>) -> Self {
        Self { config, prober, sink }
    }

    /// Run every startup step that can fail: privilege check, storage and
    /// schema, prober construction. Errors here are fatal.
    pub async fn open(config: Config) -> Result<Self> {
        ensure_privileged(config.probe.method)?;

        info!("Opening database {}", config.storage.path.display());
        let store = PingStore::open(&config.storage.path).await?;

        let prober = build_prober(config.probe.method)
            .with_context(|| format!("Failed to set up the {} prober", config.probe.method))?;

        Ok(Self::new(config, prober, Arc::new(store)))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Probe until `shutdown` fires, then drain and return the final counts
    pub async fn run(self, shutdown: ShutdownSignal) -> SchedulerReport {
        let target: Arc<str> = Arc::from(self.config.probe.target.as_str());
        let (result_tx, result_rx) = mpsc::channel::<Observation>(RESULT_CHANNEL_CAPACITY);

        let writer = ResultWriter::new(self.sink, Arc::clone(&target)).spawn(result_rx);
        let executor = Arc::new(ProbeExecutor::new(self.prober, target, self.config.interval()));
        let scheduler =
            MonitoringScheduler::new(executor, self.config.scheduler_config(), result_tx);

        scheduler.run(shutdown, writer).await
    }
}
