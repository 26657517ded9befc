use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, TryAcquireError, mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout_at};
use tracing::{debug, error, info, warn};

use super::executor::ProbeExecutor;
use super::types::Observation;
use crate::daemon::writer::WriterReport;
use crate::lifecycle::ShutdownSignal;

/// Lifecycle of the scheduler. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Running,
    Draining,
    Stopped,
}

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A slot was free and an attempt was spawned
    Launched,
    /// Every slot was busy; this tick's probe is dropped, not queued
    Skipped,
}

/// Counters reported when the scheduler stops
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerReport {
    pub ticks: u64,
    pub launched: u64,
    pub skipped: u64,
    /// Attempts still running when the drain grace period ran out. Attempts
    /// that finished but whose result the writer had not yet stored are not
    /// counted.
    pub discarded: usize,
    /// `None` when the writer did not finish inside the grace period
    pub writer: Option<WriterReport>,
}

/// Scheduler settings, all fixed at construction
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub interval: Duration,
    pub max_concurrent: usize,
    pub grace_period: Duration,
}

/// Drives periodic probe attempts against one target.
///
/// Every tick tries to take a concurrency slot without waiting. When all
/// slots are held by attempts still in flight the tick is skipped, so a slow
/// or unreachable target lowers the effective sample rate instead of piling
/// up attempts. With the default ceiling of one slot, completion order equals
/// launch order.
///
/// On shutdown the scheduler stops ticking, releases its end of the result
/// channel and waits up to the grace period for the writer to drain what the
/// in-flight attempts produce. Anything still running after that is aborted.
pub struct MonitoringScheduler {
    executor: Arc<ProbeExecutor>,
    config: SchedulerConfig,
    slots: Arc<Semaphore>,
    result_tx: mpsc::Sender<Observation>,
    attempts: JoinSet<()>,
    state: watch::Sender<SchedulerState>,
    report: SchedulerReport,
}

impl MonitoringScheduler {
    pub fn new(
        executor: Arc<ProbeExecutor>,
        config: SchedulerConfig,
        result_tx: mpsc::Sender<Observation>,
    ) -> Self {
        let (state, _) = watch::channel(SchedulerState::Running);

        Self {
            executor,
            slots: Arc::new(Semaphore::new(config.max_concurrent)),
            config,
            result_tx,
            attempts: JoinSet::new(),
            state,
            report: SchedulerReport::default(),
        }
    }

    /// Follow state transitions from outside the scheduler task
    pub fn subscribe_state(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Number of attempts currently holding a slot
    pub fn in_flight(&self) -> usize {
        self.config.max_concurrent - self.slots.available_permits()
    }

    /// Handle one timer tick. Never waits on a slot.
    pub fn tick(&mut self) -> TickOutcome {
        self.reap_finished();
        self.report.ticks += 1;

        let permit = match Arc::clone(&self.slots).try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::NoPermits | TryAcquireError::Closed) => {
                self.report.skipped += 1;
                debug!(
                    host = %self.executor.target(),
                    skipped = self.report.skipped,
                    "All probe slots busy, skipping tick"
                );
                return TickOutcome::Skipped;
            }
        };

        let executor = Arc::clone(&self.executor);
        let result_tx = self.result_tx.clone();

        self.attempts.spawn(async move {
            // Held for the whole attempt; dropping it on any exit path frees the slot.
            let _permit = permit;
            let observation = executor.execute().await;

            if let Err(e) = result_tx.send(observation).await {
                error!(host = %executor.target(), "Failed to queue observation: {}", e);
            }
        });

        self.report.launched += 1;
        TickOutcome::Launched
    }

    /// Tick until shutdown, then drain and stop.
    ///
    /// `writer` is the join handle of the task consuming the result channel.
    pub async fn run(
        mut self,
        mut shutdown: ShutdownSignal,
        writer: JoinHandle<WriterReport>,
    ) -> SchedulerReport {
        let period = self.config.interval;
        // First probe one full interval after start.
        let mut timer = interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            host = %self.executor.target(),
            interval = ?period,
            timeout = ?self.executor.timeout(),
            max_concurrent = self.config.max_concurrent,
            "Scheduler running"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                _ = timer.tick() => {
                    self.tick();
                }
            }
        }

        self.drain(writer).await
    }

    async fn drain(mut self, mut writer: JoinHandle<WriterReport>) -> SchedulerReport {
        self.state.send_replace(SchedulerState::Draining);
        self.reap_finished();
        info!(in_flight = self.attempts.len(), "Draining probe attempts");

        let grace_period = self.config.grace_period;
        let deadline = Instant::now() + grace_period;

        // The writer finishes once every sender is gone: ours now, each
        // in-flight attempt's when it completes.
        let Self { executor, result_tx, mut attempts, state, mut report, .. } = self;
        drop(result_tx);

        match timeout_at(deadline, &mut writer).await {
            Ok(Ok(writer_report)) => {
                report.writer = Some(writer_report);
            }
            Ok(Err(e)) => {
                error!("Writer task failed: {}", e);
            }
            Err(_) => {
                // Attempts that already queued their result are not discarded.
                reap_finished(&mut attempts, executor.target());
                report.discarded = attempts.len();
                warn!(
                    discarded = report.discarded,
                    grace_period = ?grace_period,
                    "Grace period elapsed before results were flushed, discarding in-flight work"
                );
                writer.abort();
            }
        }

        attempts.shutdown().await;
        state.send_replace(SchedulerState::Stopped);

        info!(
            ticks = report.ticks,
            launched = report.launched,
            skipped = report.skipped,
            "Scheduler stopped"
        );
        report
    }

    fn reap_finished(&mut self) {
        reap_finished(&mut self.attempts, self.executor.target());
    }
}

/// Collect completed attempts, logging any that panicked
fn reap_finished(attempts: &mut JoinSet<()>, target: &str) {
    while let Some(result) = attempts.try_join_next() {
        if let Err(e) = result {
            if e.is_panic() {
                error!(host = %target, "Probe attempt panicked: {}", e);
            }
        }
    }
}
