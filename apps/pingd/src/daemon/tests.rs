/// End-to-end tests for the daemon pipeline
///
/// These drive the real scheduler, writer and libsql store with fake
/// probers, stopping the daemon from inside the prober after a fixed number
/// of calls so the tick count is deterministic.
use super::*;
use crate::database::models::PingRecord;
use crate::lifecycle::Shutdown;
use crate::monitoring::checker::ProbeError;
use anyhow::anyhow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::{TempDir, tempdir};

/// Reports a scripted outcome and triggers shutdown on call `stop_after`
struct ScriptedProber {
    calls: AtomicUsize,
    stop_after: usize,
    shutdown: Arc<Shutdown>,
    delay: Duration,
    outcome: fn(usize) -> Result<Duration, ProbeError>,
}

impl ScriptedProber {
    fn new(
        stop_after: usize,
        shutdown: Arc<Shutdown>,
        outcome: fn(usize) -> Result<Duration, ProbeError>,
    ) -> Self {
        Self { calls: AtomicUsize::new(0), stop_after, shutdown, delay: Duration::ZERO, outcome }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Prober for ScriptedProber {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn probe(&self, _target: &str, _timeout: Duration) -> Result<Duration, ProbeError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call >= self.stop_after {
            self.shutdown.trigger();
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.outcome)(call)
    }
}

/// Delegates to a real store, failing the listed calls (1-based)
struct FlakySink {
    inner: PingStore,
    calls: AtomicUsize,
    fail_on: usize,
}

#[async_trait::async_trait]
impl ResultSink for FlakySink {
    async fn append(&self, observation: &Observation) -> Result<i64> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on {
            return Err(anyhow!("database is locked"));
        }
        self.inner.append(observation).await
    }
}

fn always_ten_ms(_call: usize) -> Result<Duration, ProbeError> {
    Ok(Duration::from_millis(10))
}

fn always_unreachable(_call: usize) -> Result<Duration, ProbeError> {
    Err(ProbeError::Unresolvable("unreachable.invalid".to_string()))
}

fn call_number_as_millis(call: usize) -> Result<Duration, ProbeError> {
    Ok(Duration::from_millis(call as u64))
}

fn test_config(temp_dir: &TempDir, interval_ms: u64) -> Config {
    let mut config = Config::default();
    config.probe.target = "192.0.2.1".to_string();
    config.probe.interval_ms = interval_ms;
    config.storage.path = temp_dir.path().join("pings.db");
    config
}

async fn run_daemon(
    config: Config,
    prober: Arc<ScriptedProber>,
    sink: Arc<dyn ResultSink>,
    shutdown: &Shutdown,
) -> SchedulerReport {
    let daemon = Daemon::new(config, prober, sink);
    tokio::time::timeout(Duration::from_secs(10), daemon.run(shutdown.subscribe()))
        .await
        .expect("daemon did not stop")
}

async fn stored(config: &Config) -> Result<Vec<PingRecord>> {
    PingStore::open(&config.storage.path).await?.records().await
}

#[tokio::test]
async fn test_three_successful_ticks_are_persisted() -> Result<()> {
    let temp_dir = tempdir()?;
    let config = test_config(&temp_dir, 100);
    let shutdown = Arc::new(Shutdown::new());
    let prober = Arc::new(ScriptedProber::new(3, shutdown.clone(), always_ten_ms));
    let store = Arc::new(PingStore::open(&config.storage.path).await?);

    let report = run_daemon(config.clone(), prober.clone(), store, &shutdown).await;

    assert_eq!(prober.calls(), 3);
    assert_eq!(report.launched, 3);
    assert_eq!(report.writer, Some(WriterReport { persisted: 3, dropped: 0 }));

    let records = stored(&config).await?;
    assert_eq!(records.len(), 3);
    for record in &records {
        assert!(record.success);
        assert!((record.rtt - 0.010).abs() < 1e-9);
    }
    Ok(())
}

#[tokio::test]
async fn test_unreachable_target_records_failures() -> Result<()> {
    let temp_dir = tempdir()?;
    let config = test_config(&temp_dir, 100);
    let shutdown = Arc::new(Shutdown::new());
    let prober = Arc::new(ScriptedProber::new(4, shutdown.clone(), always_unreachable));
    let store = Arc::new(PingStore::open(&config.storage.path).await?);

    let report = run_daemon(config.clone(), prober.clone(), store, &shutdown).await;

    let records = stored(&config).await?;
    assert_eq!(records.len() as u64, report.launched);
    assert_eq!(records.len(), 4);
    assert!(records.iter().all(|record| !record.success && record.rtt == 0.0));
    Ok(())
}

#[tokio::test]
async fn test_sink_failure_on_second_call_is_skipped() -> Result<()> {
    let temp_dir = tempdir()?;
    let config = test_config(&temp_dir, 100);
    let shutdown = Arc::new(Shutdown::new());
    let prober = Arc::new(ScriptedProber::new(3, shutdown.clone(), call_number_as_millis));
    let sink = Arc::new(FlakySink {
        inner: PingStore::open(&config.storage.path).await?,
        calls: AtomicUsize::new(0),
        fail_on: 2,
    });

    let report = run_daemon(config.clone(), prober, sink, &shutdown).await;
    assert_eq!(report.writer, Some(WriterReport { persisted: 2, dropped: 1 }));

    // Observation n carries an rtt of n milliseconds.
    let records = stored(&config).await?;
    let rtts: Vec<f64> = records.iter().map(|record| record.rtt).collect();
    assert_eq!(rtts.len(), 2);
    assert!((rtts[0] - 0.001).abs() < 1e-9);
    assert!((rtts[1] - 0.003).abs() < 1e-9);
    Ok(())
}

#[tokio::test]
async fn test_records_follow_completion_order() -> Result<()> {
    let temp_dir = tempdir()?;
    let config = test_config(&temp_dir, 50);
    let shutdown = Arc::new(Shutdown::new());
    let prober = Arc::new(ScriptedProber::new(5, shutdown.clone(), call_number_as_millis));
    let store = Arc::new(PingStore::open(&config.storage.path).await?);

    run_daemon(config.clone(), prober, store, &shutdown).await;

    let records = stored(&config).await?;
    assert_eq!(records.len(), 5);
    for (index, pair) in records.windows(2).enumerate() {
        assert!(pair[0].id < pair[1].id);
        assert!(pair[0].timestamp <= pair[1].timestamp, "out of order at {index}");
        assert!(pair[0].rtt < pair[1].rtt, "out of order at {index}");
    }
    Ok(())
}

#[tokio::test]
async fn test_attempt_in_flight_at_shutdown_is_persisted() -> Result<()> {
    let temp_dir = tempdir()?;
    let mut config = test_config(&temp_dir, 200);
    config.shutdown.grace_period_ms = 1_000;
    let shutdown = Arc::new(Shutdown::new());
    // Shutdown fires as the first probe starts; the probe still needs 100ms.
    let prober = Arc::new(
        ScriptedProber::new(1, shutdown.clone(), always_ten_ms)
            .with_delay(Duration::from_millis(100)),
    );
    let store = Arc::new(PingStore::open(&config.storage.path).await?);

    let report = run_daemon(config.clone(), prober.clone(), store, &shutdown).await;

    assert_eq!(prober.calls(), 1);
    assert_eq!(report.launched, 1);
    assert_eq!(report.discarded, 0);
    assert_eq!(stored(&config).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_open_creates_schema_and_survives_restart() -> Result<()> {
    let temp_dir = tempdir()?;
    let mut config = test_config(&temp_dir, 100);
    config.probe.method = crate::monitoring::checker::ProbeMethod::Tcp;
    config.probe.target = "127.0.0.1:9".to_string();

    let daemon = Daemon::open(config.clone()).await?;
    assert_eq!(daemon.config(), &config);
    drop(daemon);

    // Second open runs the schema setup again without touching data.
    let store = PingStore::open(&config.storage.path).await?;
    store.append(&Observation::failure(chrono::Utc::now())).await?;
    Daemon::open(config.clone()).await?;
    assert_eq!(stored(&config).await?.len(), 1);
    Ok(())
}
