use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::checker::Prober;
use super::types::Observation;

/// Share of the probe interval a single attempt may use, leaving headroom
/// before the next tick.
pub const TIMEOUT_RATIO: f64 = 0.8;

/// Deadline for one attempt given the probe interval
pub fn probe_timeout(interval: Duration) -> Duration {
    interval.mul_f64(TIMEOUT_RATIO)
}

/// Executes individual probe attempts against the configured target
pub struct ProbeExecutor {
    prober: Arc<dyn Prober>,
    target: Arc<str>,
    timeout: Duration,
}

impl ProbeExecutor {
    pub fn new(prober: Arc<dyn Prober>, target: impl Into<Arc<str>>, interval: Duration) -> Self {
        Self { prober, target: target.into(), timeout: probe_timeout(interval) }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one probe. Always yields exactly one observation; failures of any
    /// kind become `success = false, latency = 0`.
    pub async fn execute(&self) -> Observation {
        let started = Utc::now();

        // The outer timeout also covers probers that ignore their deadline.
        match timeout(self.timeout, self.prober.probe(&self.target, self.timeout)).await {
            Ok(Ok(rtt)) => {
                debug!(host = %self.target, prober = self.prober.name(), ?rtt, "Probe succeeded");
                Observation::success(started, rtt)
            }
            Ok(Err(e)) => {
                warn!(host = %self.target, prober = self.prober.name(), error = %e, "Probe failed");
                Observation::failure(started)
            }
            Err(_) => {
                warn!(
                    host = %self.target,
                    prober = self.prober.name(),
                    timeout = ?self.timeout,
                    "Probe timed out"
                );
                Observation::failure(started)
            }
        }
    }
}
