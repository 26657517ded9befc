pub mod checker;
/// Probe engine
///
/// This module is responsible for:
/// - Executing ICMP, system-ping and TCP reachability checks
/// - Scheduling probe attempts under a concurrency ceiling
/// - Shaping every attempt into an `Observation`
pub mod executor;
pub mod scheduler;
pub mod types;

pub use executor::ProbeExecutor;
pub use scheduler::MonitoringScheduler;
pub use types::Observation;
