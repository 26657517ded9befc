use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;
use std::time::Duration;

/// Outcome of a single probe attempt.
///
/// Only two shapes exist: a success carrying the measured round-trip time,
/// or a failure whose latency is always zero. The constructors are the only
/// way to build one, so a failed observation with a latency cannot occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// Instant the probe was initiated
    timestamp: DateTime<Utc>,
    success: bool,
    latency: Duration,
}

impl Observation {
    /// Successful probe with its round-trip time
    pub fn success(timestamp: DateTime<Utc>, latency: Duration) -> Self {
        Self { timestamp, success: true, latency }
    }

    /// Failed probe; latency is pinned to zero
    pub fn failure(timestamp: DateTime<Utc>) -> Self {
        Self { timestamp, success: false, latency: Duration::ZERO }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }

    /// Latency in fractional seconds, as stored in the `rtt` column
    pub fn latency_secs(&self) -> f64 {
        self.latency.as_secs_f64()
    }

    /// Human-readable status line printed once the observation is persisted
    pub fn status_line(&self) -> StatusLine<'_> {
        StatusLine(self)
    }
}

/// `<RFC3339 timestamp> | Success: <bool> | RTT: <duration>`
pub struct StatusLine<'a>(&'a Observation);

impl fmt::Display for StatusLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let observation = self.0;
        write!(
            f,
            "{} | Success: {} | RTT: {}",
            observation.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            observation.success,
            format_rtt(observation.latency)
        )
    }
}

/// Compact duration rendering: `0s`, `850µs`, `10ms`, `1.5s`.
pub fn format_rtt(latency: Duration) -> String {
    if latency.is_zero() {
        "0s".to_string()
    } else {
        format!("{latency:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap()
    }

    #[test]
    fn test_failure_has_zero_latency() {
        let observation = Observation::failure(fixed_time());
        assert!(!observation.is_success());
        assert_eq!(observation.latency(), Duration::ZERO);
        assert_eq!(observation.latency_secs(), 0.0);
    }

    #[test]
    fn test_success_keeps_latency() {
        let observation = Observation::success(fixed_time(), Duration::from_millis(10));
        assert!(observation.is_success());
        assert!((observation.latency_secs() - 0.010).abs() < f64::EPSILON);
    }

    #[test]
    fn test_status_line_format() {
        let ok = Observation::success(fixed_time(), Duration::from_millis(10));
        assert_eq!(ok.status_line().to_string(), "2024-03-01T12:30:05Z | Success: true | RTT: 10ms");

        let failed = Observation::failure(fixed_time());
        assert_eq!(
            failed.status_line().to_string(),
            "2024-03-01T12:30:05Z | Success: false | RTT: 0s"
        );
    }

    #[test]
    fn test_format_rtt() {
        assert_eq!(format_rtt(Duration::ZERO), "0s");
        assert_eq!(format_rtt(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_rtt(Duration::from_micros(850)), "850µs");
    }
}
