use chrono::{DateTime, SecondsFormat, Utc};

use crate::monitoring::types::Observation;

/// One row of the `pings` table
#[derive(Debug, Clone, PartialEq)]
pub struct PingRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    /// Round-trip time in fractional seconds
    pub rtt: f64,
}

/// Timestamps are stored as RFC 3339 text with sub-second precision
pub fn timestamp_to_text(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub fn text_to_timestamp(text: &str) -> anyhow::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(text)?.with_timezone(&Utc))
}

impl PingRecord {
    /// Whether this row stores the same values as `observation`
    pub fn matches(&self, observation: &Observation) -> bool {
        self.timestamp == observation.timestamp()
            && self.success == observation.is_success()
            && (self.rtt - observation.latency_secs()).abs() < 1e-9
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_timestamp_text_round_trip_keeps_subseconds() {
        let now = Utc::now();
        let parsed = text_to_timestamp(&timestamp_to_text(now)).unwrap();
        assert_eq!(parsed, now);
    }

    #[test]
    fn test_record_matches_observation() {
        let observation = Observation::success(Utc::now(), Duration::from_millis(10));
        let record = PingRecord {
            id: 1,
            timestamp: observation.timestamp(),
            success: true,
            rtt: 0.010,
        };
        assert!(record.matches(&observation));
        assert!(!record.matches(&Observation::failure(observation.timestamp())));
    }
}
