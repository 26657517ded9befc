use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::{self, Config};
use crate::monitoring::checker::ProbeMethod;

/// A simple ping daemon that logs to SQLite
#[derive(Debug, Parser)]
#[command(name = "pingdaemon", version, about)]
pub struct Cli {
    /// IP address or host name to probe (host:port with --method tcp) [default: 8.8.8.8]
    #[arg(long = "ip", value_name = "HOST")]
    pub target: Option<String>,

    /// Probe interval, e.g. 500ms, 5s, 1m [default: 5s]
    #[arg(long, value_parser = parse_duration)]
    pub interval: Option<Duration>,

    /// SQLite database file [default: pings.db]
    #[arg(long = "db", value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// Probe mechanism [default: command on macOS, icmp elsewhere]
    #[arg(long, value_enum)]
    pub method: Option<ProbeMethod>,

    /// Maximum probe attempts in flight at once [default: 1]
    #[arg(long, value_name = "N")]
    pub max_concurrent: Option<usize>,

    /// How long to wait for in-flight results on shutdown [default: 500ms]
    #[arg(long, value_parser = parse_duration)]
    pub grace_period: Option<Duration>,

    /// TOML config file; created with defaults if it does not exist
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    pub show_config: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Defaults, then the config file, then command-line flags. The result
    /// is validated.
    pub fn load_config(&self) -> Result<Config, config::Error> {
        let mut config = match &self.config {
            Some(path) => Config::from_config(path)?,
            None => Config::default(),
        };

        if let Some(target) = &self.target {
            config.probe.target = target.clone();
        }
        if let Some(interval) = self.interval {
            config.probe.interval_ms = duration_to_millis(interval);
        }
        if let Some(database) = &self.database {
            config.storage.path = database.clone();
        }
        if let Some(method) = self.method {
            config.probe.method = method;
        }
        if let Some(max_concurrent) = self.max_concurrent {
            config.probe.max_concurrent = max_concurrent;
        }
        if let Some(grace_period) = self.grace_period {
            config.shutdown.grace_period_ms = duration_to_millis(grace_period);
        }

        config.validate()?;
        Ok(config)
    }
}

fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Parse `500ms`, `1.5s`, `2m`, `1h` or a bare number of seconds
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    let split = input.find(|c: char| !(c.is_ascii_digit() || c == '.')).unwrap_or(input.len());
    let (number, unit) = input.split_at(split);

    let value: f64 = number.parse().map_err(|_| format!("invalid duration '{input}'"))?;
    let seconds = match unit.trim() {
        "ms" => value / 1000.0,
        "" | "s" => value,
        "m" => value * 60.0,
        "h" => value * 3600.0,
        other => return Err(format!("unknown duration unit '{other}' (use ms, s, m or h)")),
    };

    Duration::try_from_secs_f64(seconds).map_err(|e| format!("invalid duration '{input}': {e}"))
}
