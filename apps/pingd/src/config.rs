use std::{fmt, fs, io, path, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::monitoring::checker::ProbeMethod;
use crate::monitoring::scheduler::SchedulerConfig;
use crate::validation;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read config file {path}: {source}")]
    ReadFailed {
        path: path::PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write config file {path}: {source}")]
    WriteFailed {
        path: path::PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseFailed {
        path: path::PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Daemon configuration. Built once at startup and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub probe: Probe,
    pub storage: Storage,
    pub shutdown: Shutdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Probe {
    /// Host to probe; `host:port` for the tcp method
    pub target: String,
    pub interval_ms: u64,
    pub method: ProbeMethod,
    /// Ceiling on concurrently running probe attempts
    pub max_concurrent: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Storage {
    pub path: path::PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Shutdown {
    /// Upper bound on the wait for in-flight results after a shutdown signal
    pub grace_period_ms: u64,
}

impl Default for Probe {
    fn default() -> Self {
        Self {
            target: "8.8.8.8".into(),
            interval_ms: 5_000,
            method: ProbeMethod::default_for_platform(),
            max_concurrent: 1,
        }
    }
}

impl Default for Storage {
    fn default() -> Self {
        Self { path: "pings.db".into() }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self { grace_period_ms: 500 }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self { probe: Probe::default(), storage: Storage::default(), shutdown: Shutdown::default() }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Probe")?;
        write_1(f, "Target", &self.probe.target)?;
        write_1(f, "Interval", &format_args!("{:?}", self.interval()))?;
        write_1(f, "Timeout", &format_args!("{:?}", self.probe_timeout()))?;
        write_1(f, "Method", &self.probe.method)?;
        write_1(f, "Max Concurrent", &self.probe.max_concurrent)?;
        write_title_1(f, "Storage")?;
        write_1(f, "Database", &self.storage.path.display())?;
        write_title_1(f, "Shutdown")?;
        write_1(f, "Grace Period", &format_args!("{:?}", self.grace_period()))?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Writes a default config to the given path (with a `.toml` extension)
    /// if none exists yet.
    ///
    /// ```no_run
    /// let cfg = uppe_pingd::config::Config::from_config("pingd.toml")?;
    /// println!("{}", cfg);
    /// # Ok::<(), uppe_pingd::config::Error>(())
    /// ```
    pub fn from_config(path: impl AsRef<path::Path>) -> Result<Self, Error> {
        let config_path = normalize_toml_path(path.as_ref());

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| Error::ReadFailed { path: config_path.clone(), source })?;
            toml::from_str(raw_string.as_str())
                .map_err(|source| Error::ParseFailed { path: config_path, source })
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|source| Error::WriteFailed { path: path.to_path_buf(), source })?;
        }

        fs::write(path, config_str)
            .map_err(|source| Error::WriteFailed { path: path.to_path_buf(), source })
    }

    /// Reject settings the daemon cannot run with
    pub fn validate(&self) -> Result<(), Error> {
        if self.probe.interval_ms == 0 {
            return Err(Error::Invalid("probe interval must be greater than zero".into()));
        }
        if self.probe.max_concurrent == 0 {
            return Err(Error::Invalid("max_concurrent must be at least 1".into()));
        }
        if self.probe.max_concurrent > Semaphore::MAX_PERMITS {
            return Err(Error::Invalid(format!(
                "max_concurrent must be at most {}",
                Semaphore::MAX_PERMITS
            )));
        }

        validation::validate_target(&self.probe.target, self.probe.method)
            .to_result()
            .map_err(Error::Invalid)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.probe.interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        crate::monitoring::executor::probe_timeout(self.interval())
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.shutdown.grace_period_ms)
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval: self.interval(),
            max_concurrent: self.probe.max_concurrent,
            grace_period: self.grace_period(),
        }
    }
}
