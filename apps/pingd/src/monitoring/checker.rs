use std::io;
use std::net::IpAddr;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use surge_ping::{Client, Config as IcmpConfig, ICMP, PingIdentifier, PingSequence};
use thiserror::Error;
use tokio::net::{TcpStream, lookup_host};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Payload carried by every echo request
const ICMP_PAYLOAD: [u8; 56] = [0; 56];

/// Probe mechanism used to reach the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMethod {
    /// ICMP echo over a raw socket (needs root on unix)
    Icmp,
    /// Shell out to the system `ping` binary
    Command,
    /// TCP connect to `host:port`
    Tcp,
}

impl ProbeMethod {
    /// macOS has no usable raw-socket path without extra entitlements, so it
    /// defaults to the system `ping`.
    pub fn default_for_platform() -> Self {
        if cfg!(target_os = "macos") { Self::Command } else { Self::Icmp }
    }

    /// Whether this method needs elevated privileges on the current platform
    pub fn requires_privilege(self) -> bool {
        matches!(self, Self::Icmp) && cfg!(unix)
    }
}

impl Default for ProbeMethod {
    fn default() -> Self {
        Self::default_for_platform()
    }
}

impl std::fmt::Display for ProbeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeMethod::Icmp => write!(f, "icmp"),
            ProbeMethod::Command => write!(f, "command"),
            ProbeMethod::Tcp => write!(f, "tcp"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("could not resolve {0}")]
    Unresolvable(String),

    #[error("no IPv6 ICMP client available for {0}")]
    Ipv6Unavailable(IpAddr),

    #[error("ICMP echo failed: {0}")]
    Icmp(#[from] surge_ping::SurgeError),

    #[error("TCP connection timeout after {0:?}")]
    TcpTimeout(Duration),

    #[error("ping exited with {status}: {output}")]
    CommandFailed { status: String, output: String },

    #[error("could not parse round-trip time from ping output: {0}")]
    UnparsableOutput(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A single reachability check against a target.
///
/// Implementations return the round-trip time on success. Any error is
/// turned into a failed observation by the caller, never propagated.
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    fn name(&self) -> &'static str;

    async fn probe(&self, target: &str, timeout: Duration) -> Result<Duration, ProbeError>;
}

/// Build the prober for `method`. Must run inside a tokio runtime.
pub fn build_prober(method: ProbeMethod) -> Result<Arc<dyn Prober>, ProbeError> {
    Ok(match method {
        ProbeMethod::Icmp => Arc::new(IcmpProber::new()?),
        ProbeMethod::Command => Arc::new(CommandProber::new()),
        ProbeMethod::Tcp => Arc::new(TcpProber),
    })
}

async fn resolve(host: &str) -> Result<IpAddr, ProbeError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }

    lookup_host((host, 0))
        .await
        .map_err(|_| ProbeError::Unresolvable(host.to_string()))?
        .map(|addr| addr.ip())
        .next()
        .ok_or_else(|| ProbeError::Unresolvable(host.to_string()))
}

/// ICMP echo prober backed by `surge-ping`
pub struct IcmpProber {
    v4: Client,
    v6: Option<Client>,
}

impl IcmpProber {
    pub fn new() -> Result<Self, ProbeError> {
        let v4 = Client::new(&IcmpConfig::default())?;
        let v6 = match Client::new(&IcmpConfig::builder().kind(ICMP::V6).build()) {
            Ok(client) => Some(client),
            Err(e) => {
                debug!("IPv6 ICMP client unavailable: {}", e);
                None
            }
        };

        Ok(Self { v4, v6 })
    }

    fn client_for(&self, ip: IpAddr) -> Result<&Client, ProbeError> {
        match ip {
            IpAddr::V4(_) => Ok(&self.v4),
            IpAddr::V6(_) => self.v6.as_ref().ok_or(ProbeError::Ipv6Unavailable(ip)),
        }
    }
}

#[async_trait::async_trait]
impl Prober for IcmpProber {
    fn name(&self) -> &'static str {
        "icmp"
    }

    async fn probe(&self, target: &str, timeout: Duration) -> Result<Duration, ProbeError> {
        let ip = resolve(target).await?;
        let client = self.client_for(ip)?;

        let mut pinger = client.pinger(ip, PingIdentifier(rand::random())).await;
        pinger.timeout(timeout);

        let (_packet, rtt) = pinger.ping(PingSequence(0), &ICMP_PAYLOAD).await?;
        Ok(rtt)
    }
}

/// Runs the system `ping` once and reads the RTT from its output
pub struct CommandProber {
    program: String,
}

impl CommandProber {
    pub fn new() -> Self {
        Self { program: "ping".to_string() }
    }

    /// Use a different executable, mainly for tests
    pub fn with_program(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }

    fn wait_args(timeout: Duration) -> [String; 2] {
        let seconds = timeout.as_secs_f64().ceil().max(1.0) as u64;
        // BSD ping spells the overall deadline -t, iputils uses -W for the reply wait.
        let flag = if cfg!(any(target_os = "macos", target_os = "freebsd")) { "-t" } else { "-W" };
        [flag.to_string(), seconds.to_string()]
    }
}

impl Default for CommandProber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Prober for CommandProber {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn probe(&self, target: &str, timeout: Duration) -> Result<Duration, ProbeError> {
        let output = Command::new(&self.program)
            .arg("-c")
            .arg("1")
            .args(Self::wait_args(timeout))
            .arg(target)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        let combined = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );

        if !output.status.success() {
            return Err(ProbeError::CommandFailed {
                status: output.status.to_string(),
                output: combined.trim().to_string(),
            });
        }

        parse_rtt(&combined).ok_or_else(|| {
            warn!(host = %target, "ping succeeded but reported no round-trip time");
            ProbeError::UnparsableOutput(combined.trim().to_string())
        })
    }
}

/// Extract `time=<ms> ms` from ping output
pub fn parse_rtt(output: &str) -> Option<Duration> {
    let start = output.find("time=")? + "time=".len();
    let rest = &output[start..];
    let end = rest.find(|c: char| !(c.is_ascii_digit() || c == '.')).unwrap_or(rest.len());

    if !rest[end..].trim_start().starts_with("ms") {
        return None;
    }

    let millis: f64 = rest[..end].parse().ok()?;
    Duration::try_from_secs_f64(millis / 1000.0).ok()
}

/// TCP port checker; the target must be `host:port`
pub struct TcpProber;

#[async_trait::async_trait]
impl Prober for TcpProber {
    fn name(&self) -> &'static str {
        "tcp"
    }

    async fn probe(&self, target: &str, timeout_duration: Duration) -> Result<Duration, ProbeError> {
        let start = Instant::now();

        timeout(timeout_duration, TcpStream::connect(target))
            .await
            .map_err(|_| ProbeError::TcpTimeout(timeout_duration))??;

        Ok(start.elapsed())
    }
}
