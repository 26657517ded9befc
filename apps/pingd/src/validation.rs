use std::net::{IpAddr, SocketAddr};

use crate::monitoring::checker::ProbeMethod;

/// Validation results with specific error messages
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub error: Option<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self { is_valid: true, error: None }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self { is_valid: false, error: Some(msg.into()) }
    }

    pub fn to_result(&self) -> Result<(), String> {
        if self.is_valid {
            Ok(())
        } else {
            Err(self.error.clone().unwrap_or_else(|| "Validation failed".to_string()))
        }
    }
}

/// Validate a probe target for the given method
pub fn validate_target(target: &str, method: ProbeMethod) -> ValidationResult {
    match method {
        ProbeMethod::Icmp | ProbeMethod::Command => validate_host(target),
        ProbeMethod::Tcp => validate_tcp_endpoint(target),
    }
}

/// Validate a bare host: IP literal or DNS name
pub fn validate_host(target: &str) -> ValidationResult {
    if target.trim().is_empty() {
        return ValidationResult::err("Target cannot be empty");
    }

    if target.parse::<IpAddr>().is_ok() {
        return ValidationResult::ok();
    }

    // Would be read as an option by the system ping
    if target.starts_with('-') {
        return ValidationResult::err(format!("Invalid host '{target}'"));
    }

    if target.len() > 253 {
        return ValidationResult::err("Host name is longer than 253 characters");
    }

    let valid_labels = target.trim_end_matches('.').split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    });

    if !valid_labels {
        if target.contains(':') {
            return ValidationResult::err(format!(
                "Invalid host '{target}'. Ports are only accepted with --method tcp"
            ));
        }
        return ValidationResult::err(format!("Invalid host '{target}'"));
    }

    ValidationResult::ok()
}

/// Validate TCP endpoint (host:port format)
pub fn validate_tcp_endpoint(target: &str) -> ValidationResult {
    if target.trim().is_empty() {
        return ValidationResult::err("Target cannot be empty");
    }

    if target.parse::<SocketAddr>().is_ok() {
        return ValidationResult::ok();
    }

    let Some((host, port)) = target.rsplit_once(':') else {
        return ValidationResult::err("TCP target must be in format 'host:port'");
    };

    match port.parse::<u16>() {
        Ok(port) if port > 0 => {}
        Ok(_) => return ValidationResult::err("Port must be between 1 and 65535"),
        Err(_) => return ValidationResult::err("Invalid port number"),
    }

    validate_host(host)
}
