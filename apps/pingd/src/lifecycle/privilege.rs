use thiserror::Error;

use crate::monitoring::checker::ProbeMethod;

#[derive(Debug, Error)]
pub enum PrivilegeError {
    #[error(
        "the {0} probe must be run with elevated privileges (sudo) to send ICMP packets; \
         use --method command or --method tcp to run unprivileged"
    )]
    NotPrivileged(ProbeMethod),
}

/// Whether the process runs with an effective uid of 0
#[cfg(unix)]
pub fn is_privileged() -> bool {
    // SAFETY: geteuid is a thread-safe libc call that takes no pointers.
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
pub fn is_privileged() -> bool {
    true
}

/// Fail startup when `method` needs privileges the process does not have
pub fn ensure_privileged(method: ProbeMethod) -> Result<(), PrivilegeError> {
    check(method, is_privileged())
}

fn check(method: ProbeMethod, privileged: bool) -> Result<(), PrivilegeError> {
    if method.requires_privilege() && !privileged {
        return Err(PrivilegeError::NotPrivileged(method));
    }
    Ok(())
}
