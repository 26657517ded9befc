//! Process lifecycle: startup checks, OS signals and shutdown coordination.
//!
//! ```text
//! Startup:  config → privilege check → storage → prober → scheduler
//! Shutdown: SIGINT/SIGTERM or trigger() → scheduler drains → writer joins → exit
//! ```

pub mod privilege;
pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
