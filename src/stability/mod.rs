//! Numerical Stability
//!
//! The instability watchdog: detection of NaN/Inf propagation, loss
//! divergence and gradient explosion, with checkpoint-based rollback.

pub mod watchdog;

pub use watchdog::{
    ResetEvent, StabilityReport, StabilityWatchdog, StableCheckpoint, WatchdogPhase, WatchdogState,
};
