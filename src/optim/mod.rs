//! Optimization
//!
//! Global-norm gradient clipping, the AdamW optimizer, and the loss-trend
//! learning-rate scheduler.

pub mod adamw;
pub mod clip;
pub mod scheduler;

pub use adamw::{AdamW, OptimizerState};
pub use clip::{clip_global_norm, global_norm, ClipOutcome};
pub use scheduler::{LrScheduler, SchedulerState};
