//! Policy Utilities
//!
//! Exploration scheduling and action selection, decoupled from gradient
//! state.

pub mod exploration;

pub use exploration::{ExplorationSchedule, ExplorationState};
