//! Training
//!
//! The orchestrator, checkpoint persistence, and the long-lived background
//! session runner.

pub mod checkpoint;
pub mod engine;
pub mod session;

pub use checkpoint::{epoch_name, Checkpointer, ModelCheckpoint, CHECKPOINT_VERSION};
pub use engine::{TrainingEngine, TrainingState};
pub use session::{SessionReport, StopReason, TrainingSession};
