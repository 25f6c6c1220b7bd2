pub mod config;
pub mod core;
pub mod error;
pub mod memory;
pub mod networks;
pub mod optim;
pub mod policy;
pub mod sim;
pub mod stability;
pub mod training;

pub use config::{
    Architecture, BufferConfig, EngineConfig, ExplorationConfig, ExplorationMode, NetworkOptions,
    OptimizerConfig, RegularizationConfig, SchedulerConfig, TrainingConfig, WatchdogConfig,
};
pub use core::{EpochReport, Experience, MarketSnapshot, TrainingMetrics, TrainingSummary};
pub use error::{EngineError, Result};
pub use memory::ExperienceBuffer;
pub use networks::{Activation, LayerShape, NetworkConfig, Parameters};
pub use optim::{AdamW, ClipOutcome, LrScheduler, OptimizerState, SchedulerState};
pub use policy::{ExplorationSchedule, ExplorationState};
pub use stability::{StabilityReport, StabilityWatchdog, WatchdogPhase, WatchdogState};
pub use training::{
    Checkpointer, ModelCheckpoint, SessionReport, StopReason, TrainingEngine, TrainingSession,
    TrainingState,
};
