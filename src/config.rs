//! Engine Configuration
//!
//! Configuration structs for the training engine components. All sections are
//! immutable after `initialize_network`; changing the network shape requires
//! re-initialization.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::error::{EngineError, Result};

/// Named network architecture variants.
///
/// A closed set: each variant maps to a fixed list of hidden layer widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    /// Single narrow hidden layer, cheapest to train
    Compact,
    /// Two hidden layers, the general-purpose default
    Standard,
    /// Three hidden layers tapering toward the output
    Hybrid,
    /// Four hidden layers for wider feature sets
    Deep,
}

impl Architecture {
    /// Hidden layer widths for this variant (input/output sizes come from
    /// the caller at initialization).
    pub fn hidden_widths(&self) -> &'static [usize] {
        match self {
            Architecture::Compact => &[16],
            Architecture::Standard => &[32, 16],
            Architecture::Hybrid => &[64, 32, 16],
            Architecture::Deep => &[64, 64, 32, 16],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::Compact => "compact",
            Architecture::Standard => "standard",
            Architecture::Hybrid => "hybrid",
            Architecture::Deep => "deep",
        }
    }
}

impl FromStr for Architecture {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "compact" => Ok(Architecture::Compact),
            "standard" => Ok(Architecture::Standard),
            "hybrid" => Ok(Architecture::Hybrid),
            "deep" => Ok(Architecture::Deep),
            other => Err(EngineError::Config(format!(
                "unknown architecture '{other}' (expected compact|standard|hybrid|deep)"
            ))),
        }
    }
}

impl std::fmt::Display for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Training loop configuration
    #[serde(default)]
    pub training: TrainingConfig,
    /// Network construction options
    #[serde(default)]
    pub network: NetworkOptions,
    /// Experience buffer configuration
    #[serde(default)]
    pub buffer: BufferConfig,
    /// AdamW hyperparameters
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    /// Learning-rate scheduler configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Instability watchdog thresholds
    #[serde(default)]
    pub watchdog: WatchdogConfig,
    /// Exploration schedule configuration
    #[serde(default)]
    pub exploration: ExplorationConfig,
    /// L2 regularization
    #[serde(default)]
    pub regularization: RegularizationConfig,
}

impl EngineConfig {
    /// Load configuration from an optional TOML file with `ONLEARN_*`
    /// environment overrides layered on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let cfg: EngineConfig = builder
            .add_source(
                Environment::with_prefix("ONLEARN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Sanity-check ranges before the engine accepts the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.training.batch_size == 0 {
            return Err(EngineError::Config("batch_size must be > 0".into()));
        }
        if !(0.0..1.0).contains(&self.training.validation_split) {
            return Err(EngineError::Config(
                "validation_split must be in [0, 1)".into(),
            ));
        }
        if self.buffer.capacity == 0 {
            return Err(EngineError::Config("buffer capacity must be > 0".into()));
        }
        if self.optimizer.learning_rate <= 0.0 {
            return Err(EngineError::Config("learning_rate must be > 0".into()));
        }
        if !(0.0..1.0).contains(&self.optimizer.beta1) || !(0.0..1.0).contains(&self.optimizer.beta2)
        {
            return Err(EngineError::Config("beta1/beta2 must be in [0, 1)".into()));
        }
        if self.optimizer.max_grad_norm <= 0.0 {
            return Err(EngineError::Config("max_grad_norm must be > 0".into()));
        }
        if self.watchdog.check_interval == 0 {
            return Err(EngineError::Config("check_interval must be > 0".into()));
        }
        if !(0.0..1.0).contains(&self.watchdog.reset_lr_factor) {
            return Err(EngineError::Config(
                "reset_lr_factor must be in (0, 1)".into(),
            ));
        }
        if self.scheduler.decay_factor <= 0.0 || self.scheduler.decay_factor >= 1.0 {
            return Err(EngineError::Config("decay_factor must be in (0, 1)".into()));
        }
        if self.exploration.decay_steps == 0 {
            return Err(EngineError::Config("decay_steps must be > 0".into()));
        }
        Ok(())
    }
}

/// Training loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Samples per optimizer update
    pub batch_size: usize,
    /// Epochs per session
    pub epochs: usize,
    /// Fraction of buffered experiences held out for validation
    pub validation_split: f64,
    /// Epochs without validation improvement before early stop
    pub early_stopping_patience: u32,
    /// Minimum validation-loss improvement that resets patience
    pub min_delta: f64,
    /// Epochs between checkpoint writes (0 disables)
    pub checkpoint_interval: usize,
    /// Steps between per-step progress logs
    pub log_interval: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            batch_size: 16,
            epochs: 50,
            validation_split: 0.2,
            early_stopping_patience: 10,
            min_delta: 1e-5,
            checkpoint_interval: 10,
            log_interval: 25,
        }
    }
}

/// Network construction options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkOptions {
    /// Symmetric clamp applied to activation inputs before evaluation
    pub activation_input_clip: f64,
    /// Gain multiplier on the Xavier scale
    pub init_gain: f64,
    /// Seed for parameter initialization; entropy when absent
    pub init_seed: Option<u64>,
}

impl Default for NetworkOptions {
    fn default() -> Self {
        Self {
            activation_input_clip: 60.0,
            init_gain: 1.0,
            init_seed: None,
        }
    }
}

/// Experience buffer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Maximum experiences held
    pub capacity: usize,
    /// Priority-proportional sampling; uniform when disabled
    pub prioritized: bool,
    /// Priority assigned to experiences added without one
    pub default_priority: f64,
    /// Added to |td_error| so no priority collapses to zero
    pub priority_epsilon: f64,
    /// Seed for sampling; entropy when absent
    pub seed: Option<u64>,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            prioritized: true,
            default_priority: 1.0,
            priority_epsilon: 1e-3,
            seed: None,
        }
    }
}

/// AdamW hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Base learning rate
    pub learning_rate: f64,
    /// First moment decay
    pub beta1: f64,
    /// Second moment decay
    pub beta2: f64,
    /// Decoupled weight decay coefficient
    pub weight_decay: f64,
    /// Epsilon for numerical stability
    pub epsilon: f64,
    /// Maximum global gradient norm for clipping
    pub max_grad_norm: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            beta1: 0.9,
            beta2: 0.999,
            weight_decay: 1e-4,
            epsilon: 1e-8,
            max_grad_norm: 5.0,
        }
    }
}

/// Learning-rate scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Starting learning rate; falls back to the optimizer's when absent
    pub initial_lr: Option<f64>,
    /// Multiplier applied when loss plateaus
    pub decay_factor: f64,
    /// Plateaued steps tolerated before a decay
    pub patience: u32,
    /// Lower bound on the learning rate
    pub min_lr: f64,
    /// Recent-loss window length used for trend detection
    pub window: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            initial_lr: None,
            decay_factor: 0.5,
            patience: 20,
            min_lr: 1e-6,
            window: 20,
        }
    }
}

/// Instability watchdog thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// Steps between stability checks
    pub check_interval: u64,
    /// NaN occurrences tolerated across parameters and gradients
    pub nan_threshold: u32,
    /// Inf occurrences tolerated across parameters and gradients
    pub inf_threshold: u32,
    /// Loss above this is treated as divergence
    pub loss_threshold: f64,
    /// Pre-clip gradient norm above this is treated as explosion
    pub gradient_threshold: f64,
    /// Learning-rate multiplier raised to the reset count on each reset
    pub reset_lr_factor: f64,
    /// Resets tolerated before training halts
    pub max_resets: u32,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            check_interval: 10,
            nan_threshold: 0,
            inf_threshold: 0,
            loss_threshold: 1e3,
            gradient_threshold: 1e2,
            reset_lr_factor: 0.5,
            max_resets: 5,
        }
    }
}

/// Exploration mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplorationMode {
    /// Random action with probability epsilon, else greedy
    EpsilonGreedy,
    /// Sample from softmax(scores / temperature)
    SoftmaxTemperature,
}

/// Exploration schedule configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorationConfig {
    /// Starting epsilon / temperature
    pub start: f64,
    /// Final epsilon / temperature
    pub end: f64,
    /// Steps over which the value decays linearly from start to end
    pub decay_steps: u64,
    /// Selection mode
    pub mode: ExplorationMode,
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            start: 1.0,
            end: 0.05,
            decay_steps: 10_000,
            mode: ExplorationMode::EpsilonGreedy,
        }
    }
}

/// L2 regularization configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegularizationConfig {
    /// Whether the L2 term participates in loss and gradients
    pub enabled: bool,
    /// Regularization strength
    pub lambda: f64,
}

impl Default for RegularizationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            lambda: 1e-4,
        }
    }
}
