use thiserror::Error;

/// Main error type for the training engine
#[derive(Error, Debug)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration load error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    // Lifecycle errors
    #[error("Network not initialized: {0}")]
    NotInitialized(String),

    // Tensor shape errors (programming errors, not recoverable at runtime)
    #[error("Shape mismatch: {0}")]
    Shape(String),

    // Data availability errors
    #[error("Insufficient data: have {have} experiences, need {need}")]
    InsufficientData { have: usize, need: usize },

    // Stability errors
    #[error("Reset budget exceeded: {resets} resets >= max {max_resets}, training halted")]
    ResetBudgetExceeded { resets: u32, max_resets: u32 },

    // Checkpoint errors
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Checkpoint version mismatch: file has {found}, expected {expected}")]
    CheckpointVersion { found: u32, expected: u32 },

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Result type alias for EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// Whether the caller can recover by retrying later (e.g. after more
    /// experiences arrive). Everything else is surfaced as fatal.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EngineError::InsufficientData { .. })
    }
}
