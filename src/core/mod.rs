//! Core Types
//!
//! Experience records, market ingestion types, and training metrics.

pub mod experience;
pub mod metrics;

pub use experience::{Experience, MarketSnapshot, FEATURE_COUNT};
pub use metrics::{summarize, EpochReport, TrainingMetrics, TrainingSummary};
