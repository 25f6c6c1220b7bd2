//! Training Session
//!
//! Long-lived background wrapper around the engine. Runs epochs on the async
//! runtime, yielding between them so a co-resident process stays responsive.
//! Cancellation is cooperative through the engine's stop flag, checked at
//! step granularity; termination comes from the epoch budget, early stopping,
//! or the watchdog's halt.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::core::{summarize, EpochReport, TrainingSummary};
use crate::error::{EngineError, Result};
use crate::training::checkpoint::{epoch_name, Checkpointer};
use crate::training::engine::TrainingEngine;

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Ran the full epoch budget
    Completed,
    /// Validation patience exhausted
    EarlyStopped,
    /// Cancelled through the stop flag
    Cancelled,
    /// Buffer never reached one batch
    InsufficientData,
}

/// Final report of a session run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub epochs_run: usize,
    pub stop_reason: StopReason,
    pub summary: TrainingSummary,
}

/// Background training session over an engine
pub struct TrainingSession {
    engine: TrainingEngine,
    checkpointer: Option<Checkpointer>,
}

impl TrainingSession {
    pub fn new(engine: TrainingEngine, checkpointer: Option<Checkpointer>) -> Self {
        Self {
            engine,
            checkpointer,
        }
    }

    pub fn engine(&self) -> &TrainingEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut TrainingEngine {
        &mut self.engine
    }

    /// Flag shared with the engine's step loop; set it to cancel.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.engine.stop_handle()
    }

    /// Drive the configured number of epochs. A watchdog halt is surfaced as
    /// the terminal `ResetBudgetExceeded` error, never retried.
    pub async fn run(&mut self) -> Result<SessionReport> {
        let epochs = self.engine.config().training.epochs;
        let checkpoint_interval = self.engine.config().training.checkpoint_interval;
        let stop = self.engine.stop_handle();

        let mut reports: Vec<EpochReport> = Vec::new();
        let mut stop_reason = StopReason::Completed;

        info!(epochs, "training session started");

        for epoch in 0..epochs {
            if stop.load(Ordering::SeqCst) {
                info!(epoch, "session cancelled");
                stop_reason = StopReason::Cancelled;
                break;
            }

            match self.engine.train_epoch() {
                Ok(report) => reports.push(report),
                Err(e @ EngineError::ResetBudgetExceeded { .. }) => {
                    error!(error = %e, "session halted by watchdog");
                    return Err(e);
                }
                Err(EngineError::InsufficientData { have, need }) => {
                    warn!(have, need, "not enough buffered experiences, ending session");
                    stop_reason = StopReason::InsufficientData;
                    break;
                }
                Err(e) => return Err(e),
            }

            if checkpoint_interval > 0 && (epoch + 1) % checkpoint_interval == 0 {
                self.write_checkpoint(&epoch_name("model", epoch + 1));
            }

            if self.engine.should_stop_early() {
                info!(epoch, "early stopping triggered");
                stop_reason = StopReason::EarlyStopped;
                break;
            }

            // Keep the host process responsive between epochs.
            tokio::task::yield_now().await;
        }

        if self.engine.is_initialized() {
            self.write_checkpoint("model_final");
        }

        let report = SessionReport {
            epochs_run: reports.len(),
            stop_reason,
            summary: summarize(&reports),
        };
        info!(
            epochs_run = report.epochs_run,
            stop_reason = ?report.stop_reason,
            final_loss = report.summary.final_loss,
            "training session finished"
        );
        Ok(report)
    }

    fn write_checkpoint(&self, name: &str) {
        let Some(keeper) = &self.checkpointer else {
            return;
        };
        match self.engine.to_checkpoint() {
            Ok(cp) => {
                if let Err(e) = keeper.save(&cp, name) {
                    warn!(error = %e, name, "checkpoint write failed");
                }
            }
            Err(e) => warn!(error = %e, name, "checkpoint assembly failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Architecture, EngineConfig};
    use crate::core::{Experience, FEATURE_COUNT};

    fn session(epochs: usize, experiences: usize) -> TrainingSession {
        let mut config = EngineConfig::default();
        config.training.epochs = epochs;
        config.training.checkpoint_interval = 0;
        config.network.init_seed = Some(42);
        config.buffer.seed = Some(7);

        let mut engine = TrainingEngine::new(config).unwrap();
        engine
            .initialize_network(Architecture::Compact, FEATURE_COUNT, 1)
            .unwrap();
        for i in 0..experiences {
            let reward = if i % 2 == 0 { 1.0 } else { -1.0 };
            engine.add_experience(Experience::new(vec![0.1 * (i % 7) as f64; FEATURE_COUNT], 1, reward));
        }
        TrainingSession::new(engine, None)
    }

    #[tokio::test]
    async fn session_runs_to_completion() {
        let mut session = session(3, 64);
        let report = session.run().await.unwrap();
        assert_eq!(report.stop_reason, StopReason::Completed);
        assert_eq!(report.epochs_run, 3);
        assert!(report.summary.final_loss.is_finite());
    }

    #[tokio::test]
    async fn session_without_data_reports_insufficient() {
        let mut session = session(3, 2);
        let report = session.run().await.unwrap();
        assert_eq!(report.stop_reason, StopReason::InsufficientData);
        assert_eq!(report.epochs_run, 0);
    }

    #[tokio::test]
    async fn cancelled_session_stops() {
        let mut session = session(1000, 64);
        session.stop_handle().store(true, Ordering::SeqCst);
        let report = session.run().await.unwrap();
        assert_eq!(report.stop_reason, StopReason::Cancelled);
        assert_eq!(report.epochs_run, 0);
    }
}
