//! Training Metrics
//!
//! Immutable per-step metrics plus epoch and run-level aggregation. Metrics
//! are observability output only; the engine never reads them back except for
//! early-stopping decisions on validation loss.

use serde::{Deserialize, Serialize};

/// Metrics emitted by a single training step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingMetrics {
    /// Global step counter at emission
    pub step: u64,
    /// Epoch the step belongs to
    pub epoch: usize,
    /// Batch loss (MSE plus L2 term when enabled)
    pub loss: f64,
    /// Fraction of samples where sign(prediction - 0.5) matches sign(reward)
    pub directional_accuracy: f64,
    /// Fraction of samples where the 3-bucket prediction matches the action
    pub classification_accuracy: f64,
    /// Pre-clip global gradient norm
    pub gradient_norm: f64,
    /// Whether the clipper rescaled this step's gradients
    pub was_clipped: bool,
    /// Learning rate used for the update
    pub learning_rate: f64,
    /// Cumulative watchdog resets
    pub reset_count: u32,
    /// NaN occurrences observed at the last stability check
    pub nan_count: u32,
    /// Inf occurrences observed at the last stability check
    pub inf_count: u32,
    /// Whether this step triggered a rollback
    pub was_reset: bool,
    /// Current exploration epsilon / temperature
    pub epsilon: f64,
    /// Fraction of recorded selections that explored
    pub exploration_ratio: f64,
}

/// Aggregated result of one epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochReport {
    /// Epoch index
    pub epoch: usize,
    /// Per-step metrics in step order
    pub steps: Vec<TrainingMetrics>,
    /// Mean training loss across steps
    pub train_loss: f64,
    /// Forward-only loss on the validation split
    pub validation_loss: Option<f64>,
    /// Whether validation loss improved past min_delta
    pub improved: bool,
}

impl EpochReport {
    pub fn from_steps(
        epoch: usize,
        steps: Vec<TrainingMetrics>,
        validation_loss: Option<f64>,
        improved: bool,
    ) -> Self {
        let train_loss = if steps.is_empty() {
            0.0
        } else {
            steps.iter().map(|m| m.loss).sum::<f64>() / steps.len() as f64
        };
        Self {
            epoch,
            steps,
            train_loss,
            validation_loss,
            improved,
        }
    }
}

/// Summary statistics across a full run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingSummary {
    /// Epochs completed
    pub epochs: usize,
    /// Total optimizer steps
    pub total_steps: usize,
    /// Mean training loss of the final epoch
    pub final_loss: f64,
    /// Best validation loss observed
    pub best_validation_loss: Option<f64>,
    /// Mean directional accuracy across all steps
    pub avg_directional_accuracy: f64,
    /// Watchdog resets over the run
    pub resets: u32,
    /// Steps where the clipper engaged
    pub clipped_steps: usize,
}

/// Calculate run summary statistics from epoch reports
pub fn summarize(reports: &[EpochReport]) -> TrainingSummary {
    if reports.is_empty() {
        return TrainingSummary::default();
    }

    let all_steps: Vec<&TrainingMetrics> = reports.iter().flat_map(|r| r.steps.iter()).collect();
    let total_steps = all_steps.len();

    let avg_directional_accuracy = if total_steps > 0 {
        all_steps.iter().map(|m| m.directional_accuracy).sum::<f64>() / total_steps as f64
    } else {
        0.0
    };

    let best_validation_loss = reports
        .iter()
        .filter_map(|r| r.validation_loss)
        .fold(None, |best: Option<f64>, v| match best {
            Some(b) if b <= v => Some(b),
            _ => Some(v),
        });

    TrainingSummary {
        epochs: reports.len(),
        total_steps,
        final_loss: reports.last().map(|r| r.train_loss).unwrap_or(0.0),
        best_validation_loss,
        avg_directional_accuracy,
        resets: all_steps.last().map(|m| m.reset_count).unwrap_or(0),
        clipped_steps: all_steps.iter().filter(|m| m.was_clipped).count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(loss: f64, acc: f64) -> TrainingMetrics {
        TrainingMetrics {
            step: 0,
            epoch: 0,
            loss,
            directional_accuracy: acc,
            classification_accuracy: 0.0,
            gradient_norm: 1.0,
            was_clipped: false,
            learning_rate: 1e-3,
            reset_count: 0,
            nan_count: 0,
            inf_count: 0,
            was_reset: false,
            epsilon: 1.0,
            exploration_ratio: 0.0,
        }
    }

    #[test]
    fn epoch_report_averages_loss() {
        let report = EpochReport::from_steps(0, vec![metric(1.0, 0.5), metric(3.0, 0.5)], None, false);
        assert!((report.train_loss - 2.0).abs() < 1e-12);
    }

    #[test]
    fn summarize_tracks_best_validation() {
        let reports = vec![
            EpochReport::from_steps(0, vec![metric(1.0, 0.4)], Some(0.9), true),
            EpochReport::from_steps(1, vec![metric(0.8, 0.6)], Some(0.7), true),
            EpochReport::from_steps(2, vec![metric(0.9, 0.6)], Some(0.8), false),
        ];
        let summary = summarize(&reports);
        assert_eq!(summary.epochs, 3);
        assert_eq!(summary.total_steps, 3);
        assert_eq!(summary.best_validation_loss, Some(0.7));
    }

    #[test]
    fn summarize_empty_is_default() {
        let summary = summarize(&[]);
        assert_eq!(summary.epochs, 0);
        assert_eq!(summary.total_steps, 0);
    }
}
