//! Instability Watchdog
//!
//! Periodically inspects parameters, gradients and loss for non-finite
//! values or explosive norms. On detection it hands the caller the last
//! known-good checkpoint and a demoted learning-rate factor, up to a bounded
//! reset budget; past the budget the run is halted rather than silently
//! retrained against a drifted state.
//!
//! The checkpoint is a deep copy. Holding references into the live parameter
//! set would let a later mutation corrupt the "stable" snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::config::WatchdogConfig;
use crate::networks::dense::{count_non_finite, Matrix, Parameters};
use crate::optim::OptimizerState;

/// Watchdog state machine phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchdogPhase {
    /// Last check passed
    Stable,
    /// A check is due this step
    CheckDue,
    /// Instability detected, rollback pending application
    Resetting,
    /// Reset budget exhausted; terminal
    Halted,
}

impl std::fmt::Display for WatchdogPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchdogPhase::Stable => write!(f, "stable"),
            WatchdogPhase::CheckDue => write!(f, "check_due"),
            WatchdogPhase::Resetting => write!(f, "resetting"),
            WatchdogPhase::Halted => write!(f, "halted"),
        }
    }
}

/// Deep copy of the training state at a verified-stable step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StableCheckpoint {
    pub parameters: Parameters,
    pub optimizer: OptimizerState,
    pub loss: f64,
    pub step: u64,
}

/// One entry in the append-only reset log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetEvent {
    /// Step at which the reset fired
    pub step: u64,
    /// Triggering cause
    pub cause: String,
    /// Loss reading at detection
    pub loss: f64,
    /// Pre-clip gradient norm at detection
    pub gradient_norm: f64,
    /// NaN occurrences at detection
    pub nan_count: u32,
    /// Inf occurrences at detection
    pub inf_count: u32,
    /// Learning-rate factor applied by this reset
    pub lr_factor: f64,
    pub timestamp: DateTime<Utc>,
}

/// Mutable watchdog state, checkpointed with the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogState {
    pub phase: WatchdogPhase,
    /// Step of the most recent completed check
    pub last_check_step: u64,
    /// Cumulative reset count
    pub reset_count: u32,
    /// Cumulative NaN occurrences across all checks
    pub nan_total: u64,
    /// Cumulative Inf occurrences across all checks
    pub inf_total: u64,
    /// Last verified-stable snapshot, absent until the first passing check
    pub last_stable: Option<StableCheckpoint>,
    /// Append-only reset history
    pub reset_log: Vec<ResetEvent>,
}

impl Default for WatchdogState {
    fn default() -> Self {
        Self {
            phase: WatchdogPhase::Stable,
            last_check_step: 0,
            reset_count: 0,
            nan_total: 0,
            inf_total: 0,
            last_stable: None,
            reset_log: Vec::new(),
        }
    }
}

/// Outcome of one stability check
#[derive(Debug, Clone)]
pub struct StabilityReport {
    /// All readings within thresholds
    pub is_stable: bool,
    /// Caller must roll back and demote the learning rate
    pub should_reset: bool,
    /// Human-readable cause when unstable
    pub cause: Option<String>,
    /// NaN occurrences across parameters and gradients
    pub nan_count: u32,
    /// Inf occurrences across parameters and gradients
    pub inf_count: u32,
    /// Loss reading checked
    pub loss: f64,
    /// Gradient norm checked
    pub gradient_norm: f64,
    /// Learning-rate factor to apply when resetting
    pub lr_factor: Option<f64>,
}

impl StabilityReport {
    fn stable(nan: u32, inf: u32, loss: f64, gradient_norm: f64) -> Self {
        Self {
            is_stable: true,
            should_reset: false,
            cause: None,
            nan_count: nan,
            inf_count: inf,
            loss,
            gradient_norm,
            lr_factor: None,
        }
    }
}

/// Watchdog over the training loop's numeric health
#[derive(Debug, Clone)]
pub struct StabilityWatchdog {
    config: WatchdogConfig,
}

impl StabilityWatchdog {
    pub fn new(config: WatchdogConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WatchdogConfig {
        &self.config
    }

    /// Whether a check falls due at this step (Stable → CheckDue).
    pub fn check_due(&self, state: &WatchdogState, step: u64) -> bool {
        if state.phase == WatchdogPhase::Halted {
            return false;
        }
        step >= state.last_check_step + self.config.check_interval
    }

    /// Run one stability check over the live parameters, this step's
    /// gradients, the loss, and the pre-clip gradient norm.
    ///
    /// On a passing check the (parameters, optimizer, loss) triple is deep
    /// copied as the new stable checkpoint. On a failing check within budget
    /// the report demands a rollback; past the budget the watchdog halts.
    pub fn check(
        &self,
        state: &mut WatchdogState,
        params: &Parameters,
        grads: &[Matrix],
        optimizer: &OptimizerState,
        loss: f64,
        gradient_norm: f64,
        step: u64,
    ) -> StabilityReport {
        state.phase = WatchdogPhase::CheckDue;
        state.last_check_step = step;

        let (param_nan, param_inf) = params.count_non_finite();
        let (grad_nan, grad_inf) = count_non_finite(grads);
        let nan_count = param_nan + grad_nan;
        let inf_count = param_inf + grad_inf;
        state.nan_total += nan_count as u64;
        state.inf_total += inf_count as u64;

        let cause = self.classify(nan_count, inf_count, loss, gradient_norm);

        let Some(cause) = cause else {
            state.last_stable = Some(StableCheckpoint {
                parameters: params.clone(),
                optimizer: optimizer.clone(),
                loss,
                step,
            });
            state.phase = WatchdogPhase::Stable;
            debug!(step, loss, gradient_norm, "stability check passed");
            return StabilityReport::stable(nan_count, inf_count, loss, gradient_norm);
        };

        if state.reset_count >= self.config.max_resets {
            state.phase = WatchdogPhase::Halted;
            error!(
                step,
                resets = state.reset_count,
                max_resets = self.config.max_resets,
                %cause,
                "Max resets exceeded, halting training"
            );
            return StabilityReport {
                is_stable: false,
                should_reset: false,
                cause: Some("Max resets exceeded".to_string()),
                nan_count,
                inf_count,
                loss,
                gradient_norm,
                lr_factor: None,
            };
        }

        state.reset_count += 1;
        let lr_factor = self.config.reset_lr_factor.powi(state.reset_count as i32);
        state.phase = WatchdogPhase::Resetting;
        // The log is checkpointed as JSON, which cannot carry non-finite
        // readings; saturate them and let the cause string keep the exact text.
        state.reset_log.push(ResetEvent {
            step,
            cause: cause.clone(),
            loss: finite_or_max(loss),
            gradient_norm: finite_or_max(gradient_norm),
            nan_count,
            inf_count,
            lr_factor,
            timestamp: Utc::now(),
        });

        warn!(
            step,
            %cause,
            loss,
            gradient_norm,
            nan_count,
            inf_count,
            reset = state.reset_count,
            lr_factor,
            has_checkpoint = state.last_stable.is_some(),
            "instability detected, rolling back"
        );

        StabilityReport {
            is_stable: false,
            should_reset: true,
            cause: Some(cause),
            nan_count,
            inf_count,
            loss,
            gradient_norm,
            lr_factor: Some(lr_factor),
        }
    }

    /// Deep copy of the last stable checkpoint for the caller to apply.
    /// Absent when no check has ever passed; the caller then continues with
    /// its current, unrestored state.
    pub fn restore(&self, state: &WatchdogState) -> Option<StableCheckpoint> {
        state.last_stable.clone()
    }

    /// Resetting → Stable, once the caller has applied the restored state
    /// and the reduced learning rate.
    pub fn mark_recovered(&self, state: &mut WatchdogState) {
        if state.phase == WatchdogPhase::Resetting {
            state.phase = WatchdogPhase::Stable;
        }
    }

    fn classify(&self, nan: u32, inf: u32, loss: f64, gradient_norm: f64) -> Option<String> {
        if nan > self.config.nan_threshold {
            return Some(format!(
                "NaN values detected: {nan} > threshold {}",
                self.config.nan_threshold
            ));
        }
        if inf > self.config.inf_threshold {
            return Some(format!(
                "Inf values detected: {inf} > threshold {}",
                self.config.inf_threshold
            ));
        }
        if !loss.is_finite() || loss > self.config.loss_threshold {
            return Some(format!(
                "Loss diverged: {loss} exceeds threshold {}",
                self.config.loss_threshold
            ));
        }
        if !gradient_norm.is_finite() || gradient_norm > self.config.gradient_threshold {
            return Some(format!(
                "Gradient explosion: norm {gradient_norm} exceeds threshold {}",
                self.config.gradient_threshold
            ));
        }
        None
    }
}

fn finite_or_max(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        f64::MAX
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Architecture, WatchdogConfig};
    use crate::networks::dense::NetworkConfig;

    fn setup() -> (StabilityWatchdog, WatchdogState, Parameters, OptimizerState) {
        let net = NetworkConfig::build(Architecture::Compact, 4, 1).unwrap();
        let params = Parameters::initialize(&net, 1.0, Some(11));
        let optimizer = OptimizerState::for_parameters(&params);
        let watchdog = StabilityWatchdog::new(WatchdogConfig {
            check_interval: 10,
            max_resets: 2,
            ..Default::default()
        });
        (watchdog, WatchdogState::default(), params, optimizer)
    }

    #[test]
    fn check_due_follows_interval() {
        let (watchdog, state, _, _) = setup();
        assert!(!watchdog.check_due(&state, 5));
        assert!(watchdog.check_due(&state, 10));
        assert!(watchdog.check_due(&state, 37));
    }

    #[test]
    fn passing_check_snapshots_state() {
        let (watchdog, mut state, params, optimizer) = setup();
        let grads = params.zeros_like();

        let report = watchdog.check(&mut state, &params, &grads, &optimizer, 0.3, 1.0, 10);

        assert!(report.is_stable && !report.should_reset);
        assert_eq!(state.phase, WatchdogPhase::Stable);
        let snap = state.last_stable.as_ref().unwrap();
        assert_eq!(snap.parameters, params);
        assert_eq!(snap.step, 10);
    }

    #[test]
    fn single_nan_triggers_reset_with_cause() {
        let (watchdog, mut state, mut params, optimizer) = setup();
        let grads = params.zeros_like();
        params.layers[0][0][0] = f64::NAN;

        let report = watchdog.check(&mut state, &params, &grads, &optimizer, 0.3, 1.0, 10);

        assert!(!report.is_stable);
        assert!(report.should_reset);
        assert!(report.cause.as_ref().unwrap().contains("NaN"));
        assert_eq!(state.reset_count, 1);
        assert_eq!(state.phase, WatchdogPhase::Resetting);
        assert_eq!(state.reset_log.len(), 1);
        assert_eq!(state.reset_log[0].nan_count, 1);
    }

    #[test]
    fn loss_divergence_triggers_reset() {
        let (watchdog, mut state, params, optimizer) = setup();
        let grads = params.zeros_like();

        let report = watchdog.check(&mut state, &params, &grads, &optimizer, 1e9, 1.0, 10);
        assert!(report.should_reset);
        assert!(report.cause.unwrap().contains("Loss diverged"));

        watchdog.mark_recovered(&mut state);
        let report = watchdog.check(&mut state, &params, &grads, &optimizer, f64::NAN, 1.0, 20);
        assert!(report.should_reset);
        assert_eq!(state.reset_count, 2);
    }

    #[test]
    fn gradient_explosion_triggers_reset() {
        let (watchdog, mut state, params, optimizer) = setup();
        let grads = params.zeros_like();

        let report = watchdog.check(&mut state, &params, &grads, &optimizer, 0.3, 1e7, 10);
        assert!(report.should_reset);
        assert!(report.cause.unwrap().contains("Gradient explosion"));
    }

    #[test]
    fn reset_budget_halts_on_excess() {
        let (watchdog, mut state, mut params, optimizer) = setup();
        let grads = params.zeros_like();
        params.layers[0][0][0] = f64::NAN;

        // max_resets = 2: two qualifying resets, then the third check halts.
        for i in 1..=2u64 {
            let report =
                watchdog.check(&mut state, &params, &grads, &optimizer, 0.3, 1.0, i * 10);
            assert!(report.should_reset);
            watchdog.mark_recovered(&mut state);
        }
        let report = watchdog.check(&mut state, &params, &grads, &optimizer, 0.3, 1.0, 30);

        assert!(!report.is_stable);
        assert!(!report.should_reset);
        assert_eq!(report.cause.as_deref(), Some("Max resets exceeded"));
        assert_eq!(state.phase, WatchdogPhase::Halted);
        assert_eq!(state.reset_count, 2);
        assert!(!watchdog.check_due(&state, 1_000));
    }

    #[test]
    fn lr_factor_compounds_per_reset() {
        let (watchdog, mut state, mut params, optimizer) = setup();
        let grads = params.zeros_like();
        params.layers[0][0][0] = f64::INFINITY;

        let first = watchdog.check(&mut state, &params, &grads, &optimizer, 0.3, 1.0, 10);
        watchdog.mark_recovered(&mut state);
        let second = watchdog.check(&mut state, &params, &grads, &optimizer, 0.3, 1.0, 20);

        assert_eq!(first.lr_factor, Some(0.5));
        assert_eq!(second.lr_factor, Some(0.25));
    }

    #[test]
    fn checkpoint_is_aliasing_free() {
        let (watchdog, mut state, mut params, optimizer) = setup();
        let grads = params.zeros_like();

        watchdog.check(&mut state, &params, &grads, &optimizer, 0.3, 1.0, 10);
        let captured = params.clone();

        // Mutating the live parameters must not touch the snapshot.
        params.layers[0][0][0] = 123.0;
        let mut restored = watchdog.restore(&state).unwrap();
        assert_eq!(restored.parameters, captured);

        // Mutating the restored copy must not touch the stored checkpoint.
        restored.parameters.layers[0][0][0] = -7.0;
        assert_eq!(
            watchdog.restore(&state).unwrap().parameters,
            captured
        );
    }

    #[test]
    fn restore_absent_before_first_pass() {
        let (watchdog, state, _, _) = setup();
        assert!(watchdog.restore(&state).is_none());
    }
}
