//! Learning-Rate Scheduler
//!
//! Plateau detection over a bounded window of recent losses. The trend is the
//! difference between the newer and older half of the window; when the newer
//! half stops improving for `patience` consecutive steps, the rate decays.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SchedulerConfig;

/// Mutable scheduler state, checkpointed with the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerState {
    /// Current learning rate
    pub current_lr: f64,
    /// Bounded history of recent losses, newest last
    pub recent_losses: VecDeque<f64>,
    /// Consecutive plateaued steps
    pub plateau_steps: u32,
}

impl SchedulerState {
    pub fn new(initial_lr: f64) -> Self {
        Self {
            current_lr: initial_lr,
            recent_losses: VecDeque::new(),
            plateau_steps: 0,
        }
    }
}

/// Loss-trend-driven learning-rate scheduler
#[derive(Debug, Clone)]
pub struct LrScheduler {
    config: SchedulerConfig,
}

impl LrScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    pub fn current_lr(&self, state: &SchedulerState) -> f64 {
        state.current_lr
    }

    /// Record one loss observation and return the (possibly decayed)
    /// learning rate. Non-finite losses are the watchdog's problem and do
    /// not enter the window.
    pub fn step(&self, state: &mut SchedulerState, loss: f64) -> f64 {
        if loss.is_finite() {
            state.recent_losses.push_back(loss);
            while state.recent_losses.len() > self.config.window {
                state.recent_losses.pop_front();
            }
        }

        if self.is_plateaued(state) {
            state.plateau_steps += 1;
        } else {
            state.plateau_steps = 0;
        }

        if state.plateau_steps >= self.config.patience {
            let next = (state.current_lr * self.config.decay_factor).max(self.config.min_lr);
            if next < state.current_lr {
                debug!(
                    old_lr = state.current_lr,
                    new_lr = next,
                    "loss plateaued, decaying learning rate"
                );
            }
            state.current_lr = next;
            state.plateau_steps = 0;
        }

        state.current_lr
    }

    /// Force a rate (watchdog demotion), still bounded below by min_lr.
    pub fn force_lr(&self, state: &mut SchedulerState, lr: f64) {
        state.current_lr = lr.max(self.config.min_lr);
        state.plateau_steps = 0;
    }

    /// Moving-average trend: newer half of the window no better than the
    /// older half. A partially filled window is never a plateau.
    fn is_plateaued(&self, state: &SchedulerState) -> bool {
        let window = &state.recent_losses;
        if window.len() < self.config.window.max(2) {
            return false;
        }
        let half = window.len() / 2;
        let older: f64 = window.iter().take(half).sum::<f64>() / half as f64;
        let newer: f64 =
            window.iter().skip(half).sum::<f64>() / (window.len() - half) as f64;
        newer >= older
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler() -> LrScheduler {
        LrScheduler::new(SchedulerConfig {
            initial_lr: Some(1e-2),
            decay_factor: 0.5,
            patience: 3,
            min_lr: 1e-5,
            window: 6,
        })
    }

    #[test]
    fn improving_loss_keeps_rate() {
        let sched = scheduler();
        let mut state = SchedulerState::new(1e-2);
        for i in 0..30 {
            sched.step(&mut state, 1.0 / (i + 1) as f64);
        }
        assert_eq!(state.current_lr, 1e-2);
    }

    #[test]
    fn flat_loss_decays_rate() {
        let sched = scheduler();
        let mut state = SchedulerState::new(1e-2);
        for _ in 0..12 {
            sched.step(&mut state, 0.5);
        }
        assert!(state.current_lr < 1e-2);
    }

    #[test]
    fn rate_bounded_below_by_min_lr() {
        let sched = scheduler();
        let mut state = SchedulerState::new(1e-2);
        for _ in 0..500 {
            sched.step(&mut state, 0.5);
        }
        assert_eq!(state.current_lr, 1e-5);
    }

    #[test]
    fn force_lr_respects_floor() {
        let sched = scheduler();
        let mut state = SchedulerState::new(1e-2);
        sched.force_lr(&mut state, 1e-9);
        assert_eq!(state.current_lr, 1e-5);
        sched.force_lr(&mut state, 5e-3);
        assert_eq!(state.current_lr, 5e-3);
    }

    #[test]
    fn window_stays_bounded() {
        let sched = scheduler();
        let mut state = SchedulerState::new(1e-2);
        for i in 0..100 {
            sched.step(&mut state, i as f64);
        }
        assert_eq!(state.recent_losses.len(), 6);
    }

    #[test]
    fn non_finite_loss_skips_window() {
        let sched = scheduler();
        let mut state = SchedulerState::new(1e-2);
        sched.step(&mut state, f64::NAN);
        assert!(state.recent_losses.is_empty());
    }
}
