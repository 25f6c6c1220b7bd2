//! Exploration Strategy
//!
//! Epsilon / temperature on a linear decay schedule from `start` to `end`
//! over `decay_steps`. This is a policy-level concept independent of
//! numerical stability: watchdog rollbacks never touch it.

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{ExplorationConfig, ExplorationMode};
use crate::networks::activation::softmax;

/// Mutable exploration state, never rolled back by the watchdog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExplorationState {
    /// Decay step counter
    pub step: u64,
    /// Selections that explored
    pub explore_count: u64,
    /// Selections that exploited
    pub exploit_count: u64,
}

/// Exploration schedule and action selection
#[derive(Debug, Clone)]
pub struct ExplorationSchedule {
    config: ExplorationConfig,
    state: ExplorationState,
}

impl ExplorationSchedule {
    pub fn new(config: ExplorationConfig) -> Self {
        Self {
            config,
            state: ExplorationState::default(),
        }
    }

    /// Current epsilon (epsilon-greedy) or temperature (softmax mode).
    pub fn current_epsilon(&self) -> f64 {
        let progress = (self.state.step as f64 / self.config.decay_steps as f64).min(1.0);
        self.config.start + (self.config.end - self.config.start) * progress
    }

    /// Advance the decay counter by one training step.
    pub fn step(&mut self) {
        self.state.step = self.state.step.saturating_add(1);
    }

    /// Pick an action index from network output scores.
    pub fn select_action(&mut self, scores: &[f64], rng: &mut StdRng) -> usize {
        if scores.is_empty() {
            return 0;
        }
        match self.config.mode {
            ExplorationMode::EpsilonGreedy => {
                if rng.gen::<f64>() < self.current_epsilon() {
                    self.state.explore_count += 1;
                    rng.gen_range(0..scores.len())
                } else {
                    self.state.exploit_count += 1;
                    argmax(scores)
                }
            }
            ExplorationMode::SoftmaxTemperature => {
                let temp = self.current_epsilon().max(1e-6);
                let scaled: Vec<f64> = scores.iter().map(|s| s / temp).collect();
                let probs = softmax(&scaled);
                let choice = sample_categorical(&probs, rng);
                if choice == argmax(scores) {
                    self.state.exploit_count += 1;
                } else {
                    self.state.explore_count += 1;
                }
                choice
            }
        }
    }

    /// Fraction of recorded selections that explored.
    pub fn exploration_ratio(&self) -> f64 {
        let total = self.state.explore_count + self.state.exploit_count;
        if total == 0 {
            0.0
        } else {
            self.state.explore_count as f64 / total as f64
        }
    }

    /// Fraction of recorded selections that exploited.
    pub fn exploitation_ratio(&self) -> f64 {
        let total = self.state.explore_count + self.state.exploit_count;
        if total == 0 {
            0.0
        } else {
            self.state.exploit_count as f64 / total as f64
        }
    }

    pub fn state(&self) -> &ExplorationState {
        &self.state
    }

    /// Restore persisted counters (checkpoint resume).
    pub fn restore_state(&mut self, state: ExplorationState) {
        self.state = state;
    }
}

fn argmax(scores: &[f64]) -> usize {
    let mut best = 0;
    for (i, s) in scores.iter().enumerate() {
        if *s > scores[best] {
            best = i;
        }
    }
    best
}

fn sample_categorical(probs: &[f64], rng: &mut StdRng) -> usize {
    let draw: f64 = rng.gen();
    let mut acc = 0.0;
    for (i, p) in probs.iter().enumerate() {
        acc += p;
        if draw < acc {
            return i;
        }
    }
    probs.len() - 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::networks::init::rng_from_seed;

    fn config(mode: ExplorationMode) -> ExplorationConfig {
        ExplorationConfig {
            start: 1.0,
            end: 0.1,
            decay_steps: 100,
            mode,
        }
    }

    #[test]
    fn epsilon_decays_linearly_to_end() {
        let mut sched = ExplorationSchedule::new(config(ExplorationMode::EpsilonGreedy));
        assert_eq!(sched.current_epsilon(), 1.0);
        for _ in 0..50 {
            sched.step();
        }
        assert!((sched.current_epsilon() - 0.55).abs() < 1e-9);
        for _ in 0..200 {
            sched.step();
        }
        assert_eq!(sched.current_epsilon(), 0.1);
    }

    #[test]
    fn greedy_when_epsilon_exhausted() {
        let mut sched = ExplorationSchedule::new(ExplorationConfig {
            start: 0.0,
            end: 0.0,
            decay_steps: 1,
            mode: ExplorationMode::EpsilonGreedy,
        });
        let mut rng = rng_from_seed(Some(3));
        for _ in 0..20 {
            assert_eq!(sched.select_action(&[0.1, 0.9, 0.3], &mut rng), 1);
        }
        assert_eq!(sched.exploitation_ratio(), 1.0);
    }

    #[test]
    fn full_epsilon_explores() {
        let mut sched = ExplorationSchedule::new(ExplorationConfig {
            start: 1.0,
            end: 1.0,
            decay_steps: 1,
            mode: ExplorationMode::EpsilonGreedy,
        });
        let mut rng = rng_from_seed(Some(4));
        for _ in 0..50 {
            sched.select_action(&[0.1, 0.9], &mut rng);
        }
        assert_eq!(sched.exploration_ratio(), 1.0);
    }

    #[test]
    fn softmax_mode_prefers_high_scores_when_cold() {
        let mut sched = ExplorationSchedule::new(ExplorationConfig {
            start: 0.05,
            end: 0.05,
            decay_steps: 1,
            mode: ExplorationMode::SoftmaxTemperature,
        });
        let mut rng = rng_from_seed(Some(5));
        let mut hits = 0;
        for _ in 0..100 {
            if sched.select_action(&[0.0, 1.0, 0.2], &mut rng) == 1 {
                hits += 1;
            }
        }
        assert!(hits > 90, "hits={hits}");
    }

    #[test]
    fn ratios_sum_to_one_once_active() {
        let mut sched = ExplorationSchedule::new(config(ExplorationMode::EpsilonGreedy));
        let mut rng = rng_from_seed(Some(6));
        for _ in 0..10 {
            sched.select_action(&[0.2, 0.8], &mut rng);
        }
        let sum = sched.exploration_ratio() + sched.exploitation_ratio();
        assert!((sum - 1.0).abs() < 1e-12);
    }
}
