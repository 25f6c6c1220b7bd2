//! Replay Buffer
//!
//! Fixed-capacity, priority-weighted experience store. Eviction is
//! deterministic given the priority policy and insertion order: the
//! lowest-priority slot goes first, oldest first among ties.

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::config::BufferConfig;
use crate::core::Experience;
use crate::error::{EngineError, Result};
use crate::networks::init::rng_from_seed;

/// Priority-weighted experience replay buffer
#[derive(Debug)]
pub struct ExperienceBuffer {
    entries: Vec<Experience>,
    priorities: Vec<f64>,
    /// Insertion sequence per slot, for deterministic tie-breaking
    seq: Vec<u64>,
    next_seq: u64,
    config: BufferConfig,
    rng: StdRng,
}

impl ExperienceBuffer {
    pub fn new(config: BufferConfig) -> Self {
        let rng = rng_from_seed(config.seed);
        Self {
            entries: Vec::with_capacity(config.capacity),
            priorities: Vec::with_capacity(config.capacity),
            seq: Vec::with_capacity(config.capacity),
            next_seq: 0,
            config,
            rng,
        }
    }

    /// Add an experience at the default priority.
    pub fn add(&mut self, experience: Experience) {
        let priority = self.config.default_priority;
        self.add_with_priority(experience, priority);
    }

    /// Add an experience, evicting the lowest-priority (then oldest) slot
    /// when full.
    pub fn add_with_priority(&mut self, experience: Experience, priority: f64) {
        let priority = if priority.is_finite() && priority > 0.0 {
            priority
        } else {
            self.config.default_priority
        };

        if self.entries.len() < self.config.capacity {
            self.entries.push(experience);
            self.priorities.push(priority);
            self.seq.push(self.next_seq);
        } else {
            let victim = self.eviction_index();
            self.entries[victim] = experience;
            self.priorities[victim] = priority;
            self.seq[victim] = self.next_seq;
        }
        self.next_seq += 1;
    }

    fn eviction_index(&self) -> usize {
        let mut victim = 0;
        for i in 1..self.entries.len() {
            let (p, s) = (self.priorities[i], self.seq[i]);
            let (vp, vs) = (self.priorities[victim], self.seq[victim]);
            if p < vp || (p == vp && s < vs) {
                victim = i;
            }
        }
        victim
    }

    /// Sample `n` experiences with probability proportional to priority
    /// (uniform without replacement when prioritization is disabled).
    /// Returns the experiences plus their buffer indices for later priority
    /// updates. Prioritized draws are with replacement.
    pub fn sample_batch(&mut self, n: usize) -> Result<(Vec<Experience>, Vec<usize>)> {
        if n == 0 || self.entries.len() < n {
            return Err(EngineError::InsufficientData {
                have: self.entries.len(),
                need: n,
            });
        }

        let indices: Vec<usize> = if self.config.prioritized {
            match WeightedIndex::new(&self.priorities) {
                Ok(dist) => (0..n).map(|_| dist.sample(&mut self.rng)).collect(),
                // All-zero or otherwise degenerate weights: fall back to uniform.
                Err(_) => self.uniform_indices(n),
            }
        } else {
            self.uniform_indices(n)
        };

        let batch = indices.iter().map(|&i| self.entries[i].clone()).collect();
        Ok((batch, indices))
    }

    fn uniform_indices(&mut self, n: usize) -> Vec<usize> {
        let mut all: Vec<usize> = (0..self.entries.len()).collect();
        all.shuffle(&mut self.rng);
        all.truncate(n);
        all
    }

    /// Overwrite priorities from TD errors: `priority = |td| + ε`. The TD
    /// error is also written back onto the stored experience.
    pub fn update_priorities(&mut self, indices: &[usize], td_errors: &[f64]) {
        for (&idx, &td) in indices.iter().zip(td_errors) {
            if idx >= self.entries.len() || !td.is_finite() {
                continue;
            }
            self.priorities[idx] = td.abs() + self.config.priority_epsilon;
            self.entries[idx].td_error = Some(td);
        }
    }

    /// Clone out every stored experience (epoch train/validation split).
    pub fn snapshot(&self) -> Vec<Experience> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Check if the buffer has enough samples for a batch
    pub fn has_enough_samples(&self, min_samples: usize) -> bool {
        self.entries.len() >= min_samples
    }

    /// Fill ratio (0.0 to 1.0)
    pub fn fill_ratio(&self) -> f64 {
        self.entries.len() as f64 / self.config.capacity as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(capacity: usize, prioritized: bool) -> ExperienceBuffer {
        ExperienceBuffer::new(BufferConfig {
            capacity,
            prioritized,
            default_priority: 1.0,
            priority_epsilon: 1e-3,
            seed: Some(17),
        })
    }

    fn experience(reward: f64) -> Experience {
        Experience::new(vec![0.0; 4], 0, reward)
    }

    #[test]
    fn capacity_is_never_exceeded() {
        let mut buf = buffer(10, true);
        for i in 0..25 {
            buf.add(experience(i as f64));
        }
        assert_eq!(buf.len(), 10);
        assert!((buf.fill_ratio() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn eviction_removes_lowest_priority_oldest_first() {
        let mut buf = buffer(3, true);
        buf.add_with_priority(experience(0.0), 1.0);
        buf.add_with_priority(experience(1.0), 1.0);
        buf.add_with_priority(experience(2.0), 5.0);
        // Slot 0 and 1 tie at priority 1.0; slot 0 is older and goes first.
        buf.add_with_priority(experience(3.0), 2.0);
        let rewards: Vec<f64> = buf.snapshot().iter().map(|e| e.reward).collect();
        assert_eq!(rewards, vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn sample_returns_exactly_n() {
        let mut buf = buffer(100, true);
        for i in 0..50 {
            buf.add(experience(i as f64));
        }
        let (batch, indices) = buf.sample_batch(16).unwrap();
        assert_eq!(batch.len(), 16);
        assert_eq!(indices.len(), 16);
        assert!(indices.iter().all(|&i| i < 50));
    }

    #[test]
    fn sample_beyond_len_is_insufficient_data() {
        let mut buf = buffer(100, true);
        buf.add(experience(0.0));
        let err = buf.sample_batch(2).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientData { have: 1, need: 2 }));
    }

    #[test]
    fn uniform_sampling_has_distinct_indices() {
        let mut buf = buffer(100, false);
        for i in 0..20 {
            buf.add(experience(i as f64));
        }
        let (_, mut indices) = buf.sample_batch(20).unwrap();
        indices.sort_unstable();
        indices.dedup();
        assert_eq!(indices.len(), 20);
    }

    #[test]
    fn priority_update_biases_sampling() {
        let mut buf = buffer(20, true);
        for i in 0..20 {
            buf.add(experience(i as f64));
        }
        // Make index 7 dominate.
        buf.update_priorities(&[7], &[100.0]);
        assert_eq!(buf.snapshot()[7].td_error, Some(100.0));

        let mut hits = 0;
        let draws = 2000;
        for _ in 0..draws / 10 {
            let (_, indices) = buf.sample_batch(10).unwrap();
            hits += indices.iter().filter(|&&i| i == 7).count();
        }
        // Uniform would give ~draws/20 = 100; the boosted item should be
        // drawn far more often.
        assert!(hits > draws / 4, "hits={hits}");
    }

    #[test]
    fn non_finite_td_errors_are_ignored() {
        let mut buf = buffer(4, true);
        buf.add(experience(0.0));
        buf.update_priorities(&[0], &[f64::NAN]);
        assert_eq!(buf.snapshot()[0].td_error, None);
    }
}
