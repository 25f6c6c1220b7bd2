//! Synthetic Market Data
//!
//! Seedable random-walk quote generator with mean reversion, used to
//! exercise the engine without a live pipeline (CLI runs, integration
//! tests). Actions follow a simple momentum heuristic; rewards score the
//! action against the next tick's realized move.

use rand::rngs::StdRng;
use rand::Rng;

use crate::core::MarketSnapshot;
use crate::networks::init::rng_from_seed;

/// A generated series of observations with derived actions and rewards
#[derive(Debug, Clone)]
pub struct SyntheticSeries {
    pub snapshots: Vec<MarketSnapshot>,
    pub actions: Vec<usize>,
    pub rewards: Vec<f64>,
}

impl SyntheticSeries {
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

/// Generate `ticks` observations of a mean-reverting random walk.
pub fn generate_market_series(ticks: usize, volatility: f64, seed: u64) -> SyntheticSeries {
    let mut rng: StdRng = rng_from_seed(Some(seed));
    let volatility = volatility.max(1e-6);

    // Price path first, so momentum and rewards can look back and ahead.
    let mut mids = Vec::with_capacity(ticks);
    let mut mid: f64 = 0.5;
    for _ in 0..ticks {
        let change = rng.gen_range(-volatility..volatility) + 0.001 * (0.5 - mid);
        mid = (mid + change).clamp(0.10, 0.90);
        mids.push(mid);
    }

    let momentum = |i: usize, k: usize| -> f64 {
        if i < k {
            return 0.0;
        }
        ((mids[i] - mids[i - k]) / mids[i - k]).clamp(-1.0, 1.0)
    };

    let mut snapshots = Vec::with_capacity(ticks);
    let mut actions = Vec::with_capacity(ticks);
    let mut rewards = Vec::with_capacity(ticks);

    for i in 0..ticks {
        let spread = 0.01 + rng.gen_range(0.0..0.02);
        let m1 = momentum(i, 1);
        let hour = (i / 3600) % 24;
        let angle = 2.0 * std::f64::consts::PI * hour as f64 / 24.0;

        snapshots.push(MarketSnapshot {
            mid_price: mids[i],
            spread,
            momentum_1: m1,
            momentum_5: momentum(i, 5),
            momentum_15: momentum(i, 15),
            volume: rng.gen_range(10.0..1_000.0),
            volatility: (volatility + rng.gen_range(-0.005..0.005)).clamp(0.0, 1.0),
            imbalance: (m1 * 5.0 + rng.gen_range(-0.3..0.3)).clamp(-1.0, 1.0),
            hour_sin: angle.sin(),
            hour_cos: angle.cos(),
        });

        // Momentum-following policy with a dead zone.
        let action = if m1 > 0.002 {
            1 // buy
        } else if m1 < -0.002 {
            2 // sell
        } else {
            0 // hold
        };
        actions.push(action);

        // Score against the next realized move; the final tick has none.
        let reward = match mids.get(i + 1) {
            Some(&next) => {
                let ret = (next - mids[i]) / mids[i];
                match action {
                    1 => (ret * 50.0).clamp(-1.0, 1.0),
                    2 => (-ret * 50.0).clamp(-1.0, 1.0),
                    _ => -0.05 * (ret * 50.0).abs().min(1.0),
                }
            }
            None => 0.0,
        };
        rewards.push(reward);
    }

    SyntheticSeries {
        snapshots,
        actions,
        rewards,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_requested_length() {
        let series = generate_market_series(500, 0.02, 1);
        assert_eq!(series.len(), 500);
        assert_eq!(series.actions.len(), 500);
        assert_eq!(series.rewards.len(), 500);
    }

    #[test]
    fn prices_stay_in_band() {
        let series = generate_market_series(2_000, 0.05, 2);
        assert!(series
            .snapshots
            .iter()
            .all(|s| (0.10..=0.90).contains(&s.mid_price)));
    }

    #[test]
    fn same_seed_same_series() {
        let a = generate_market_series(100, 0.02, 42);
        let b = generate_market_series(100, 0.02, 42);
        assert_eq!(a.rewards, b.rewards);
        assert_eq!(a.actions, b.actions);
    }

    #[test]
    fn rewards_are_bounded() {
        let series = generate_market_series(1_000, 0.05, 3);
        assert!(series.rewards.iter().all(|r| (-1.0..=1.0).contains(r)));
    }
}
