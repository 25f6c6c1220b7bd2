//! Experience Records
//!
//! A single training sample plus the market-data boundary that produces it.
//! The external pipeline pushes snapshots/actions/rewards; the engine encodes
//! them into fixed-width feature vectors and stores them in the buffer.

use serde::{Deserialize, Serialize};

/// Width of the encoded market feature vector
pub const FEATURE_COUNT: usize = 10;

/// A single (state, action, reward) training sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experience {
    /// Encoded state features
    pub state: Vec<f64>,
    /// Action taken (0 = hold, 1 = buy, 2 = sell)
    pub action: usize,
    /// Reward received
    pub reward: f64,
    /// State features after the action, when observed
    pub next_state: Option<Vec<f64>>,
    /// Temporal-difference error, written back by the buffer after training
    pub td_error: Option<f64>,
}

impl Experience {
    /// Create a new experience
    pub fn new(state: Vec<f64>, action: usize, reward: f64) -> Self {
        Self {
            state,
            action,
            reward,
            next_state: None,
            td_error: None,
        }
    }

    /// Set the follow-up state
    pub fn with_next_state(mut self, next_state: Vec<f64>) -> Self {
        self.next_state = Some(next_state);
        self
    }
}

/// One market observation at the ingestion boundary
///
/// Everything the encoder needs to produce a state vector; fields the feed
/// cannot provide default to zero and encode as neutral.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Mid price
    pub mid_price: f64,
    /// Bid/ask spread
    pub spread: f64,
    /// Short-horizon momentum (1 tick)
    pub momentum_1: f64,
    /// Medium-horizon momentum (5 ticks)
    pub momentum_5: f64,
    /// Long-horizon momentum (15 ticks)
    pub momentum_15: f64,
    /// Traded volume over the last interval
    pub volume: f64,
    /// Realized volatility estimate
    pub volatility: f64,
    /// Order-book imbalance in [-1, 1]
    pub imbalance: f64,
    /// Hour of day, cyclically encoded (sin component)
    pub hour_sin: f64,
    /// Hour of day, cyclically encoded (cos component)
    pub hour_cos: f64,
}

impl MarketSnapshot {
    /// Encode into the fixed-width feature vector consumed by the network.
    ///
    /// Values are squashed into ranges a small dense net digests: prices are
    /// log-scaled, unbounded magnitudes clamped.
    pub fn encode(&self) -> Vec<f64> {
        let mut features = Vec::with_capacity(FEATURE_COUNT);
        features.push((self.mid_price.max(0.0) + 1.0).ln());
        features.push(self.spread.clamp(0.0, 1.0));
        features.push(self.momentum_1.clamp(-1.0, 1.0));
        features.push(self.momentum_5.clamp(-1.0, 1.0));
        features.push(self.momentum_15.clamp(-1.0, 1.0));
        features.push((self.volume.max(0.0) + 1.0).ln());
        features.push(self.volatility.clamp(0.0, 1.0));
        features.push(self.imbalance.clamp(-1.0, 1.0));
        features.push(self.hour_sin);
        features.push(self.hour_cos);
        debug_assert_eq!(features.len(), FEATURE_COUNT);
        features
    }
}
