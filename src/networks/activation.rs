//! Activation Library
//!
//! Numerically bounded activations. Inputs are clamped to a configurable
//! symmetric range before evaluation and outputs to [-OUTPUT_CLAMP,
//! OUTPUT_CLAMP] so an overflow in one layer cannot propagate downstream.
//! Pure functions, no shared state.

use serde::{Deserialize, Serialize};

/// Hard bound on every activation output
pub const OUTPUT_CLAMP: f64 = 1e6;

/// Negative-side slope of the leaky ReLU
const LEAKY_SLOPE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    LeakyRelu,
    Sigmoid,
    Tanh,
}

impl Activation {
    /// Evaluate with input clamped to [-input_clip, input_clip] and output
    /// clamped to the global bound.
    pub fn apply(self, x: f64, input_clip: f64) -> f64 {
        let x = clamp_finite(x, input_clip);
        let y = match self {
            Activation::LeakyRelu => {
                if x > 0.0 {
                    x
                } else {
                    LEAKY_SLOPE * x
                }
            }
            Activation::Sigmoid => sigmoid(x),
            Activation::Tanh => x.tanh(),
        };
        y.clamp(-OUTPUT_CLAMP, OUTPUT_CLAMP)
    }

    /// Derivative with respect to the (clamped) pre-activation input.
    pub fn derivative(self, x: f64, input_clip: f64) -> f64 {
        let x = clamp_finite(x, input_clip);
        match self {
            Activation::LeakyRelu => {
                if x > 0.0 {
                    1.0
                } else {
                    LEAKY_SLOPE
                }
            }
            Activation::Sigmoid => {
                let s = sigmoid(x);
                s * (1.0 - s)
            }
            Activation::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
        }
    }
}

/// Clamp into [-bound, bound]; non-finite inputs saturate to the bound so a
/// NaN upstream becomes a detectable extreme instead of poisoning the layer.
fn clamp_finite(x: f64, bound: f64) -> f64 {
    if x.is_nan() {
        bound
    } else {
        x.clamp(-bound, bound)
    }
}

fn sigmoid(x: f64) -> f64 {
    // Numerically-stable sigmoid.
    if x >= 0.0 {
        let z = (-x).exp();
        1.0 / (1.0 + z)
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}

/// Softmax with max subtraction; uniform fallback for an empty or degenerate
/// input.
pub fn softmax(xs: &[f64]) -> Vec<f64> {
    if xs.is_empty() {
        return Vec::new();
    }
    let max = xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = xs.iter().map(|x| (x - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    if sum > 0.0 && sum.is_finite() {
        exps.into_iter().map(|e| e / sum).collect()
    } else {
        vec![1.0 / xs.len() as f64; xs.len()]
    }
}
